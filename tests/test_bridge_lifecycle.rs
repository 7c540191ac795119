//! Bridge startup sequencing and link recovery tests.

use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use dht_bridge::config::BridgeConfig;
use dht_bridge::link::{LinkDriver, LinkError, LinkEvent, LinkState, LinkSupervisor};
use dht_bridge::retry::RetryConfig;
use dht_bridge::testing::{scripted_link, MockSession, ScriptedSensor};
use dht_bridge::Bridge;
use tokio::time::timeout;

fn test_config() -> BridgeConfig {
    let toml_content = r#"
[device]
id = "test-bridge"

[wifi]
ssid = "lab-network"

[mqtt]
broker_url = "mqtt://localhost:1883"

[sensor]
driver = "sim"
"#;
    toml::from_str(toml_content).expect("test config should parse")
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: None,
        backoff_pattern: vec![],
        sustained_delay_ms: 1,
    }
}

#[tokio::test]
async fn test_startup_blocks_until_link_ready() {
    let (events, driver) = scripted_link();
    let session = MockSession::new();
    let sensor = ScriptedSensor::constant(235, 602);
    let config = test_config();

    let mut bridge = Bridge::new(config, Box::new(driver), session, Box::new(sensor));
    let gate = bridge.gate();

    let startup = tokio::spawn(async move {
        bridge.start().await.expect("startup should succeed");
        bridge
    });

    // Session must not open before the link reports an address
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!startup.is_finished(), "startup must wait for readiness");
    assert!(!gate.is_set());

    events.send(LinkEvent::AssociationStarted).unwrap();
    events.send(LinkEvent::Associated).unwrap();
    events.send(LinkEvent::IpAcquired).unwrap();

    let bridge = timeout(Duration::from_secs(1), startup)
        .await
        .expect("startup should complete once link is ready")
        .unwrap();

    let session = bridge.session().expect("session is running after start");
    let subscriptions = session.subscriptions().await;
    let topics: Vec<&str> = subscriptions.iter().map(|(t, _)| t.as_str()).collect();
    assert!(topics.contains(&"graduacao/iot/6/temperatura"));
    assert!(topics.contains(&"graduacao/iot/6/umidade"));
}

#[tokio::test]
async fn test_gate_set_on_address_acquisition() {
    let (events, driver) = scripted_link();
    let supervisor = LinkSupervisor::new(Box::new(driver), fast_retry());
    let gate = supervisor.gate();
    let mut state = supervisor.state();
    let _handle = supervisor.spawn();

    events.send(LinkEvent::AssociationStarted).unwrap();
    events.send(LinkEvent::Associated).unwrap();
    events.send(LinkEvent::IpAcquired).unwrap();

    timeout(Duration::from_secs(1), state.wait_for(|s| *s == LinkState::IpAcquired))
        .await
        .expect("state should reach IpAcquired")
        .unwrap();
    assert!(gate.is_set());
}

#[tokio::test]
async fn test_loss_clears_gate_and_requests_reassociation() {
    let (events, driver) = scripted_link();
    let associate_count = driver.associate_count();
    let supervisor = LinkSupervisor::new(Box::new(driver), fast_retry());
    let gate = supervisor.gate();
    let mut state = supervisor.state();
    let _handle = supervisor.spawn();

    events.send(LinkEvent::IpAcquired).unwrap();
    timeout(Duration::from_secs(1), state.wait_for(|s| *s == LinkState::IpAcquired))
        .await
        .unwrap()
        .unwrap();

    events.send(LinkEvent::AssociationLost).unwrap();
    timeout(
        Duration::from_secs(1),
        state.wait_for(|s| *s == LinkState::Disconnected),
    )
    .await
    .expect("state should reach Disconnected")
    .unwrap();

    // Loss clears the gate before the state change is published
    assert!(!gate.is_set());

    // Supervisor re-associates: initial call plus one retry
    timeout(Duration::from_secs(1), async {
        while associate_count.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("re-association should be requested");
}

/// Driver whose association request always fails.
struct FailingAssociateDriver {
    events: tokio::sync::mpsc::UnboundedReceiver<LinkEvent>,
}

#[async_trait]
impl LinkDriver for FailingAssociateDriver {
    async fn associate(&mut self) -> Result<(), LinkError> {
        Err(LinkError::AssociationFailed("radio busy".to_string()))
    }

    async fn next_event(&mut self) -> Option<LinkEvent> {
        self.events.recv().await
    }
}

#[tokio::test]
async fn test_associate_failure_is_nonfatal() {
    let (events, rx) = tokio::sync::mpsc::unbounded_channel();
    let supervisor =
        LinkSupervisor::new(Box::new(FailingAssociateDriver { events: rx }), fast_retry());
    let gate = supervisor.gate();
    let mut state = supervisor.state();
    let _handle = supervisor.spawn();

    // A failed association request is logged, not fatal; the supervisor
    // keeps consuming events and readiness still follows them.
    events.send(LinkEvent::IpAcquired).unwrap();
    timeout(Duration::from_secs(1), state.wait_for(|s| *s == LinkState::IpAcquired))
        .await
        .expect("supervisor should survive associate errors")
        .unwrap();
    assert!(gate.is_set());
}

#[tokio::test]
async fn test_gate_reusable_after_recovery() {
    let (events, driver) = scripted_link();
    let supervisor = LinkSupervisor::new(Box::new(driver), fast_retry());
    let gate = supervisor.gate();
    let mut state = supervisor.state();
    let _handle = supervisor.spawn();

    events.send(LinkEvent::IpAcquired).unwrap();
    timeout(Duration::from_secs(1), state.wait_for(|s| *s == LinkState::IpAcquired))
        .await
        .unwrap()
        .unwrap();
    assert!(gate.is_set());

    events.send(LinkEvent::AssociationLost).unwrap();
    timeout(
        Duration::from_secs(1),
        state.wait_for(|s| *s == LinkState::Disconnected),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(!gate.is_set());

    events.send(LinkEvent::Associated).unwrap();
    events.send(LinkEvent::IpAcquired).unwrap();
    timeout(Duration::from_secs(1), state.wait_for(|s| *s == LinkState::IpAcquired))
        .await
        .unwrap()
        .unwrap();
    assert!(gate.is_set(), "gate must be reusable after recovery");

    timeout(Duration::from_millis(100), gate.wait())
        .await
        .expect("waiters must pass a re-signalled gate");
}
