//! Publish cycle behavior: payload formatting, topic binding and skip
//! semantics.

use std::sync::Arc;
use std::time::Duration;

use dht_bridge::config::TopicSection;
use dht_bridge::sensor::{RawSample, SensorError};
use dht_bridge::session::{Qos, SessionState};
use dht_bridge::testing::{MockSession, ScriptedSensor};
use dht_bridge::{CycleOutcome, PublishLoop};

fn topics() -> TopicSection {
    TopicSection {
        temperature: "graduacao/iot/6/temperatura".to_string(),
        humidity: "graduacao/iot/6/umidade".to_string(),
    }
}

fn publish_loop(
    session: Arc<MockSession>,
    sensor: ScriptedSensor,
) -> PublishLoop<MockSession> {
    PublishLoop::new(
        session,
        Box::new(sensor),
        topics(),
        Qos::AtLeastOnce,
        Duration::from_secs(15),
    )
}

#[tokio::test]
async fn test_cycle_publishes_both_readings_to_their_topics() {
    let session = Arc::new(MockSession::new());
    session.set_state(SessionState::Connected);

    let sensor = ScriptedSensor::new(vec![Ok(RawSample {
        temperature_raw: 235,
        humidity_raw: 602,
    })]);
    let mut publish = publish_loop(session.clone(), sensor);

    assert_eq!(publish.run_cycle().await, CycleOutcome::Published);

    let published = session.published().await;
    assert_eq!(published.len(), 2);
    assert_eq!(
        published[0],
        (
            "graduacao/iot/6/temperatura".to_string(),
            "Temperatura: 23.5°C".to_string()
        )
    );
    assert_eq!(
        published[1],
        (
            "graduacao/iot/6/umidade".to_string(),
            "Umidade: 60.2%".to_string()
        )
    );
}

#[tokio::test]
async fn test_sensor_failure_skips_cycle_only() {
    let session = Arc::new(MockSession::new());
    session.set_state(SessionState::Connected);

    let sensor = ScriptedSensor::new(vec![
        Err(SensorError::Unavailable("checksum mismatch".to_string())),
        Ok(RawSample {
            temperature_raw: 240,
            humidity_raw: 500,
        }),
    ]);
    let mut publish = publish_loop(session.clone(), sensor);

    assert_eq!(publish.run_cycle().await, CycleOutcome::SkippedSensorError);
    assert!(session.published().await.is_empty());

    assert_eq!(publish.run_cycle().await, CycleOutcome::Published);
    let published = session.published().await;
    assert_eq!(published.len(), 2);
    assert_eq!(published[0].1, "Temperatura: 24.0°C");
    assert_eq!(published[1].1, "Umidade: 50.0%");
}

#[tokio::test]
async fn test_disconnected_session_drops_reading() {
    let session = Arc::new(MockSession::new());

    let sensor = ScriptedSensor::new(vec![
        Ok(RawSample {
            temperature_raw: 235,
            humidity_raw: 602,
        }),
        Ok(RawSample {
            temperature_raw: 236,
            humidity_raw: 603,
        }),
    ]);
    let mut publish = publish_loop(session.clone(), sensor);

    assert_eq!(publish.run_cycle().await, CycleOutcome::SkippedDisconnected);
    assert!(session.published().await.is_empty());

    session.set_state(SessionState::Connected);
    assert_eq!(publish.run_cycle().await, CycleOutcome::Published);
    let published = session.published().await;
    assert_eq!(published[0].1, "Temperatura: 23.6°C");
    assert_eq!(published[1].1, "Umidade: 60.3%");
}

#[tokio::test]
async fn test_publish_errors_do_not_abort_the_loop() {
    let session = Arc::new(MockSession::failing_publishes());
    session.set_state(SessionState::Connected);

    let sensor = ScriptedSensor::new(vec![Ok(RawSample {
        temperature_raw: 235,
        humidity_raw: 602,
    })]);
    let mut publish = publish_loop(session.clone(), sensor);

    // Failures are logged and the reading dropped; the cycle still counts
    // as attempted and nothing is queued.
    assert_eq!(publish.run_cycle().await, CycleOutcome::Published);
    assert!(session.published().await.is_empty());
}
