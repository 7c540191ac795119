//! rumqttc-backed broker session.
//!
//! `connect` spawns a supervisor task that drives the rumqttc event loop
//! and owns all state transitions. The session state is published on a
//! watch channel; callers observe it through [`BrokerSession::state`].
//! Reconnection follows the configured retry policy and a shutdown watch
//! channel interrupts any pending delay.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::v5::mqttbytes::v5::Packet;
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{AsyncClient, Event, EventLoop, MqttOptions};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use super::state::{can_publish, determine_next_state, SessionEvent, SessionState};
use super::{BrokerSession, Qos, SessionError};
use crate::config::MqttSection;
use crate::retry::{RetryConfig, RetryDecision};

/// Build rumqttc options from the broker section of the configuration.
pub fn configure_mqtt_options(
    device_id: &str,
    config: &MqttSection,
) -> Result<MqttOptions, SessionError> {
    let url = Url::parse(&config.broker_url)
        .map_err(|_| SessionError::InvalidBrokerUrl(config.broker_url.clone()))?;

    let host = url
        .host_str()
        .ok_or_else(|| SessionError::InvalidBrokerUrl(config.broker_url.clone()))?;
    let port = url
        .port()
        .unwrap_or(if url.scheme() == "mqtts" { 8883 } else { 1883 });

    // Unique client ID per connection attempt to avoid broker takeover fights
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let client_id = format!("dht-bridge-{device_id}-{timestamp}");
    let mut mqtt_options = MqttOptions::new(client_id, host, port);

    if url.scheme() == "mqtts" {
        mqtt_options.set_transport(rumqttc::Transport::tls_with_default_config());
    }

    if let Some(username) = config.username() {
        let password = config.password().unwrap_or_default();
        mqtt_options.set_credentials(&username, &password);
    }

    mqtt_options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

    Ok(mqtt_options)
}

/// Coarse routing of rumqttc events into the session state machine.
#[derive(Debug)]
pub enum EventRoute {
    ConnectionAcknowledged,
    Disconnected,
    Incoming(String),
    Outgoing,
}

/// Classify an event-loop event (pure function).
pub fn route_session_event(event: &Event) -> EventRoute {
    match event {
        Event::Incoming(incoming) => match incoming {
            Packet::ConnAck(_) => EventRoute::ConnectionAcknowledged,
            Packet::Disconnect(_) => EventRoute::Disconnected,
            other => EventRoute::Incoming(format!("{other:?}")),
        },
        Event::Outgoing(_) => EventRoute::Outgoing,
    }
}

fn to_rumqttc_qos(qos: Qos) -> QoS {
    match qos {
        Qos::AtMostOnce => QoS::AtMostOnce,
        Qos::AtLeastOnce => QoS::AtLeastOnce,
        Qos::ExactlyOnce => QoS::ExactlyOnce,
    }
}

/// MQTT session with a supervised event loop and automatic reconnection.
pub struct MqttSession {
    device_id: String,
    config: MqttSection,
    retry: RetryConfig,
    client: Arc<Mutex<Option<AsyncClient>>>,
    state_tx: watch::Sender<SessionState>,
    state_rx: watch::Receiver<SessionState>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    subscriptions: Arc<Mutex<Vec<(String, Qos)>>>,
    supervisor: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl MqttSession {
    /// Create a passive session. Nothing happens until `connect`.
    pub fn new(device_id: &str, config: MqttSection) -> Self {
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let retry = config.retry.clone();

        Self {
            device_id: device_id.to_string(),
            config,
            retry,
            client: Arc::new(Mutex::new(None)),
            state_tx,
            state_rx,
            shutdown_tx,
            shutdown_rx,
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            supervisor: std::sync::Mutex::new(None),
        }
    }

    /// Watch channel carrying session state transitions.
    pub fn state_watch(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    fn create_connection(
        device_id: &str,
        config: &MqttSection,
    ) -> Result<(AsyncClient, EventLoop), SessionError> {
        let mqtt_options = configure_mqtt_options(device_id, config)?;
        Ok(AsyncClient::new(mqtt_options, 10))
    }

    /// Sleep that a shutdown signal can cut short. Returns false when
    /// shutdown was requested.
    async fn interruptible_sleep(mut shutdown_rx: watch::Receiver<bool>, delay_ms: u64) -> bool {
        tokio::select! {
            _ = shutdown_rx.changed() => !*shutdown_rx.borrow(),
            _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => true,
        }
    }

    async fn resubscribe(client: &AsyncClient, subscriptions: &[(String, Qos)]) {
        for (topic, qos) in subscriptions {
            if let Err(e) = client.subscribe(topic, to_rumqttc_qos(*qos)).await {
                error!(topic = %topic, error = %e, "Failed to subscribe after connect");
            } else {
                debug!(topic = %topic, "Subscribed");
            }
        }
    }

    /// Handle a lost connection: apply the retry policy and rebuild the
    /// client and event loop. Returns false when the supervisor should stop.
    async fn attempt_reconnect(
        attempts: &mut u32,
        retry: &RetryConfig,
        shutdown_rx: &watch::Receiver<bool>,
        state_tx: &watch::Sender<SessionState>,
        device_id: &str,
        config: &MqttSection,
        event_loop: &mut EventLoop,
        shared_client: &Arc<Mutex<Option<AsyncClient>>>,
    ) -> bool {
        let shutdown_requested = *shutdown_rx.borrow();
        match retry.decide(*attempts, shutdown_requested) {
            RetryDecision::Proceed { attempt, delay_ms } => {
                *attempts = attempt;
                let max_display = retry
                    .max_attempts
                    .map_or("unlimited".to_string(), |max| max.to_string());
                info!(
                    attempt = attempt,
                    max = %max_display,
                    delay_ms = delay_ms,
                    "Attempting broker reconnection"
                );

                if !Self::interruptible_sleep(shutdown_rx.clone(), delay_ms).await {
                    return false;
                }
                if *shutdown_rx.borrow() {
                    return false;
                }

                match Self::create_connection(device_id, config) {
                    Ok((new_client, new_event_loop)) => {
                        *event_loop = new_event_loop;
                        *shared_client.lock().await = Some(new_client);
                        let _ = state_tx.send(determine_next_state(
                            &SessionEvent::ReconnectStarted(attempt),
                        ));
                        true
                    }
                    Err(e) => {
                        // Options failed to build; keep retrying on the next pass
                        error!(error = %e, "Failed to rebuild broker connection");
                        true
                    }
                }
            }
            RetryDecision::AbortShutdownRequested => {
                info!("Shutdown requested, stopping session supervisor");
                false
            }
            RetryDecision::AbortExhausted => {
                error!(
                    max_attempts = ?retry.max_attempts,
                    "Broker reconnection attempts exhausted"
                );
                let _ = state_tx.send(SessionState::Disconnected);
                false
            }
        }
    }

    async fn supervise(
        device_id: String,
        config: MqttSection,
        retry: RetryConfig,
        mut event_loop: EventLoop,
        shared_client: Arc<Mutex<Option<AsyncClient>>>,
        subscriptions: Arc<Mutex<Vec<(String, Qos)>>>,
        state_tx: watch::Sender<SessionState>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!(device_id = %device_id, "Broker session supervisor started");
        let mut attempts = 0u32;

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping session supervisor");
                        break;
                    }
                }

                event_result = event_loop.poll() => {
                    match event_result {
                        Ok(event) => match route_session_event(&event) {
                            EventRoute::ConnectionAcknowledged => {
                                let _ = state_tx
                                    .send(determine_next_state(&SessionEvent::ConnAckReceived));
                                attempts = 0;
                                let client = shared_client.lock().await.clone();
                                if let Some(client) = client {
                                    let subs = subscriptions.lock().await.clone();
                                    Self::resubscribe(&client, &subs).await;
                                }
                            }
                            EventRoute::Disconnected => {
                                let _ = state_tx.send(determine_next_state(
                                    &SessionEvent::DisconnectedByBroker,
                                ));
                                if !Self::attempt_reconnect(
                                    &mut attempts,
                                    &retry,
                                    &shutdown_rx,
                                    &state_tx,
                                    &device_id,
                                    &config,
                                    &mut event_loop,
                                    &shared_client,
                                )
                                .await
                                {
                                    break;
                                }
                            }
                            EventRoute::Incoming(event_str) => {
                                debug!(event = %event_str, "Broker event");
                            }
                            EventRoute::Outgoing => {}
                        },
                        Err(e) => {
                            let _ = state_tx.send(determine_next_state(
                                &SessionEvent::ProtocolError(e.to_string()),
                            ));
                            if !Self::attempt_reconnect(
                                &mut attempts,
                                &retry,
                                &shutdown_rx,
                                &state_tx,
                                &device_id,
                                &config,
                                &mut event_loop,
                                &shared_client,
                            )
                            .await
                            {
                                break;
                            }
                        }
                    }
                }
            }
        }
        info!(device_id = %device_id, "Broker session supervisor stopped");
    }
}

#[async_trait]
impl BrokerSession for MqttSession {
    type Error = SessionError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        {
            let supervisor = self
                .supervisor
                .lock()
                .map_err(|_| SessionError::ConnectFailed("supervisor lock poisoned".to_string()))?;
            if supervisor.is_some() {
                return Err(SessionError::ConnectFailed(
                    "session already opened".to_string(),
                ));
            }
        }

        // Fail fast on configuration problems before spawning anything
        let (client, event_loop) = Self::create_connection(&self.device_id, &self.config)?;
        *self.client.lock().await = Some(client);
        let _ = self.state_tx.send(SessionState::Connecting);

        let handle = tokio::spawn(Self::supervise(
            self.device_id.clone(),
            self.config.clone(),
            self.retry.clone(),
            event_loop,
            self.client.clone(),
            self.subscriptions.clone(),
            self.state_tx.clone(),
            self.shutdown_rx.clone(),
        ));

        let mut supervisor = self
            .supervisor
            .lock()
            .map_err(|_| SessionError::ConnectFailed("supervisor lock poisoned".to_string()))?;
        *supervisor = Some(handle);
        Ok(())
    }

    async fn subscribe(&self, topic: &str, qos: Qos) -> Result<(), Self::Error> {
        {
            let mut subscriptions = self.subscriptions.lock().await;
            if !subscriptions.iter().any(|(t, _)| t == topic) {
                subscriptions.push((topic.to_string(), qos));
            }
        }

        // Issue immediately when already connected; otherwise the recorded
        // intent is applied on the next ConnAck.
        if self.is_connected() {
            let client = self.client.lock().await.clone();
            if let Some(client) = client {
                client
                    .subscribe(topic, to_rumqttc_qos(qos))
                    .await
                    .map_err(|e| SessionError::SubscribeFailed(Box::new(e)))?;
            }
        }
        Ok(())
    }

    async fn publish(
        &self,
        topic: &str,
        payload: &str,
        qos: Qos,
        retain: bool,
    ) -> Result<(), Self::Error> {
        let state = self.state();
        if !can_publish(state) {
            return Err(SessionError::NotConnected { state });
        }

        let client = self.client.lock().await.clone();
        let client = client.ok_or(SessionError::NotConnected { state })?;
        client
            .publish(topic, to_rumqttc_qos(qos), retain, payload.as_bytes().to_vec())
            .await
            .map_err(|e| SessionError::PublishFailed(Box::new(e)))?;
        Ok(())
    }

    fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    async fn disconnect(&self) -> Result<(), Self::Error> {
        let _ = self.shutdown_tx.send(true);

        let client = self.client.lock().await.clone();
        if let Some(client) = client {
            // Best effort; the broker may already be gone
            if let Err(e) = client.disconnect().await {
                warn!(error = %e, "Broker disconnect request failed");
            }
        }
        let _ = self.state_tx.send(SessionState::Disconnected);

        let handle = self
            .supervisor
            .lock()
            .ok()
            .and_then(|mut supervisor| supervisor.take());
        if let Some(handle) = handle {
            match tokio::time::timeout(Duration::from_secs(2), handle).await {
                Ok(Ok(())) => info!("Session supervisor shut down gracefully"),
                Ok(Err(e)) if !e.is_cancelled() => {
                    warn!(error = %e, "Session supervisor ended with error");
                }
                Err(_) => warn!("Session supervisor did not stop in time, aborting"),
                _ => {}
            }
        }
        Ok(())
    }
}

impl Drop for MqttSession {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Ok(mut supervisor) = self.supervisor.lock() {
            if let Some(handle) = supervisor.take() {
                handle.abort();
            }
        }
    }
}
