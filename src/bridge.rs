//! Bridge coordinator: sequences link supervision, broker session and the
//! publish loop.
//!
//! Startup order is strict: the broker session is not opened until the
//! readiness gate reports the link holds an address. After startup, link
//! loss and broker loss are handled independently by their supervisors;
//! the publish loop keeps running and drops readings while disconnected.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::link::{LinkDriver, LinkState, LinkSupervisor, ReadinessGate};
use crate::publisher::PublishLoop;
use crate::sensor::Sensor;
use crate::session::{BrokerSession, Qos};

pub struct Bridge<S: BrokerSession + 'static> {
    config: BridgeConfig,
    link: Option<LinkSupervisor>,
    session: Option<S>,
    sensor: Option<Box<dyn Sensor>>,
    gate: ReadinessGate,
    link_state: watch::Receiver<LinkState>,
    link_handle: Option<JoinHandle<()>>,
    publish_handle: Option<JoinHandle<()>>,
    session_shared: Option<Arc<S>>,
}

impl<S: BrokerSession + 'static> Bridge<S> {
    pub fn new(
        config: BridgeConfig,
        driver: Box<dyn LinkDriver>,
        session: S,
        sensor: Box<dyn Sensor>,
    ) -> Self {
        let link = LinkSupervisor::new(driver, config.wifi.retry.clone());
        let gate = link.gate();
        let link_state = link.state();
        Self {
            config,
            link: Some(link),
            session: Some(session),
            sensor: Some(sensor),
            gate,
            link_state,
            link_handle: None,
            publish_handle: None,
            session_shared: None,
        }
    }

    /// Bring the bridge up: start link supervision, block until the link is
    /// ready, then open the broker session and start publishing.
    pub async fn start(&mut self) -> BridgeResult<()> {
        let link = self.link.take().ok_or(BridgeError::AlreadyStarted)?;
        self.link_handle = Some(link.spawn());

        info!("Waiting for network readiness");
        self.gate.wait().await;
        info!("Network ready, opening broker session");

        let mut session = self.session.take().ok_or(BridgeError::AlreadyStarted)?;
        session.connect().await.map_err(BridgeError::session)?;

        let qos = Qos::from_u8(self.config.sensor.publish_qos).unwrap_or(Qos::AtLeastOnce);
        session
            .subscribe(&self.config.topics.temperature, qos)
            .await
            .map_err(BridgeError::session)?;
        session
            .subscribe(&self.config.topics.humidity, qos)
            .await
            .map_err(BridgeError::session)?;

        let session = Arc::new(session);
        self.session_shared = Some(session.clone());

        let sensor = self.sensor.take().ok_or(BridgeError::AlreadyStarted)?;
        let publish_loop = PublishLoop::new(
            session,
            sensor,
            self.config.topics.clone(),
            qos,
            Duration::from_secs(self.config.sensor.sample_interval_secs),
        );
        self.publish_handle = Some(publish_loop.spawn());

        info!(device_id = %self.config.device.id, "Bridge started");
        Ok(())
    }

    /// Stop the publish loop and link supervision, then close the session.
    pub async fn shutdown(&mut self) -> BridgeResult<()> {
        info!("Bridge shutting down");

        if let Some(handle) = self.publish_handle.take() {
            handle.abort();
        }
        if let Some(handle) = self.link_handle.take() {
            handle.abort();
        }

        if let Some(session) = self.session_shared.take() {
            if let Err(e) = session.disconnect().await {
                warn!(error = %e, "Session close failed during shutdown");
            }
        }

        info!("Bridge stopped");
        Ok(())
    }

    /// Readiness gate shared with the link supervisor.
    pub fn gate(&self) -> ReadinessGate {
        self.gate.clone()
    }

    /// Watch channel carrying link state transitions.
    pub fn link_state(&self) -> watch::Receiver<LinkState> {
        self.link_state.clone()
    }

    /// The running session, available after `start`.
    pub fn session(&self) -> Option<&Arc<S>> {
        self.session_shared.as_ref()
    }
}
