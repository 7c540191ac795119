//! Broker session: MQTT connection lifecycle, subscriptions and publishes.
//!
//! The [`BrokerSession`] trait is the seam between the coordinator and the
//! concrete transport. Production uses [`MqttSession`] over rumqttc; tests
//! use the mock in `crate::testing`.

pub mod mqtt;
pub mod state;

pub use mqtt::MqttSession;
pub use state::{can_publish, can_subscribe, determine_next_state, SessionEvent, SessionState};

use async_trait::async_trait;
use thiserror::Error;

/// MQTT quality of service for published readings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qos {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl Qos {
    /// Map the configured numeric level, `None` when out of range.
    pub fn from_u8(level: u8) -> Option<Self> {
        match level {
            0 => Some(Qos::AtMostOnce),
            1 => Some(Qos::AtLeastOnce),
            2 => Some(Qos::ExactlyOnce),
            _ => None,
        }
    }
}

/// Broker session errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),

    #[error("Session is not connected (state: {state:?})")]
    NotConnected { state: SessionState },

    #[error("Failed to open session: {0}")]
    ConnectFailed(String),

    #[error("Subscribe failed: {0}")]
    SubscribeFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Publish failed: {0}")]
    PublishFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Session abstraction over an MQTT broker connection.
///
/// `connect` starts the session supervisor and returns once it is running;
/// reaching `Connected` happens asynchronously and is retried per the
/// configured policy. Publishing against a session that is not currently
/// connected fails fast instead of queueing.
#[async_trait]
pub trait BrokerSession: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open the session and start supervising it.
    async fn connect(&mut self) -> Result<(), Self::Error>;

    /// Record a subscription, re-issued on every successful (re)connect.
    async fn subscribe(&self, topic: &str, qos: Qos) -> Result<(), Self::Error>;

    /// Publish a payload. Fails with a state error when not connected.
    async fn publish(
        &self,
        topic: &str,
        payload: &str,
        qos: Qos,
        retain: bool,
    ) -> Result<(), Self::Error>;

    /// Current session state.
    fn state(&self) -> SessionState;

    /// Whether a publish would be accepted right now.
    fn is_connected(&self) -> bool {
        matches!(self.state(), SessionState::Connected)
    }

    /// Stop the supervisor and close the connection.
    async fn disconnect(&self) -> Result<(), Self::Error>;
}
