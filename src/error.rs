//! Error taxonomy for the bridge.
//!
//! Every runtime failure kind here is handled locally with a log and a
//! retry at the next opportunity; none of them halt the process. The only
//! errors that abort startup are configuration problems.

use thiserror::Error;

/// Top-level error type for bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("network link error: {0}")]
    Link(#[from] crate::link::LinkError),

    #[error("broker session error: {0}")]
    Session(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("sensor error: {0}")]
    Sensor(#[from] crate::sensor::SensorError),

    #[error("bridge already started")]
    AlreadyStarted,
}

impl BridgeError {
    /// Wrap a broker session error from a generic `BrokerSession` impl.
    pub fn session<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Session(Box::new(err))
    }
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
