//! DHT climate bridge
//!
//! Bridges a DHT-class temperature and humidity sensor to an MQTT broker
//! over a supervised network link.
//!
//! # Overview
//!
//! The bridge is built from four collaborators wired by [`Bridge`]:
//! - Link supervision: drives a [`link::LinkDriver`], publishes
//!   [`link::LinkState`] and maintains the [`link::ReadinessGate`]
//! - Broker session: a supervised MQTT connection with automatic
//!   reconnection ([`session::MqttSession`])
//! - Sensor: one raw sample per cycle through the [`sensor::Sensor`] trait
//! - Publish loop: samples on a fixed period and publishes both readings
//!
//! Startup is strictly sequenced: the broker session is only opened after
//! the readiness gate reports the link holds an address. After startup the
//! supervisors recover their own failures independently; readings taken
//! while disconnected are dropped, never queued.

pub mod bridge;
pub mod config;
pub mod error;
pub mod link;
pub mod observability;
pub mod publisher;
pub mod retry;
pub mod sensor;
pub mod session;
pub mod testing;

pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult};
pub use link::{LinkState, ReadinessGate};
pub use publisher::{CycleOutcome, PublishLoop};
pub use retry::{RetryConfig, RetryDecision};
pub use sensor::{RawSample, Reading, Sensor};
pub use session::{BrokerSession, MqttSession, Qos, SessionState};
