//! Sensor collaborator: one `read()` call per publish cycle.
//!
//! The raw encoding is the DHT-class one: signed 16-bit integers in tenths
//! of the physical unit. Decoding is a pure function in [`reading`] so it
//! stays unit-testable without hardware.

pub mod iio;
pub mod reading;
pub mod sim;

pub use iio::IioSensor;
pub use reading::{RawSample, Reading};
pub use sim::SimSensor;

use thiserror::Error;

/// Sensor read failures. They abort only the current publish cycle,
/// never the loop.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("sensor I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("sensor reported an unparsable value: {0}")]
    Parse(String),

    #[error("sensor unavailable: {0}")]
    Unavailable(String),
}

/// A source of raw climate samples
pub trait Sensor: Send {
    /// Take one sample. Called once per publish cycle.
    fn read(&mut self) -> Result<RawSample, SensorError>;
}
