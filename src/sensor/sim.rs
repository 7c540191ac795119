//! Simulated sensor for development hosts without IIO hardware.

use super::{RawSample, Sensor, SensorError};

/// Deterministic triangle-wave sensor. Temperature sweeps 18.0 to 30.0
/// and humidity 40.0 to 70.0 over 120 samples.
#[derive(Debug, Default)]
pub struct SimSensor {
    step: u32,
}

impl SimSensor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Sensor for SimSensor {
    fn read(&mut self) -> Result<RawSample, SensorError> {
        let phase = self.step % 120;
        let tri = if phase < 60 { phase } else { 120 - phase };
        self.step = self.step.wrapping_add(1);
        Ok(RawSample {
            temperature_raw: (180 + 2 * tri) as i16,
            humidity_raw: (400 + 5 * tri) as i16,
        })
    }
}
