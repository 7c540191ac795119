//! Pure decoding of raw sensor samples and payload formatting.

use chrono::{DateTime, Utc};

/// Raw sample as delivered by the sensor: tenths of a degree Celsius and
/// tenths of a percent relative humidity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub temperature_raw: i16,
    pub humidity_raw: i16,
}

/// Decoded reading, consumed once by the publish loop and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub temperature: f32,
    pub humidity: f32,
    pub sampled_at: DateTime<Utc>,
}

impl Reading {
    /// Decode a raw sample: each raw unit is one tenth of the physical unit
    /// (raw 235 -> 23.5).
    pub fn decode(raw: RawSample) -> Self {
        Self {
            temperature: f32::from(raw.temperature_raw) / 10.0,
            humidity: f32::from(raw.humidity_raw) / 10.0,
            sampled_at: Utc::now(),
        }
    }

    /// Human-readable temperature payload bound to the temperature topic.
    pub fn temperature_payload(&self) -> String {
        format!("Temperatura: {:.1}°C", self.temperature)
    }

    /// Human-readable humidity payload bound to the humidity topic.
    pub fn humidity_payload(&self) -> String {
        format!("Umidade: {:.1}%", self.humidity)
    }
}
