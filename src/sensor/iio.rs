//! Linux IIO sysfs sensor driver.
//!
//! Reads `in_temp_input` and `in_humidityrelative_input` from an IIO
//! device directory. The kernel exposes both in milli-units; the raw
//! sample wants tenths, so values are rescaled on the way in.

use std::path::{Path, PathBuf};

use super::{RawSample, Sensor, SensorError};

/// Sensor backed by a Linux IIO hygrometer/thermometer device.
pub struct IioSensor {
    temperature_path: PathBuf,
    humidity_path: PathBuf,
}

impl IioSensor {
    /// Create a sensor reading from the given IIO device directory,
    /// e.g. `/sys/bus/iio/devices/iio:device0`.
    pub fn new(device_dir: &Path) -> Self {
        Self {
            temperature_path: device_dir.join("in_temp_input"),
            humidity_path: device_dir.join("in_humidityrelative_input"),
        }
    }

    fn read_channel(path: &Path) -> Result<i16, SensorError> {
        let content = std::fs::read_to_string(path)?;
        let milli: i64 = content.trim().parse().map_err(|_| {
            SensorError::Parse(format!(
                "{}: expected integer milli-units, got '{}'",
                path.display(),
                content.trim()
            ))
        })?;
        milli_to_tenths(milli)
            .ok_or_else(|| SensorError::Parse(format!("{}: value {milli} out of range", path.display())))
    }
}

impl Sensor for IioSensor {
    fn read(&mut self) -> Result<RawSample, SensorError> {
        Ok(RawSample {
            temperature_raw: Self::read_channel(&self.temperature_path)?,
            humidity_raw: Self::read_channel(&self.humidity_path)?,
        })
    }
}

/// Rescale a milli-unit channel value to tenths, rounding to nearest.
fn milli_to_tenths(milli: i64) -> Option<i16> {
    let tenths = ((milli as f64) / 100.0).round() as i64;
    i16::try_from(tenths).ok()
}
