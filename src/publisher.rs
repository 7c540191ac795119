//! Publish loop: sample the sensor on a fixed period and publish both
//! readings.
//!
//! Each cycle is read first, publish second, so the first reading goes out
//! immediately after startup. A cycle that cannot complete (sensor failure
//! or disconnected session) is skipped; the reading is dropped, never
//! queued.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::TopicSection;
use crate::sensor::{Reading, Sensor};
use crate::session::{BrokerSession, Qos};

/// What a single publish cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Both readings published
    Published,
    /// Sensor read failed, cycle skipped
    SkippedSensorError,
    /// Session not connected, reading dropped
    SkippedDisconnected,
}

pub struct PublishLoop<S: BrokerSession> {
    session: Arc<S>,
    sensor: Box<dyn Sensor>,
    topics: TopicSection,
    qos: Qos,
    period: Duration,
}

impl<S: BrokerSession + 'static> PublishLoop<S> {
    pub fn new(
        session: Arc<S>,
        sensor: Box<dyn Sensor>,
        topics: TopicSection,
        qos: Qos,
        period: Duration,
    ) -> Self {
        Self {
            session,
            sensor,
            topics,
            qos,
            period,
        }
    }

    /// Run the loop until the task is aborted. The first cycle runs
    /// immediately.
    pub fn spawn(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(period_secs = self.period.as_secs(), "Publish loop started");
            let mut ticker = tokio::time::interval(self.period);
            loop {
                ticker.tick().await;
                self.run_cycle().await;
            }
        })
    }

    /// One sample-and-publish cycle.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let raw = match self.sensor.read() {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Sensor read failed, skipping cycle");
                return CycleOutcome::SkippedSensorError;
            }
        };
        let reading = Reading::decode(raw);
        info!(
            temperature = reading.temperature,
            humidity = reading.humidity,
            sampled_at = %reading.sampled_at,
            "Sampled sensor"
        );

        if !self.session.is_connected() {
            debug!("Session not connected, dropping reading");
            return CycleOutcome::SkippedDisconnected;
        }

        if let Err(e) = self
            .session
            .publish(
                &self.topics.temperature,
                &reading.temperature_payload(),
                self.qos,
                false,
            )
            .await
        {
            warn!(topic = %self.topics.temperature, error = %e, "Publish failed, reading dropped");
        }
        if let Err(e) = self
            .session
            .publish(
                &self.topics.humidity,
                &reading.humidity_payload(),
                self.qos,
                false,
            )
            .await
        {
            warn!(topic = %self.topics.humidity, error = %e, "Publish failed, reading dropped");
        }

        CycleOutcome::Published
    }
}
