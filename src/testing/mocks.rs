//! Mock implementations of the bridge's collaborator traits.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::link::{LinkDriver, LinkError, LinkEvent};
use crate::sensor::{RawSample, Sensor, SensorError};
use crate::session::{can_publish, BrokerSession, Qos, SessionError, SessionState};

/// In-memory broker session recording publishes and subscriptions.
pub struct MockSession {
    state: std::sync::Mutex<SessionState>,
    published: Arc<Mutex<Vec<(String, String)>>>,
    subscriptions: Arc<Mutex<Vec<(String, Qos)>>>,
    fail_publish: bool,
    connect_sets_connected: bool,
}

impl MockSession {
    /// Session that reports `Connected` as soon as `connect` is called.
    pub fn new() -> Self {
        Self {
            state: std::sync::Mutex::new(SessionState::Disconnected),
            published: Arc::new(Mutex::new(Vec::new())),
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            fail_publish: false,
            connect_sets_connected: true,
        }
    }

    /// Session whose publishes fail even while connected.
    pub fn failing_publishes() -> Self {
        Self {
            fail_publish: true,
            ..Self::new()
        }
    }

    /// Force the reported state, e.g. to simulate a broker drop.
    pub fn set_state(&self, state: SessionState) {
        if let Ok(mut guard) = self.state.lock() {
            *guard = state;
        }
    }

    /// Topic and payload pairs published so far, in order.
    pub async fn published(&self) -> Vec<(String, String)> {
        self.published.lock().await.clone()
    }

    /// Subscriptions recorded so far.
    pub async fn subscriptions(&self) -> Vec<(String, Qos)> {
        self.subscriptions.lock().await.clone()
    }
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerSession for MockSession {
    type Error = SessionError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        if self.connect_sets_connected {
            self.set_state(SessionState::Connected);
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str, qos: Qos) -> Result<(), Self::Error> {
        self.subscriptions
            .lock()
            .await
            .push((topic.to_string(), qos));
        Ok(())
    }

    async fn publish(
        &self,
        topic: &str,
        payload: &str,
        _qos: Qos,
        _retain: bool,
    ) -> Result<(), Self::Error> {
        let state = self.state();
        if !can_publish(state) {
            return Err(SessionError::NotConnected { state });
        }
        if self.fail_publish {
            return Err(SessionError::PublishFailed("mock publish failure".into()));
        }
        self.published
            .lock()
            .await
            .push((topic.to_string(), payload.to_string()));
        Ok(())
    }

    fn state(&self) -> SessionState {
        self.state
            .lock()
            .map(|guard| *guard)
            .unwrap_or(SessionState::Error)
    }

    async fn disconnect(&self) -> Result<(), Self::Error> {
        self.set_state(SessionState::Disconnected);
        Ok(())
    }
}

/// Sensor yielding a scripted sequence of results.
pub struct ScriptedSensor {
    outcomes: VecDeque<Result<RawSample, SensorError>>,
}

impl ScriptedSensor {
    pub fn new(outcomes: Vec<Result<RawSample, SensorError>>) -> Self {
        Self {
            outcomes: outcomes.into(),
        }
    }

    /// Sensor returning the same sample forever.
    pub fn constant(temperature_raw: i16, humidity_raw: i16) -> ConstantSensor {
        ConstantSensor {
            sample: RawSample {
                temperature_raw,
                humidity_raw,
            },
        }
    }
}

impl Sensor for ScriptedSensor {
    fn read(&mut self) -> Result<RawSample, SensorError> {
        self.outcomes
            .pop_front()
            .unwrap_or_else(|| Err(SensorError::Unavailable("script exhausted".to_string())))
    }
}

/// Sensor returning one fixed sample on every read.
pub struct ConstantSensor {
    sample: RawSample,
}

impl Sensor for ConstantSensor {
    fn read(&mut self) -> Result<RawSample, SensorError> {
        Ok(self.sample)
    }
}

/// Link driver fed from a channel of scripted events.
pub struct ScriptedLinkDriver {
    events: mpsc::UnboundedReceiver<LinkEvent>,
    associate_count: Arc<AtomicU32>,
}

impl ScriptedLinkDriver {
    pub fn associate_count(&self) -> Arc<AtomicU32> {
        self.associate_count.clone()
    }
}

/// Build a scripted link driver and the sender that feeds it. Dropping the
/// sender ends the event stream.
pub fn scripted_link() -> (mpsc::UnboundedSender<LinkEvent>, ScriptedLinkDriver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        tx,
        ScriptedLinkDriver {
            events: rx,
            associate_count: Arc::new(AtomicU32::new(0)),
        },
    )
}

#[async_trait]
impl LinkDriver for ScriptedLinkDriver {
    async fn associate(&mut self) -> Result<(), LinkError> {
        self.associate_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn next_event(&mut self) -> Option<LinkEvent> {
        self.events.recv().await
    }
}
