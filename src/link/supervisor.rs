//! Link supervisor: drives a [`LinkDriver`], publishes [`LinkState`] and
//! maintains the [`ReadinessGate`].
//!
//! On association loss the gate is cleared first and the state published
//! second, so an observer that sees `Disconnected` never finds the gate
//! still set. Re-association follows the configured retry policy.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::readiness::ReadinessGate;
use super::state::{determine_next_state, LinkEvent, LinkState};
use super::LinkDriver;
use crate::retry::{RetryConfig, RetryDecision};

pub struct LinkSupervisor {
    driver: Box<dyn LinkDriver>,
    retry: RetryConfig,
    gate: ReadinessGate,
    state_tx: watch::Sender<LinkState>,
    state_rx: watch::Receiver<LinkState>,
}

impl LinkSupervisor {
    pub fn new(driver: Box<dyn LinkDriver>, retry: RetryConfig) -> Self {
        let (state_tx, state_rx) = watch::channel(LinkState::Idle);
        Self {
            driver,
            retry,
            gate: ReadinessGate::new(),
            state_tx,
            state_rx,
        }
    }

    /// Readiness gate maintained by this supervisor.
    pub fn gate(&self) -> ReadinessGate {
        self.gate.clone()
    }

    /// Watch channel carrying link state transitions.
    pub fn state(&self) -> watch::Receiver<LinkState> {
        self.state_rx.clone()
    }

    /// Start supervision. The task ends when the driver's event stream ends
    /// or re-association attempts are exhausted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        info!("Link supervisor started");

        if let Err(e) = self.driver.associate().await {
            warn!(error = %e, "Initial association request failed");
        }

        let mut attempts = 0u32;
        while let Some(event) = self.driver.next_event().await {
            let current = *self.state_rx.borrow();
            let next = determine_next_state(current, &event);

            // Gate before state so observers of the new state see the gate
            // already updated.
            match event {
                LinkEvent::IpAcquired => {
                    attempts = 0;
                    self.gate.signal();
                    info!("Link ready, address acquired");
                }
                LinkEvent::AssociationLost => {
                    self.gate.clear();
                }
                LinkEvent::AssociationStarted | LinkEvent::Associated => {}
            }
            let _ = self.state_tx.send(next);

            if matches!(event, LinkEvent::AssociationLost) {
                match self.retry.decide(attempts, false) {
                    RetryDecision::Proceed { attempt, delay_ms } => {
                        attempts = attempt;
                        let max_display = self
                            .retry
                            .max_attempts
                            .map_or("unlimited".to_string(), |max| max.to_string());
                        info!(
                            attempt = attempt,
                            max = %max_display,
                            delay_ms = delay_ms,
                            "Re-association scheduled"
                        );
                        if delay_ms > 0 {
                            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                        }
                        if let Err(e) = self.driver.associate().await {
                            warn!(error = %e, "Re-association request failed");
                        }
                    }
                    RetryDecision::AbortShutdownRequested | RetryDecision::AbortExhausted => {
                        error!("Re-association attempts exhausted, link stays down");
                        break;
                    }
                }
            }
        }

        info!("Link supervisor stopped");
    }
}
