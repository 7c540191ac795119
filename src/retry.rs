//! Configurable retry strategy shared by the link and session layers.
//!
//! The default posture is the unattended-device one: retry forever. Fixed
//! delay, backoff ladder, and bounded variants are all expressible so a
//! test suite can pin deterministic configurations.

use serde::{Deserialize, Serialize};

/// Retry configuration for reconnection attempts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts (None = unlimited)
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// Backoff ladder in milliseconds; empty means a fixed delay
    #[serde(default)]
    pub backoff_pattern: Vec<u64>,
    /// Delay used once the ladder is exhausted (and the fixed delay when
    /// the ladder is empty)
    #[serde(default = "default_sustained_delay_ms")]
    pub sustained_delay_ms: u64,
}

fn default_sustained_delay_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            backoff_pattern: Vec::new(),
            sustained_delay_ms: default_sustained_delay_ms(),
        }
    }
}

/// Decision result for a retry attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Proceed with the attempt after the given delay
    Proceed { attempt: u32, delay_ms: u64 },
    /// Abort - shutdown was requested
    AbortShutdownRequested,
    /// Abort - attempt budget exhausted
    AbortExhausted,
}

impl RetryConfig {
    /// Default link-layer policy: retry forever on a short fixed delay.
    pub fn link_default() -> Self {
        Self {
            max_attempts: None,
            backoff_pattern: Vec::new(),
            sustained_delay_ms: 1000,
        }
    }

    /// Default session-layer policy: retry forever on a short backoff
    /// ladder sustained at five seconds.
    pub fn session_default() -> Self {
        Self {
            max_attempts: None,
            backoff_pattern: vec![500, 1000, 2000, 5000],
            sustained_delay_ms: 5000,
        }
    }

    /// Delay before the given attempt (1-based), walking the ladder and
    /// sustaining at `sustained_delay_ms` once it is exhausted.
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        if self.backoff_pattern.is_empty() {
            return self.sustained_delay_ms;
        }
        let index = attempt.saturating_sub(1) as usize;
        match self.backoff_pattern.get(index) {
            Some(delay) => *delay,
            None => self.sustained_delay_ms,
        }
    }

    /// Decide whether another attempt should be made.
    pub fn decide(&self, current_attempts: u32, shutdown_requested: bool) -> RetryDecision {
        if shutdown_requested {
            return RetryDecision::AbortShutdownRequested;
        }

        if let Some(max_attempts) = self.max_attempts {
            if current_attempts >= max_attempts {
                return RetryDecision::AbortExhausted;
            }
        }

        let attempt = current_attempts + 1;
        RetryDecision::Proceed {
            attempt,
            delay_ms: self.delay_for_attempt(attempt),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(max_attempts) = self.max_attempts {
            if max_attempts == 0 {
                return Err("max_attempts must be greater than 0 or absent for unlimited".into());
            }
        }
        if self.backoff_pattern.is_empty() && self.sustained_delay_ms == 0 {
            return Err("must have either a backoff_pattern or sustained_delay_ms > 0".into());
        }
        Ok(())
    }
}
