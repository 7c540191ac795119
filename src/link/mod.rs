//! Transport link: association lifecycle, readiness gating and supervision.
//!
//! The [`LinkDriver`] trait is the seam between the supervisor and the
//! platform. Production uses [`ProbeLinkDriver`], which delegates
//! association to the host supplicant and watches reachability; tests
//! drive the supervisor with scripted events.

pub mod probe;
pub mod readiness;
pub mod state;
pub mod supervisor;

pub use probe::ProbeLinkDriver;
pub use readiness::ReadinessGate;
pub use state::{determine_next_state, is_ready, LinkEvent, LinkState};
pub use supervisor::LinkSupervisor;

use async_trait::async_trait;
use thiserror::Error;

/// Transport link errors
#[derive(Debug, Error)]
pub enum LinkError {
    /// A driver's association request failed. The supervisor logs it and
    /// keeps consuming events; loss of an established link is reported as
    /// an event, not an error.
    #[error("Association failed: {0}")]
    AssociationFailed(String),

    #[error("Invalid probe target: {0}")]
    InvalidProbeTarget(String),
}

/// Source of link lifecycle events.
///
/// `associate` kicks off (re)association; progress and loss are reported
/// through `next_event`. Returning `None` ends supervision.
#[async_trait]
pub trait LinkDriver: Send {
    async fn associate(&mut self) -> Result<(), LinkError>;

    async fn next_event(&mut self) -> Option<LinkEvent>;
}
