//! Observability for the bridge: structured logging via `tracing`.
//!
//! Logging is the only observability surface the bridge carries; every
//! recoverable failure (association loss, broker drop, sensor read error)
//! is reported here and retried.

pub mod logging;

// Re-export for convenience
pub use logging::{init_default_logging, init_logging, LogFormat};
