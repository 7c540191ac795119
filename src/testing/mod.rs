//! Test doubles for the bridge seams: broker session, sensor and link
//! driver. Used by unit and integration tests.

pub mod mocks;

pub use mocks::{scripted_link, MockSession, ScriptedLinkDriver, ScriptedSensor};
