//! Session state machine.
//!
//! Transitions are pure functions over [`SessionEvent`] so the policy can
//! be tested without a broker. The supervisor in `mqtt.rs` feeds it events
//! observed on the rumqttc event loop.

use tracing::{debug, warn};

/// Broker session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No connection and no supervisor activity
    #[default]
    Disconnected,
    /// Connect or reconnect in flight, ConnAck not yet seen
    Connecting,
    /// ConnAck received, publishes are accepted
    Connected,
    /// Last poll failed with a protocol or transport error
    Error,
}

/// Events observed on the broker connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Broker acknowledged the connection
    ConnAckReceived,
    /// Broker closed the connection cleanly
    DisconnectedByBroker,
    /// Event loop poll failed
    ProtocolError(String),
    /// Supervisor started reconnect attempt `n`
    ReconnectStarted(u32),
}

/// Compute the state implied by a session event.
pub fn determine_next_state(event: &SessionEvent) -> SessionState {
    match event {
        SessionEvent::ConnAckReceived => {
            debug!("Broker acknowledged connection");
            SessionState::Connected
        }
        SessionEvent::DisconnectedByBroker => {
            warn!("Broker closed the connection");
            SessionState::Disconnected
        }
        SessionEvent::ProtocolError(reason) => {
            warn!(reason = %reason, "Session entered error state");
            SessionState::Error
        }
        SessionEvent::ReconnectStarted(attempt) => {
            debug!(attempt = attempt, "Reconnect attempt started");
            SessionState::Connecting
        }
    }
}

/// Publishes are accepted only while connected.
pub fn can_publish(state: SessionState) -> bool {
    matches!(state, SessionState::Connected)
}

/// Subscribe intents can be recorded in any state but are only issued
/// against a live connection.
pub fn can_subscribe(state: SessionState) -> bool {
    matches!(state, SessionState::Connected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connack_connects() {
        assert_eq!(
            determine_next_state(&SessionEvent::ConnAckReceived),
            SessionState::Connected
        );
    }

    #[test]
    fn test_broker_disconnect() {
        assert_eq!(
            determine_next_state(&SessionEvent::DisconnectedByBroker),
            SessionState::Disconnected
        );
    }

    #[test]
    fn test_error_and_reconnect() {
        assert_eq!(
            determine_next_state(&SessionEvent::ProtocolError("io".to_string())),
            SessionState::Error
        );
        assert_eq!(
            determine_next_state(&SessionEvent::ReconnectStarted(3)),
            SessionState::Connecting
        );
    }

    #[test]
    fn test_publish_gating() {
        assert!(can_publish(SessionState::Connected));
        assert!(!can_publish(SessionState::Connecting));
        assert!(!can_publish(SessionState::Disconnected));
        assert!(!can_publish(SessionState::Error));
        assert!(can_subscribe(SessionState::Connected));
        assert!(!can_subscribe(SessionState::Error));
    }
}
