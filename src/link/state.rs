//! Link state machine.
//!
//! One writer (the supervisor) applies events; everyone else observes the
//! resulting state through a watch channel.

use tracing::{debug, warn};

/// Transport link lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    /// Stack not started
    #[default]
    Idle,
    /// Association requested, not yet confirmed
    Associating,
    /// Associated to the network, no address yet
    Associated,
    /// Address acquired, link usable for broker traffic
    IpAcquired,
    /// Association lost, re-association pending
    Disconnected,
}

/// Events reported by a link driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    AssociationStarted,
    Associated,
    IpAcquired,
    AssociationLost,
}

/// Compute the state implied by a link event (pure function).
pub fn determine_next_state(current: LinkState, event: &LinkEvent) -> LinkState {
    let next = match event {
        LinkEvent::AssociationStarted => LinkState::Associating,
        LinkEvent::Associated => LinkState::Associated,
        LinkEvent::IpAcquired => LinkState::IpAcquired,
        LinkEvent::AssociationLost => LinkState::Disconnected,
    };
    if matches!(event, LinkEvent::AssociationLost) {
        warn!(from = ?current, "Link lost");
    } else {
        debug!(from = ?current, to = ?next, "Link state transition");
    }
    next
}

/// The link carries broker traffic only once an address is held.
pub fn is_ready(state: LinkState) -> bool {
    matches!(state, LinkState::IpAcquired)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let s = determine_next_state(LinkState::Idle, &LinkEvent::AssociationStarted);
        assert_eq!(s, LinkState::Associating);
        let s = determine_next_state(s, &LinkEvent::Associated);
        assert_eq!(s, LinkState::Associated);
        let s = determine_next_state(s, &LinkEvent::IpAcquired);
        assert_eq!(s, LinkState::IpAcquired);
    }

    #[test]
    fn test_loss_from_any_state() {
        for current in [
            LinkState::Idle,
            LinkState::Associating,
            LinkState::Associated,
            LinkState::IpAcquired,
        ] {
            assert_eq!(
                determine_next_state(current, &LinkEvent::AssociationLost),
                LinkState::Disconnected
            );
        }
    }

    #[test]
    fn test_readiness_requires_address() {
        assert!(is_ready(LinkState::IpAcquired));
        assert!(!is_ready(LinkState::Associated));
        assert!(!is_ready(LinkState::Associating));
        assert!(!is_ready(LinkState::Disconnected));
        assert!(!is_ready(LinkState::Idle));
    }
}
