//! Link state and valid transitions

use std::fmt;

/// State of the single managed link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No workers active
    Idle,
    /// Accepting inbound connections
    Listening,
    /// Dialing an outbound connection
    Connecting,
    /// Link established, session running
    Connected,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Idle => write!(f, "idle"),
            LinkState::Listening => write!(f, "listening"),
            LinkState::Connecting => write!(f, "connecting"),
            LinkState::Connected => write!(f, "connected"),
        }
    }
}

/// Check whether a transition between two states is valid
pub fn is_valid_transition(from: LinkState, to: LinkState) -> bool {
    use LinkState::*;

    match (from, to) {
        // Same state is always valid
        (a, b) if a == b => true,

        // stop() is allowed from anywhere
        (_, Idle) => true,

        // start() from idle, recovery after a failed dial or a lost link
        (Idle | Connecting | Connected, Listening) => true,

        // Dialing out; allowed without a prior start(), and a re-dial
        // replaces an established session
        (Idle | Listening | Connected, Connecting) => true,

        // Establishment from an accepted or dialed transport
        (Listening | Connecting, Connected) => true,

        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LinkState::*;

    #[test]
    fn test_normal_connect_flow() {
        assert!(is_valid_transition(Idle, Listening));
        assert!(is_valid_transition(Listening, Connecting));
        assert!(is_valid_transition(Connecting, Connected));
        assert!(is_valid_transition(Listening, Connected));
    }

    #[test]
    fn test_recovery_returns_to_listening() {
        // Failed dial
        assert!(is_valid_transition(Connecting, Listening));
        // Lost link
        assert!(is_valid_transition(Connected, Listening));
    }

    #[test]
    fn test_stop_from_any_state() {
        for from in [Idle, Listening, Connecting, Connected] {
            assert!(is_valid_transition(from, Idle));
        }
    }

    #[test]
    fn test_no_establishment_without_a_worker() {
        assert!(!is_valid_transition(Idle, Connected));
    }

    #[test]
    fn test_display() {
        assert_eq!(Listening.to_string(), "listening");
        assert_eq!(Connected.to_string(), "connected");
    }
}
