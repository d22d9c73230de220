//! Per-connection transport state machine (§4.5).

/// `CONNECTING → AWAIT_VALIDATION → AUTHENTICATING → VERIFIED → CLOSED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Connecting,
    AwaitValidation,
    Authenticating,
    Verified,
    Closed,
}

impl TransportState {
    /// Operations attempted before `Verified` are queued, not flushed
    /// (§4.5).
    pub fn accepts_flush(self) -> bool {
        matches!(self, TransportState::Verified)
    }

    pub fn is_closed(self) -> bool {
        matches!(self, TransportState::Closed)
    }

    /// Advances to the next state in the connection-establishment
    /// sequence; returns `None` for a transition not defined by the state
    /// machine (including anything attempted once `Closed`).
    pub fn advance(self, event: TransportEvent) -> Option<TransportState> {
        use TransportEvent::*;
        use TransportState::*;
        match (self, event) {
            (Connecting, SocketOpen) => Some(AwaitValidation),
            (AwaitValidation, PluginSelected) => Some(Authenticating),
            (Authenticating, AuthnzCompleted { success: true }) => Some(Verified),
            (Authenticating, AuthnzCompleted { success: false }) => Some(Closed),
            (_, Close) if self != Closed => Some(Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    SocketOpen,
    PluginSelected,
    AuthnzCompleted { success: bool },
    Close,
}

#[cfg(test)]
mod tests {
    use super::*;
    use TransportState::*;

    #[test]
    fn happy_path_reaches_verified() {
        let mut state = Connecting;
        state = state.advance(TransportEvent::SocketOpen).unwrap();
        assert_eq!(state, AwaitValidation);
        state = state.advance(TransportEvent::PluginSelected).unwrap();
        assert_eq!(state, Authenticating);
        state = state
            .advance(TransportEvent::AuthnzCompleted { success: true })
            .unwrap();
        assert_eq!(state, Verified);
        assert!(state.accepts_flush());
    }

    #[test]
    fn failed_authnz_closes() {
        let state = Authenticating
            .advance(TransportEvent::AuthnzCompleted { success: false })
            .unwrap();
        assert_eq!(state, Closed);
    }

    #[test]
    fn close_is_reachable_from_any_open_state_once() {
        assert_eq!(Verified.advance(TransportEvent::Close), Some(Closed));
        assert_eq!(Closed.advance(TransportEvent::Close), None);
    }

    #[test]
    fn unverified_state_does_not_accept_flush() {
        assert!(!AwaitValidation.accepts_flush());
    }
}
