use std::fmt;

/// Negotiation state of one peer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerState {
    Idle,
    Negotiating,
    Connected,
    Closed,
    Failed,
}

impl PeerState {
    pub fn can_transition_to(self, next: PeerState) -> bool {
        use PeerState::*;

        match (self, next) {
            (Idle, Negotiating) => true,
            (Negotiating, Negotiating) => true,
            (Negotiating, Connected) => true,
            // renegotiation of a live session
            (Connected, Negotiating) => true,
            (Negotiating | Connected, Failed) => true,
            (Closed | Failed, _) => false,
            (_, Closed) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "IDLE",
            Self::Negotiating => "NEGOTIATING",
            Self::Connected => "CONNECTED",
            Self::Closed => "CLOSED",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}
