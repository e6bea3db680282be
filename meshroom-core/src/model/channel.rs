use crate::model::room::RoomId;
use crate::model::user::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Subscription scope on the signaling server.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum Channel {
    /// Room-wide broadcast: chat events, JOIN/LEAVE.
    Room(RoomId),
    /// Single-recipient delivery: OFFER/ANSWER/ICE_CANDIDATE.
    User(UserId),
}

impl Channel {
    pub fn is_broadcast(&self) -> bool {
        matches!(self, Self::Room(_))
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Room(room) => write!(f, "/topic/room.{room}"),
            Self::User(user) => write!(f, "/queue/signal.{user}"),
        }
    }
}

/// Outbound publish operations accepted by the signaling server.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Destination {
    #[serde(rename = "chat.join")]
    ChatJoin,
    #[serde(rename = "chat.send")]
    ChatSend,
    #[serde(rename = "chat.leave")]
    ChatLeave,
    #[serde(rename = "signal.offer")]
    SignalOffer,
    #[serde(rename = "signal.answer")]
    SignalAnswer,
    #[serde(rename = "signal.ice_candidate")]
    SignalIceCandidate,
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChatJoin => "chat.join",
            Self::ChatSend => "chat.send",
            Self::ChatLeave => "chat.leave",
            Self::SignalOffer => "signal.offer",
            Self::SignalAnswer => "signal.answer",
            Self::SignalIceCandidate => "signal.ice_candidate",
        }
    }

    pub fn is_signal(&self) -> bool {
        matches!(
            self,
            Self::SignalOffer | Self::SignalAnswer | Self::SignalIceCandidate
        )
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
