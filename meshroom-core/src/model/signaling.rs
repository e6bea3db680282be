use crate::error::ProtocolError;
use crate::model::channel::Destination;
use crate::model::room::RoomId;
use crate::model::user::UserId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

/// Session description as exchanged by browsers: `{"type": "offer", "sdp": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(
        default,
        rename = "sdpMLineIndex",
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_mline_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_mline_index: None,
            username_fragment: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Join,
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Join => "JOIN",
            Self::Offer => "OFFER",
            Self::Answer => "ANSWER",
            Self::IceCandidate => "ICE_CANDIDATE",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "JOIN" => Some(Self::Join),
            "OFFER" => Some(Self::Offer),
            "ANSWER" => Some(Self::Answer),
            "ICE_CANDIDATE" => Some(Self::IceCandidate),
            _ => None,
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalRoute {
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub target_id: Option<UserId>,
}

/// Negotiation messages. `Join` is broadcast; the rest are unicast to `target_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalMessage {
    Join {
        route: SignalRoute,
    },
    Offer {
        route: SignalRoute,
        description: SessionDescription,
    },
    Answer {
        route: SignalRoute,
        description: SessionDescription,
    },
    IceCandidate {
        route: SignalRoute,
        candidate: IceCandidate,
    },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSignal {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    room_id: Option<RoomId>,
    #[serde(default)]
    sender_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    signal: Value,
}

impl SignalMessage {
    pub fn join(room_id: RoomId, sender_id: UserId) -> Self {
        Self::Join {
            route: SignalRoute {
                room_id,
                sender_id,
                target_id: None,
            },
        }
    }

    pub fn offer(
        room_id: RoomId,
        sender_id: UserId,
        target_id: UserId,
        description: SessionDescription,
    ) -> Self {
        Self::Offer {
            route: SignalRoute {
                room_id,
                sender_id,
                target_id: Some(target_id),
            },
            description,
        }
    }

    pub fn answer(
        room_id: RoomId,
        sender_id: UserId,
        target_id: UserId,
        description: SessionDescription,
    ) -> Self {
        Self::Answer {
            route: SignalRoute {
                room_id,
                sender_id,
                target_id: Some(target_id),
            },
            description,
        }
    }

    pub fn ice_candidate(
        room_id: RoomId,
        sender_id: UserId,
        target_id: UserId,
        candidate: IceCandidate,
    ) -> Self {
        Self::IceCandidate {
            route: SignalRoute {
                room_id,
                sender_id,
                target_id: Some(target_id),
            },
            candidate,
        }
    }

    pub fn kind(&self) -> SignalKind {
        match self {
            Self::Join { .. } => SignalKind::Join,
            Self::Offer { .. } => SignalKind::Offer,
            Self::Answer { .. } => SignalKind::Answer,
            Self::IceCandidate { .. } => SignalKind::IceCandidate,
        }
    }

    pub fn route(&self) -> &SignalRoute {
        match self {
            Self::Join { route }
            | Self::Offer { route, .. }
            | Self::Answer { route, .. }
            | Self::IceCandidate { route, .. } => route,
        }
    }

    pub fn sender(&self) -> &UserId {
        &self.route().sender_id
    }

    pub fn target(&self) -> Option<&UserId> {
        self.route().target_id.as_ref()
    }

    pub fn destination(&self) -> Destination {
        match self {
            Self::Join { .. } => Destination::ChatJoin,
            Self::Offer { .. } => Destination::SignalOffer,
            Self::Answer { .. } => Destination::SignalAnswer,
            Self::IceCandidate { .. } => Destination::SignalIceCandidate,
        }
    }

    pub fn to_wire(&self) -> Result<Value, ProtocolError> {
        let route = self.route();
        let signal = match self {
            Self::Join { .. } => Value::Null,
            Self::Offer { description, .. } | Self::Answer { description, .. } => {
                serde_json::to_value(description)?
            }
            Self::IceCandidate { candidate, .. } => serde_json::to_value(candidate)?,
        };

        let wire = WireSignal {
            kind: self.kind().as_str().to_owned(),
            room_id: Some(route.room_id.clone()),
            sender_id: Some(route.sender_id.clone()),
            target_id: route.target_id.clone(),
            signal,
        };
        Ok(serde_json::to_value(wire)?)
    }

    /// Validates an inbound payload into a typed message.
    pub fn from_wire(value: Value) -> Result<Self, ProtocolError> {
        let raw_kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingField("type"))?;
        let kind = SignalKind::parse(raw_kind)
            .ok_or_else(|| ProtocolError::UnknownType(raw_kind.to_owned()))?;

        let wire: WireSignal = serde_json::from_value(value)?;
        let route = SignalRoute {
            room_id: wire.room_id.ok_or(ProtocolError::MissingField("roomId"))?,
            sender_id: wire
                .sender_id
                .ok_or(ProtocolError::MissingField("senderId"))?,
            target_id: wire.target_id,
        };

        match kind {
            SignalKind::Join => Ok(Self::Join { route }),
            SignalKind::Offer => {
                let signal = unicast_payload(&route, wire.signal)?;
                let description = parse_description(signal, SdpKind::Offer)?;
                Ok(Self::Offer { route, description })
            }
            SignalKind::Answer => {
                let signal = unicast_payload(&route, wire.signal)?;
                let description = parse_description(signal, SdpKind::Answer)?;
                Ok(Self::Answer { route, description })
            }
            SignalKind::IceCandidate => {
                let signal = unicast_payload(&route, wire.signal)?;
                let candidate: IceCandidate = serde_json::from_value(signal)?;
                Ok(Self::IceCandidate { route, candidate })
            }
        }
    }
}

/// Unicast messages need a target and a payload.
fn unicast_payload(route: &SignalRoute, signal: Value) -> Result<Value, ProtocolError> {
    if route.target_id.is_none() {
        return Err(ProtocolError::MissingField("targetId"));
    }
    if signal.is_null() {
        return Err(ProtocolError::MissingField("signal"));
    }
    Ok(signal)
}

fn parse_description(signal: Value, expected: SdpKind) -> Result<SessionDescription, ProtocolError> {
    let description: SessionDescription = serde_json::from_value(signal)?;
    if description.kind != expected {
        return Err(ProtocolError::Malformed(format!(
            "expected {:?} description, got {:?}",
            expected, description.kind
        )));
    }
    Ok(description)
}
