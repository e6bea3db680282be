use crate::error::ProtocolError;
use crate::model::room::RoomId;
use crate::model::user::UserId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the unix epoch, the timestamp unit used on the wire.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatKind {
    Chat,
    Image,
    Join,
    Leave,
}

impl ChatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "CHAT",
            Self::Image => "IMAGE",
            Self::Join => "JOIN",
            Self::Leave => "LEAVE",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "CHAT" => Some(Self::Chat),
            "IMAGE" => Some(Self::Image),
            "JOIN" => Some(Self::Join),
            "LEAVE" => Some(Self::Leave),
            _ => None,
        }
    }
}

impl fmt::Display for ChatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatBody {
    Chat { content: String },
    Image { image_url: String, caption: String },
    Join,
    Leave,
}

/// Identity of a broadcast event for de-duplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageKey {
    pub kind: ChatKind,
    pub timestamp: u64,
    pub sender_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub body: ChatBody,
    pub timestamp: u64,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireChat {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    room_id: Option<RoomId>,
    #[serde(default)]
    sender_id: Option<UserId>,
    #[serde(default)]
    sender_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
    #[serde(default)]
    timestamp: u64,
}

impl ChatMessage {
    pub fn new(room_id: RoomId, sender_id: UserId, sender_name: impl Into<String>, body: ChatBody) -> Self {
        Self {
            room_id,
            sender_id,
            sender_name: sender_name.into(),
            body,
            timestamp: unix_millis(),
        }
    }

    pub fn chat(
        room_id: RoomId,
        sender_id: UserId,
        sender_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::new(
            room_id,
            sender_id,
            sender_name,
            ChatBody::Chat {
                content: content.into(),
            },
        )
    }

    pub fn image(
        room_id: RoomId,
        sender_id: UserId,
        sender_name: impl Into<String>,
        image_url: impl Into<String>,
    ) -> Self {
        Self::new(
            room_id,
            sender_id,
            sender_name,
            ChatBody::Image {
                image_url: image_url.into(),
                caption: "Sent an image".to_owned(),
            },
        )
    }

    pub fn join(room_id: RoomId, sender_id: UserId, sender_name: impl Into<String>) -> Self {
        Self::new(room_id, sender_id, sender_name, ChatBody::Join)
    }

    pub fn leave(room_id: RoomId, sender_id: UserId, sender_name: impl Into<String>) -> Self {
        Self::new(room_id, sender_id, sender_name, ChatBody::Leave)
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn kind(&self) -> ChatKind {
        match self.body {
            ChatBody::Chat { .. } => ChatKind::Chat,
            ChatBody::Image { .. } => ChatKind::Image,
            ChatBody::Join => ChatKind::Join,
            ChatBody::Leave => ChatKind::Leave,
        }
    }

    pub fn key(&self) -> MessageKey {
        MessageKey {
            kind: self.kind(),
            timestamp: self.timestamp,
            sender_id: self.sender_id.clone(),
        }
    }

    pub fn to_wire(&self) -> Result<Value, ProtocolError> {
        let (content, image_url) = match &self.body {
            ChatBody::Chat { content } => (Some(content.clone()), None),
            ChatBody::Image { image_url, caption } => (Some(caption.clone()), Some(image_url.clone())),
            ChatBody::Join | ChatBody::Leave => (None, None),
        };

        let wire = WireChat {
            kind: self.kind().as_str().to_owned(),
            room_id: Some(self.room_id.clone()),
            sender_id: Some(self.sender_id.clone()),
            sender_name: self.sender_name.clone(),
            content,
            image_url,
            timestamp: self.timestamp,
        };
        Ok(serde_json::to_value(wire)?)
    }

    /// Validates an inbound broadcast payload into a typed message.
    pub fn from_wire(value: Value) -> Result<Self, ProtocolError> {
        let raw_kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingField("type"))?;
        let kind = ChatKind::parse(raw_kind)
            .ok_or_else(|| ProtocolError::UnknownType(raw_kind.to_owned()))?;

        let wire: WireChat = serde_json::from_value(value)?;
        let body = match kind {
            ChatKind::Chat => ChatBody::Chat {
                content: wire.content.ok_or(ProtocolError::MissingField("content"))?,
            },
            ChatKind::Image => ChatBody::Image {
                image_url: wire.image_url.ok_or(ProtocolError::MissingField("imageUrl"))?,
                caption: wire.content.unwrap_or_default(),
            },
            ChatKind::Join => ChatBody::Join,
            ChatKind::Leave => ChatBody::Leave,
        };

        Ok(Self {
            room_id: wire.room_id.ok_or(ProtocolError::MissingField("roomId"))?,
            sender_id: wire
                .sender_id
                .ok_or(ProtocolError::MissingField("senderId"))?,
            sender_name: wire.sender_name,
            body,
            timestamp: wire.timestamp,
        })
    }
}
