mod channel;
mod chat;
mod frame;
mod room;
mod signaling;
mod user;

pub use channel::{Channel, Destination};
pub use chat::{ChatBody, ChatKind, ChatMessage, MessageKey, unix_millis};
pub use frame::{ClientFrame, ServerFrame};
pub use room::RoomId;
pub use signaling::{IceCandidate, SdpKind, SessionDescription, SignalKind, SignalMessage, SignalRoute};
pub use user::{Participant, UserId};
