use crate::media::MediaStream;
use meshroom_core::{ChatMessage, UserId};
use std::sync::Arc;

/// Everything the UI layer reacts to.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Admitted chat event, already appended to the message log.
    Message(ChatMessage),

    StreamAdded {
        peer: UserId,
        stream: Arc<MediaStream>,
    },

    StreamRemoved {
        peer: UserId,
    },

    Connectivity(bool),

    /// Participant list fetched after the first connection.
    Participants(Vec<UserId>),

    /// The session can no longer operate and has stopped.
    Fatal {
        reason: String,
    },
}
