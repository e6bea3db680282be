pub use meshroom_core::{ChatMessage, RoomId, SignalMessage, UserId};

pub mod model {
    pub use meshroom_core::*;
}

#[cfg(feature = "session")]
pub mod session {
    pub use meshroom_session::*;
}

#[cfg(feature = "relay")]
pub mod relay {
    pub use meshroom_relay::*;
}
