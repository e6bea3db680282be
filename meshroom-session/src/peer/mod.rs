mod peer_command;
mod peer_config;
mod peer_context;
mod peer_link;
mod peer_manager;
mod peer_session;
mod peer_state;
mod peer_worker;
mod rtc_link;
mod signal_sink;

pub use peer_command::*;
pub use peer_config::*;
pub use peer_context::*;
pub use peer_link::*;
pub use peer_manager::*;
pub use peer_session::*;
pub use peer_state::*;
pub use rtc_link::*;
pub use signal_sink::*;
