mod message_log;
mod session_event;
mod session_loop;
mod session_orchestrator;
mod upload;

pub use message_log::*;
pub use session_event::*;
pub use session_orchestrator::*;
pub use upload::*;
