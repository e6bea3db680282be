mod connector;
mod signaling_transport;
mod transport_config;
mod transport_event;
mod ws_connector;

pub use connector::*;
pub use signaling_transport::*;
pub use transport_config::*;
pub use transport_event::*;
pub use ws_connector::*;
