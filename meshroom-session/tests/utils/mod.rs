pub mod fake_link;
pub mod mock_signal_sink;

pub use fake_link::*;
pub use mock_collaborators::*;
pub use mock_signal_sink::*;
pub use relay_connector::*;
pub use scripted_connector::*;
