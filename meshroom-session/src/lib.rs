mod config;
mod dedup;
mod error;
mod join;
mod media;
mod peer;
mod session;
mod transport;

pub use config::*;
pub use dedup::*;
pub use error::*;
pub use join::*;
pub use media::*;
pub use peer::*;
pub use session::*;
pub use transport::*;
