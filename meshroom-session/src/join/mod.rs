mod join_config;
mod join_coordinator;
mod membership;

pub use join_config::*;
pub use join_coordinator::*;
pub use membership::*;
