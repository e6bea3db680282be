use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinConfig {
    /// Repeated JOINs from one peer inside this window are ignored.
    pub debounce: Duration,

    /// Wait between accepting a JOIN and offering, so the newcomer's direct
    /// subscription is live before the offer reaches the relay.
    pub offer_delay: Duration,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(2),
            offer_delay: Duration::from_secs(1),
        }
    }
}
