//! Service-level settings.

use crate::token::TokenPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings that shape how the service admits files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Reject tokens older than this many seconds. Unset disables expiry.
    pub token_max_age_secs: Option<u64>,
    /// How far ahead of the local clock a token may be stamped.
    pub token_max_clock_skew_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            token_max_age_secs: None,
            token_max_clock_skew_secs: TokenPolicy::DEFAULT_CLOCK_SKEW.as_secs(),
        }
    }
}

impl ServiceConfig {
    pub fn token_policy(&self) -> TokenPolicy {
        let skew = Duration::from_secs(self.token_max_clock_skew_secs);
        match self.token_max_age_secs {
            Some(secs) => TokenPolicy::expiring(Duration::from_secs(secs)).with_clock_skew(skew),
            None => TokenPolicy::disabled().with_clock_skew(skew),
        }
    }
}
