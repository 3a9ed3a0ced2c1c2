//! Query results returned to callers.

use serde::{Deserialize, Serialize};

/// Public identities of the two configured keys, as SPKI PEM.
///
/// A `None` field means the corresponding key has not been provisioned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyIdentities {
    pub backend_public_key: Option<String>,
    pub webserver_public_key: Option<String>,
}

impl KeyIdentities {
    pub fn is_empty(&self) -> bool {
        self.backend_public_key.is_none() && self.webserver_public_key.is_none()
    }
}
