//! Wire types of the identity service.

use serde::{Deserialize, Serialize};

/// Identity returned for an accepted credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    pub user_id: String,
    pub role: String,
}
