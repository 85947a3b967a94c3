use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::ActorRole;

/// Who performed an operation, in which role, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStamp {
    pub actor: String,
    pub role: ActorRole,
    pub at: DateTime<Utc>,
}

impl AuditStamp {
    pub fn new(actor: impl Into<String>, role: ActorRole, at: DateTime<Utc>) -> Self {
        Self {
            actor: actor.into(),
            role,
            at,
        }
    }

    /// Stamp for an operation happening now.
    pub fn now(actor: impl Into<String>, role: ActorRole) -> Self {
        Self::new(actor, role, Utc::now())
    }
}
