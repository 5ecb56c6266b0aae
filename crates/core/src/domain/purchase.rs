use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::material::MaterialId;
use crate::roles::Role;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PurchaseId(pub String);

/// One procurement ask. Mutated by every role during the chain (the
/// last-modified columns move on each status transition) but never deleted
/// by the workflow itself; removal is a soft-delete flag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub id: PurchaseId,
    pub requester_id: String,
    pub requester_name: String,
    pub requester_role: Role,
    pub project_ref: String,
    pub material_ids: Vec<MaterialId>,
    pub purpose: String,
    pub location: String,
    pub attachment_ref: Option<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl PurchaseRequest {
    /// Bump the last-modified columns; called by the workflow on every
    /// status transition.
    pub fn touch(&mut self, actor_id: impl Into<String>, at: DateTime<Utc>) {
        self.updated_at = at;
        self.updated_by = actor_id.into();
    }
}
