use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::purchase::PurchaseId;
use crate::roles::Role;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Pending,
    Approved,
    Rejected,
}

impl DecisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Approved and rejected gate further action by the same role; pending
    /// does not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl std::fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role-specific rejection sub-reason. Only Estimation's routing branches on
/// it; cost sends the request back to Procurement, pm_flag back to the
/// Project Manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectCategory {
    Cost,
    PmFlag,
}

impl RejectCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cost => "cost",
            Self::PmFlag => "pm_flag",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cost" => Some(Self::Cost),
            "pm_flag" | "pmflag" => Some(Self::PmFlag),
            _ => None,
        }
    }
}

/// One ledger row. Immutable once written; superseded rows are deactivated,
/// never updated or deleted, so the full history stays inspectable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub id: EntryId,
    pub purchase_id: PurchaseId,
    pub sender: Role,
    pub receiver: Role,
    pub status: DecisionStatus,
    pub decision_by_id: String,
    pub decision_by_name: String,
    pub decision_date: DateTime<Utc>,
    pub rejection_reason: Option<String>,
    pub reject_category: Option<RejectCategory>,
    pub comments: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for one ledger write; the ledger assigns the id, active flag and
/// creation timestamp.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewDecision {
    pub purchase_id: PurchaseId,
    pub sender: Role,
    pub receiver: Role,
    pub status: DecisionStatus,
    pub decision_by_id: String,
    pub decision_by_name: String,
    pub rejection_reason: Option<String>,
    pub reject_category: Option<RejectCategory>,
    pub comments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{DecisionStatus, RejectCategory};

    #[test]
    fn terminal_statuses_gate_resubmission() {
        assert!(DecisionStatus::Approved.is_terminal());
        assert!(DecisionStatus::Rejected.is_terminal());
        assert!(!DecisionStatus::Pending.is_terminal());
    }

    #[test]
    fn reject_category_parses_wire_spellings() {
        assert_eq!(RejectCategory::parse("cost"), Some(RejectCategory::Cost));
        assert_eq!(RejectCategory::parse("pm_flag"), Some(RejectCategory::PmFlag));
        assert_eq!(RejectCategory::parse("PmFlag"), Some(RejectCategory::PmFlag));
        assert_eq!(RejectCategory::parse("budget"), None);
    }
}
