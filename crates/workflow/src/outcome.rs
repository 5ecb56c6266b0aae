use serde::{Deserialize, Serialize};

use reqflow_core::domain::status::{DecisionStatus, RejectCategory, StatusEntry};
use reqflow_core::resubmission::ResubmissionEvidence;

/// One decision as submitted by a chain role.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DecisionCommand {
    pub purchase_id: String,
    pub status: DecisionStatus,
    pub rejection_reason: Option<String>,
    /// Only consulted when Estimation rejects; ignored for every other role.
    pub reject_category: Option<RejectCategory>,
    pub comments: Option<String>,
}

/// What the processor hands back after a decision committed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DecisionOutcome {
    pub entry: StatusEntry,
    /// Human-readable routing summary, e.g. "approved and sent to Estimation".
    pub message: String,
    /// Present when this decision replaced an earlier terminal decision by
    /// the same role.
    pub resubmission: Option<ResubmissionEvidence>,
    /// Set when the decision committed but its notification did not go out.
    pub email_warning: bool,
}

#[cfg(test)]
mod tests {
    use reqflow_core::domain::status::{DecisionStatus, RejectCategory};

    use super::DecisionCommand;

    #[test]
    fn command_deserializes_from_request_payload() {
        let command: DecisionCommand = serde_json::from_value(serde_json::json!({
            "purchase_id": "PR-7",
            "status": "rejected",
            "rejection_reason": "quote exceeds budget line",
            "reject_category": "cost",
            "comments": null,
        }))
        .expect("deserialize");
        assert_eq!(command.status, DecisionStatus::Rejected);
        assert_eq!(command.reject_category, Some(RejectCategory::Cost));
    }
}
