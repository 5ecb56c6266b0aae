//! Resubmission detection.
//!
//! A role that has already rendered a terminal decision for a purchase must
//! not decide again unless something materially changed since: either the
//! purchase record itself was modified, or an upstream chain role wrote a
//! newer ledger entry (re-sent the request after this role rejected it).
//! There is no explicit "awaiting resubmission" state; the check compares
//! timestamps across the ledger, so it inherits the ledger's wall-clock
//! ordering. The comparison runs inside the decision transaction, which is
//! what serializes two same-role racers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::status::StatusEntry;
use crate::roles::Role;

/// What unblocked a role that had already decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ResubmissionEvidence {
    /// The purchase record was modified after this role's decision. Note
    /// that any edit bumps the modification timestamp, including ones
    /// unrelated to the rejection.
    PurchaseModified,
    /// An upstream role wrote a newer ledger entry after this role's
    /// decision.
    UpstreamActivity { source: Role },
}

/// Outcome of the resubmission check for one (purchase, role) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResubmissionVerdict {
    /// No prior terminal decision by this role; permit unconditionally.
    FirstDecision,
    /// Prior terminal decision exists but qualifying change detected;
    /// permit and flag the response as a resubmission.
    Resubmitted(ResubmissionEvidence),
    /// Prior terminal decision stands and nothing changed; block.
    Blocked,
}

impl ResubmissionVerdict {
    pub fn permits(&self) -> bool {
        !matches!(self, Self::Blocked)
    }

    pub fn is_resubmission(&self) -> bool {
        matches!(self, Self::Resubmitted(_))
    }
}

/// Evaluate whether `role` may issue a new decision.
///
/// `own_latest` is the role's latest ledger entry regardless of active flag;
/// a deactivated rejection must still gate. `source_latest` carries the
/// latest-ever entry timestamp for each of the role's resubmission-source
/// roles (see `router::resubmission_sources`).
pub fn evaluate(
    own_latest: Option<&StatusEntry>,
    purchase_updated_at: DateTime<Utc>,
    source_latest: &[(Role, Option<DateTime<Utc>>)],
) -> ResubmissionVerdict {
    let Some(prior) = own_latest else {
        return ResubmissionVerdict::FirstDecision;
    };
    if !prior.status.is_terminal() {
        return ResubmissionVerdict::FirstDecision;
    }

    // Upstream entries also bump the purchase's modification timestamp, so
    // check them first to report the more specific evidence.
    for (source, created_at) in source_latest {
        if matches!(created_at, Some(at) if *at > prior.created_at) {
            return ResubmissionVerdict::Resubmitted(ResubmissionEvidence::UpstreamActivity {
                source: *source,
            });
        }
    }

    if purchase_updated_at > prior.created_at {
        return ResubmissionVerdict::Resubmitted(ResubmissionEvidence::PurchaseModified);
    }

    ResubmissionVerdict::Blocked
}
