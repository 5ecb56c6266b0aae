use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::status::{DecisionStatus, RejectCategory};
use crate::roles::Role;

/// Where a decision routes the purchase next. `Requester` and `Payment` are
/// terminal for the chain; the processor resolves `Requester` to the
/// purchase's requester role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteTarget {
    Next(Role),
    Requester,
    Payment,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RoutingError {
    #[error("role `{0}` does not decide purchase requests")]
    NotAChainRole(Role),
    #[error("a rejection category (cost or pm_flag) is required when {} rejects", .0.display_name())]
    MissingCategory(Role),
    #[error("pending is not a routable decision outcome")]
    NotRoutable,
}

/// Static routing table over (role, outcome, category).
///
/// | role              | approved →        | rejected →                          |
/// |-------------------|-------------------|-------------------------------------|
/// | Procurement       | Project Manager   | requester (terminal)                |
/// | Project Manager   | Estimation        | Procurement                         |
/// | Estimation        | Technical Director| Procurement (cost) / PM (pm_flag)   |
/// | Technical Director| Accounts          | Estimation                          |
/// | Accounts          | payment (terminal)| Technical Director                  |
pub fn route(
    role: Role,
    outcome: DecisionStatus,
    category: Option<RejectCategory>,
) -> Result<RouteTarget, RoutingError> {
    use DecisionStatus::{Approved, Pending, Rejected};
    use Role::{Accounts, Estimation, Procurement, ProjectManager, TechnicalDirector};

    let target = match (role, outcome) {
        (_, Pending) => return Err(RoutingError::NotRoutable),
        (Procurement, Approved) => RouteTarget::Next(ProjectManager),
        (Procurement, Rejected) => RouteTarget::Requester,
        (ProjectManager, Approved) => RouteTarget::Next(Estimation),
        (ProjectManager, Rejected) => RouteTarget::Next(Procurement),
        (Estimation, Approved) => RouteTarget::Next(TechnicalDirector),
        // Estimation's rejection branch is an explicit caller input, never
        // inferred; the processor validates it before routing.
        (Estimation, Rejected) => match category {
            Some(RejectCategory::Cost) => RouteTarget::Next(Procurement),
            Some(RejectCategory::PmFlag) => RouteTarget::Next(ProjectManager),
            None => return Err(RoutingError::MissingCategory(Estimation)),
        },
        (TechnicalDirector, Approved) => RouteTarget::Next(Accounts),
        (TechnicalDirector, Rejected) => RouteTarget::Next(Estimation),
        (Accounts, Approved) => RouteTarget::Payment,
        (Accounts, Rejected) => RouteTarget::Next(TechnicalDirector),
        (other, _) => return Err(RoutingError::NotAChainRole(other)),
    };

    Ok(target)
}

/// Roles whose later ledger activity counts as evidence that a purchase was
/// re-sent to `role` after it rejected. Static adjacency, kept next to the
/// routing table so the two cannot drift apart.
pub fn resubmission_sources(role: Role) -> &'static [Role] {
    match role {
        Role::Procurement => &[],
        Role::ProjectManager => &[Role::Procurement],
        Role::Estimation => &[Role::ProjectManager, Role::Procurement],
        Role::TechnicalDirector => &[Role::Estimation],
        Role::Accounts => &[Role::TechnicalDirector],
        _ => &[],
    }
}

/// Human-readable routing message for the decision response.
pub fn routing_message(outcome: DecisionStatus, target: RouteTarget, requester: Role) -> String {
    match (outcome, target) {
        (DecisionStatus::Approved, RouteTarget::Payment) => "approved for payment".to_string(),
        (DecisionStatus::Approved, RouteTarget::Next(next)) => {
            format!("approved and sent to {}", next.display_name())
        }
        (DecisionStatus::Rejected, RouteTarget::Requester) => {
            format!("rejected and sent back to {}", requester.display_name())
        }
        (DecisionStatus::Rejected, RouteTarget::Next(next)) => {
            format!("rejected and sent back to {}", next.display_name())
        }
        // Remaining combinations are unreachable through `route`.
        (outcome, _) => outcome.to_string(),
    }
}
