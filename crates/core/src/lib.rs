pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod resubmission;
pub mod roles;
pub mod router;

pub use domain::material::{total_cost, Material, MaterialId, MaterialPriority};
pub use domain::purchase::{PurchaseId, PurchaseRequest};
pub use domain::status::{DecisionStatus, EntryId, NewDecision, RejectCategory, StatusEntry};
pub use errors::WorkflowError;
pub use resubmission::{ResubmissionEvidence, ResubmissionVerdict};
pub use roles::{Actor, Role, RoleProfile, UnknownRole};
pub use router::{resubmission_sources, route, routing_message, RouteTarget, RoutingError};
