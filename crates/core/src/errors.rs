use thiserror::Error;

use crate::domain::status::DecisionStatus;
use crate::roles::Role;

/// Workflow error taxonomy. Every variant maps to a distinct HTTP-equivalent
/// status at the server boundary; none except `Persistence` implies any
/// partial state.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("role `{actual}` is not permitted to act as `{expected}`")]
    Authorization { expected: Role, actual: Role },
    #[error("purchase request `{0}` was not found")]
    NotFound(String),
    #[error("{} has already {existing} this purchase request", role.display_name())]
    Conflict { role: Role, existing: DecisionStatus },
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl WorkflowError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// True when the operation left no observable state change behind.
    pub fn is_stateless(&self) -> bool {
        !matches!(self, Self::Persistence(_))
    }
}
