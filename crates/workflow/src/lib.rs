//! Procurement approval workflow.
//!
//! Couples the pure routing and resubmission rules from `reqflow-core` to
//! the ledger and notifier, exposing a single [`DecisionProcessor`] that
//! every chain role's endpoint delegates to.

pub mod outcome;
pub mod processor;

pub use outcome::{DecisionCommand, DecisionOutcome};
pub use processor::DecisionProcessor;
