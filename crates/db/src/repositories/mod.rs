use async_trait::async_trait;
use thiserror::Error;

use reqflow_core::domain::material::{Material, MaterialId};
use reqflow_core::domain::purchase::{PurchaseId, PurchaseRequest};
use reqflow_core::domain::status::{DecisionStatus, EntryId, NewDecision, StatusEntry};
use reqflow_core::roles::Role;

pub mod ledger;
pub mod material;
pub mod memory;
pub mod purchase;

pub use ledger::SqlStatusLedger;
pub use material::SqlMaterialRepository;
pub use memory::InMemoryWorkflowStore;
pub use purchase::SqlPurchaseRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("purchase request `{0}` not found")]
    PurchaseMissing(String),
    #[error("`{sender}` has recorded a newer decision for `{purchase}`")]
    DecisionSuperseded { purchase: String, sender: Role, status: DecisionStatus },
}

#[async_trait]
pub trait PurchaseRepository: Send + Sync {
    /// Returns the row regardless of the soft-delete flag; callers decide
    /// whether a deleted purchase counts as found.
    async fn find_by_id(&self, id: &PurchaseId)
        -> Result<Option<PurchaseRequest>, RepositoryError>;
    async fn save(&self, purchase: PurchaseRequest) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait MaterialRepository: Send + Sync {
    async fn find_by_ids(&self, ids: &[MaterialId]) -> Result<Vec<Material>, RepositoryError>;
    async fn save(&self, material: Material) -> Result<(), RepositoryError>;
}

/// Append-only decision ledger. The single source of truth for where a
/// purchase request currently sits in the chain.
#[async_trait]
pub trait StatusLedger: Send + Sync {
    /// Deactivates any existing active entry for `(purchase, sender)`,
    /// inserts the new active entry, and bumps the purchase's last-modified
    /// columns, all in one transaction.
    ///
    /// `expected_prior` is the sender's latest-ever entry id as seen when the
    /// decision was evaluated (`None` for a first decision). The write fails
    /// with `DecisionSuperseded` if the ledger has moved past that view, so a
    /// decision gated on stale state can never commit.
    async fn record_decision(
        &self,
        decision: NewDecision,
        expected_prior: Option<EntryId>,
    ) -> Result<StatusEntry, RepositoryError>;

    /// Current active entry where `sender = role`.
    async fn latest_active_decision(
        &self,
        purchase_id: &PurchaseId,
        role: Role,
    ) -> Result<Option<StatusEntry>, RepositoryError>;

    /// Most recent entry for that sender regardless of the active flag. A
    /// deactivated rejection must still be inspectable for resubmission
    /// comparison.
    async fn latest_decision_ever(
        &self,
        purchase_id: &PurchaseId,
        role: Role,
    ) -> Result<Option<StatusEntry>, RepositoryError>;

    /// Every entry ever written for the purchase, in creation order.
    async fn history(&self, purchase_id: &PurchaseId)
        -> Result<Vec<StatusEntry>, RepositoryError>;

    /// Most recent entry irrespective of sender.
    async fn latest_overall(
        &self,
        purchase_id: &PurchaseId,
    ) -> Result<Option<StatusEntry>, RepositoryError>;
}
