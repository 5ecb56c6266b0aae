use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use reqflow_core::domain::material::{Material, MaterialId};
use reqflow_core::domain::purchase::{PurchaseId, PurchaseRequest};
use reqflow_core::domain::status::{EntryId, NewDecision, StatusEntry};
use reqflow_core::roles::Role;

use super::{MaterialRepository, PurchaseRepository, RepositoryError, StatusLedger};

/// Hashmap-backed store for tests and local experiments. Mirrors the SQL
/// implementations' semantics, including the single-active-entry rule and
/// the touch of the parent purchase on every recorded decision.
#[derive(Default)]
pub struct InMemoryWorkflowStore {
    purchases: RwLock<HashMap<String, PurchaseRequest>>,
    entries: RwLock<Vec<StatusEntry>>,
    materials: RwLock<HashMap<String, Material>>,
    fail_recordings: AtomicBool,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `record_decision` fail, for exercising
    /// persistence error paths.
    pub fn poison_recordings(&self) {
        self.fail_recordings.store(true, Ordering::SeqCst);
    }

    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait::async_trait]
impl PurchaseRepository for InMemoryWorkflowStore {
    async fn find_by_id(
        &self,
        id: &PurchaseId,
    ) -> Result<Option<PurchaseRequest>, RepositoryError> {
        Ok(self.purchases.read().await.get(&id.0).cloned())
    }

    async fn save(&self, purchase: PurchaseRequest) -> Result<(), RepositoryError> {
        self.purchases.write().await.insert(purchase.id.0.clone(), purchase);
        Ok(())
    }
}

#[async_trait::async_trait]
impl MaterialRepository for InMemoryWorkflowStore {
    async fn find_by_ids(&self, ids: &[MaterialId]) -> Result<Vec<Material>, RepositoryError> {
        let materials = self.materials.read().await;
        Ok(ids.iter().filter_map(|id| materials.get(&id.0).cloned()).collect())
    }

    async fn save(&self, material: Material) -> Result<(), RepositoryError> {
        self.materials.write().await.insert(material.id.0.clone(), material);
        Ok(())
    }
}

#[async_trait::async_trait]
impl StatusLedger for InMemoryWorkflowStore {
    async fn record_decision(
        &self,
        decision: NewDecision,
        expected_prior: Option<EntryId>,
    ) -> Result<StatusEntry, RepositoryError> {
        if self.fail_recordings.load(Ordering::SeqCst) {
            return Err(RepositoryError::Decode("ledger poisoned".to_string()));
        }

        let now = Utc::now();
        let mut purchases = self.purchases.write().await;
        let purchase = purchases
            .get_mut(&decision.purchase_id.0)
            .filter(|p| !p.is_deleted)
            .ok_or_else(|| RepositoryError::PurchaseMissing(decision.purchase_id.0.clone()))?;

        let mut entries = self.entries.write().await;
        let current = entries
            .iter()
            .rev()
            .find(|e| e.purchase_id == decision.purchase_id && e.sender == decision.sender);
        match (current, &expected_prior) {
            (None, None) => {}
            (Some(current), expected)
                if expected.as_ref().map(|e| &e.0) != Some(&current.id.0) =>
            {
                return Err(RepositoryError::DecisionSuperseded {
                    purchase: decision.purchase_id.0.clone(),
                    sender: decision.sender,
                    status: current.status,
                });
            }
            (Some(_), _) => {}
            (None, Some(expected)) => {
                return Err(RepositoryError::Decode(format!(
                    "expected prior entry `{}` is missing from the ledger",
                    expected.0
                )));
            }
        }
        purchase.touch(&decision.decision_by_id, now);

        for entry in entries
            .iter_mut()
            .filter(|e| e.purchase_id == decision.purchase_id && e.sender == decision.sender)
        {
            entry.is_active = false;
        }

        let entry = StatusEntry {
            id: EntryId(Uuid::new_v4().to_string()),
            purchase_id: decision.purchase_id,
            sender: decision.sender,
            receiver: decision.receiver,
            status: decision.status,
            decision_by_id: decision.decision_by_id,
            decision_by_name: decision.decision_by_name,
            decision_date: now,
            rejection_reason: decision.rejection_reason,
            reject_category: decision.reject_category,
            comments: decision.comments,
            is_active: true,
            created_at: now,
        };
        entries.push(entry.clone());
        Ok(entry)
    }

    async fn latest_active_decision(
        &self,
        purchase_id: &PurchaseId,
        role: Role,
    ) -> Result<Option<StatusEntry>, RepositoryError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .rev()
            .find(|e| e.purchase_id == *purchase_id && e.sender == role && e.is_active)
            .cloned())
    }

    async fn latest_decision_ever(
        &self,
        purchase_id: &PurchaseId,
        role: Role,
    ) -> Result<Option<StatusEntry>, RepositoryError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .rev()
            .find(|e| e.purchase_id == *purchase_id && e.sender == role)
            .cloned())
    }

    async fn history(
        &self,
        purchase_id: &PurchaseId,
    ) -> Result<Vec<StatusEntry>, RepositoryError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|e| e.purchase_id == *purchase_id)
            .cloned()
            .collect())
    }

    async fn latest_overall(
        &self,
        purchase_id: &PurchaseId,
    ) -> Result<Option<StatusEntry>, RepositoryError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .rev()
            .find(|e| e.purchase_id == *purchase_id)
            .cloned())
    }
}
