use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use reqflow_core::domain::purchase::PurchaseId;
use reqflow_core::domain::status::{
    DecisionStatus, EntryId, NewDecision, RejectCategory, StatusEntry,
};
use reqflow_core::roles::Role;

use super::purchase::{parse_role, parse_timestamp};
use super::{RepositoryError, StatusLedger};
use crate::DbPool;

pub struct SqlStatusLedger {
    pool: DbPool,
}

impl SqlStatusLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_status(raw: &str) -> Result<DecisionStatus, RepositoryError> {
    match raw {
        "pending" => Ok(DecisionStatus::Pending),
        "approved" => Ok(DecisionStatus::Approved),
        "rejected" => Ok(DecisionStatus::Rejected),
        other => Err(RepositoryError::Decode(format!("unknown decision status `{other}`"))),
    }
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<StatusEntry, RepositoryError> {
    let sender: String =
        row.try_get("sender_role").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let receiver: String =
        row.try_get("receiver_role").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let decision_date: String =
        row.try_get("decision_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let reject_category: Option<String> =
        row.try_get("reject_category").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let reject_category = match reject_category.as_deref() {
        None => None,
        Some(raw) => Some(RejectCategory::parse(raw).ok_or_else(|| {
            RepositoryError::Decode(format!("unknown reject category `{raw}`"))
        })?),
    };

    Ok(StatusEntry {
        id: EntryId(row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?),
        purchase_id: PurchaseId(
            row.try_get("purchase_id").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        ),
        sender: parse_role(&sender, "sender_role")?,
        receiver: parse_role(&receiver, "receiver_role")?,
        status: parse_status(&status)?,
        decision_by_id: row
            .try_get("decision_by_id")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        decision_by_name: row
            .try_get("decision_by_name")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        decision_date: parse_timestamp(&decision_date, "decision_date")?,
        rejection_reason: row
            .try_get("rejection_reason")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        reject_category,
        comments: row.try_get("comments").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        is_active: row
            .try_get::<i64, _>("is_active")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?
            != 0,
        created_at: parse_timestamp(&created_at, "created_at")?,
    })
}

fn current_status(row: &sqlx::sqlite::SqliteRow) -> Result<DecisionStatus, RepositoryError> {
    let status: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    parse_status(&status)
}

const ENTRY_COLUMNS: &str = "id, purchase_id, sender_role, receiver_role, status,
        decision_by_id, decision_by_name, decision_date, rejection_reason,
        reject_category, comments, is_active, created_at";

#[async_trait::async_trait]
impl StatusLedger for SqlStatusLedger {
    async fn record_decision(
        &self,
        decision: NewDecision,
        expected_prior: Option<EntryId>,
    ) -> Result<StatusEntry, RepositoryError> {
        let now = Utc::now();
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

        let mut tx = self.pool.begin().await?;

        // Re-read the sender's latest entry inside the transaction. A racer
        // that committed between evaluation and this write shows up here, and
        // the stale decision is refused instead of silently deactivating the
        // racer's entry.
        let current = sqlx::query(
            "SELECT id, status FROM purchase_status
             WHERE purchase_id = ? AND sender_role = ?
             ORDER BY created_at DESC, rowid DESC LIMIT 1",
        )
        .bind(&entry.purchase_id.0)
        .bind(entry.sender.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        match (&current, &expected_prior) {
            (None, None) => {}
            (Some(row), expected) => {
                let id: String =
                    row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                if expected.as_ref().map(|e| e.0.as_str()) != Some(id.as_str()) {
                    return Err(RepositoryError::DecisionSuperseded {
                        purchase: entry.purchase_id.0.clone(),
                        sender: entry.sender,
                        status: current_status(row)?,
                    });
                }
            }
            (None, Some(expected)) => {
                return Err(RepositoryError::Decode(format!(
                    "expected prior entry `{}` is missing from the ledger",
                    expected.0
                )));
            }
        }

        sqlx::query(
            "UPDATE purchase_status SET is_active = 0
             WHERE purchase_id = ? AND sender_role = ? AND is_active = 1",
        )
        .bind(&entry.purchase_id.0)
        .bind(entry.sender.as_str())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO purchase_status (id, purchase_id, sender_role, receiver_role, status,
                                          decision_by_id, decision_by_name, decision_date,
                                          rejection_reason, reject_category, comments,
                                          is_active, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?)",
        )
        .bind(&entry.id.0)
        .bind(&entry.purchase_id.0)
        .bind(entry.sender.as_str())
        .bind(entry.receiver.as_str())
        .bind(entry.status.as_str())
        .bind(&entry.decision_by_id)
        .bind(&entry.decision_by_name)
        .bind(entry.decision_date.to_rfc3339())
        .bind(&entry.rejection_reason)
        .bind(entry.reject_category.map(|c| c.as_str()))
        .bind(&entry.comments)
        .bind(entry.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        let touched = sqlx::query(
            "UPDATE purchase_request SET updated_at = ?, updated_by = ?
             WHERE id = ? AND is_deleted = 0",
        )
        .bind(now.to_rfc3339())
        .bind(&entry.decision_by_id)
        .bind(&entry.purchase_id.0)
        .execute(&mut *tx)
        .await?;

        // Dropping the transaction without commit rolls back the ledger
        // insert, so a vanished purchase never leaves an orphan entry.
        if touched.rows_affected() == 0 {
            return Err(RepositoryError::PurchaseMissing(entry.purchase_id.0.clone()));
        }

        tx.commit().await?;
        Ok(entry)
    }

    async fn latest_active_decision(
        &self,
        purchase_id: &PurchaseId,
        role: Role,
    ) -> Result<Option<StatusEntry>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM purchase_status
             WHERE purchase_id = ? AND sender_role = ? AND is_active = 1
             ORDER BY created_at DESC, rowid DESC LIMIT 1"
        ))
        .bind(&purchase_id.0)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_entry(r)?)),
            None => Ok(None),
        }
    }

    async fn latest_decision_ever(
        &self,
        purchase_id: &PurchaseId,
        role: Role,
    ) -> Result<Option<StatusEntry>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM purchase_status
             WHERE purchase_id = ? AND sender_role = ?
             ORDER BY created_at DESC, rowid DESC LIMIT 1"
        ))
        .bind(&purchase_id.0)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_entry(r)?)),
            None => Ok(None),
        }
    }

    async fn history(
        &self,
        purchase_id: &PurchaseId,
    ) -> Result<Vec<StatusEntry>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM purchase_status
             WHERE purchase_id = ?
             ORDER BY created_at ASC, rowid ASC"
        ))
        .bind(&purchase_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }

    async fn latest_overall(
        &self,
        purchase_id: &PurchaseId,
    ) -> Result<Option<StatusEntry>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM purchase_status
             WHERE purchase_id = ?
             ORDER BY created_at DESC, rowid DESC LIMIT 1"
        ))
        .bind(&purchase_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_entry(r)?)),
            None => Ok(None),
        }
    }
}
