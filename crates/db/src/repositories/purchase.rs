use chrono::{DateTime, Utc};
use sqlx::Row;

use reqflow_core::domain::material::MaterialId;
use reqflow_core::domain::purchase::{PurchaseId, PurchaseRequest};
use reqflow_core::roles::Role;

use super::{PurchaseRepository, RepositoryError};
use crate::DbPool;

pub struct SqlPurchaseRepository {
    pool: DbPool,
}

impl SqlPurchaseRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn parse_timestamp(raw: &str, column: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

pub(crate) fn parse_role(raw: &str, column: &str) -> Result<Role, RepositoryError> {
    raw.parse::<Role>().map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

pub(crate) fn row_to_purchase(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<PurchaseRequest, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let requester_role: String =
        row.try_get("requester_role").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let material_ids_raw: String =
        row.try_get("material_ids").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let material_ids: Vec<String> = serde_json::from_str(&material_ids_raw)
        .map_err(|e| RepositoryError::Decode(format!("material_ids: {e}")))?;

    Ok(PurchaseRequest {
        id: PurchaseId(id),
        requester_id: row
            .try_get("requester_id")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        requester_name: row
            .try_get("requester_name")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        requester_role: parse_role(&requester_role, "requester_role")?,
        project_ref: row
            .try_get("project_ref")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        material_ids: material_ids.into_iter().map(MaterialId).collect(),
        purpose: row.try_get("purpose").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        location: row.try_get("location").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        attachment_ref: row
            .try_get("attachment_ref")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        is_deleted: row
            .try_get::<i64, _>("is_deleted")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?
            != 0,
        created_at: parse_timestamp(&created_at, "created_at")?,
        created_by: row.try_get("created_by").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        updated_at: parse_timestamp(&updated_at, "updated_at")?,
        updated_by: row.try_get("updated_by").map_err(|e| RepositoryError::Decode(e.to_string()))?,
    })
}

const PURCHASE_COLUMNS: &str = "id, requester_id, requester_name, requester_role, project_ref,
        material_ids, purpose, location, attachment_ref, is_deleted,
        created_at, created_by, updated_at, updated_by";

#[async_trait::async_trait]
impl PurchaseRepository for SqlPurchaseRepository {
    async fn find_by_id(
        &self,
        id: &PurchaseId,
    ) -> Result<Option<PurchaseRequest>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchase_request WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_purchase(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, purchase: PurchaseRequest) -> Result<(), RepositoryError> {
        let material_ids = serde_json::to_string(
            &purchase.material_ids.iter().map(|id| id.0.as_str()).collect::<Vec<_>>(),
        )
        .map_err(|e| RepositoryError::Decode(format!("material_ids: {e}")))?;

        sqlx::query(
            "INSERT INTO purchase_request (id, requester_id, requester_name, requester_role,
                                           project_ref, material_ids, purpose, location,
                                           attachment_ref, is_deleted, created_at, created_by,
                                           updated_at, updated_by)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 project_ref = excluded.project_ref,
                 material_ids = excluded.material_ids,
                 purpose = excluded.purpose,
                 location = excluded.location,
                 attachment_ref = excluded.attachment_ref,
                 is_deleted = excluded.is_deleted,
                 updated_at = excluded.updated_at,
                 updated_by = excluded.updated_by",
        )
        .bind(&purchase.id.0)
        .bind(&purchase.requester_id)
        .bind(&purchase.requester_name)
        .bind(purchase.requester_role.as_str())
        .bind(&purchase.project_ref)
        .bind(&material_ids)
        .bind(&purchase.purpose)
        .bind(&purchase.location)
        .bind(&purchase.attachment_ref)
        .bind(i64::from(purchase.is_deleted))
        .bind(purchase.created_at.to_rfc3339())
        .bind(&purchase.created_by)
        .bind(purchase.updated_at.to_rfc3339())
        .bind(&purchase.updated_by)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use reqflow_core::domain::material::MaterialId;
    use reqflow_core::domain::purchase::{PurchaseId, PurchaseRequest};
    use reqflow_core::roles::Role;

    use super::SqlPurchaseRepository;
    use crate::repositories::PurchaseRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn sample_purchase(id: &str) -> PurchaseRequest {
        let now = Utc::now();
        PurchaseRequest {
            id: PurchaseId(id.to_string()),
            requester_id: "u-site-1".to_string(),
            requester_name: "A. Mason".to_string(),
            requester_role: Role::SiteSupervisor,
            project_ref: "PRJ-OFFICE-7F".to_string(),
            material_ids: vec![MaterialId("MAT-1".to_string()), MaterialId("MAT-2".to_string())],
            purpose: "gypsum partition works".to_string(),
            location: "Level 7".to_string(),
            attachment_ref: Some("uploads/boq-7f.pdf".to_string()),
            is_deleted: false,
            created_at: now,
            created_by: "u-site-1".to_string(),
            updated_at: now,
            updated_by: "u-site-1".to_string(),
        }
    }

    #[tokio::test]
    async fn save_and_find_round_trips_material_id_list() {
        let pool = setup().await;
        let repo = SqlPurchaseRepository::new(pool);

        repo.save(sample_purchase("PR-10")).await.expect("save");
        let found = repo
            .find_by_id(&PurchaseId("PR-10".to_string()))
            .await
            .expect("find")
            .expect("should exist");

        assert_eq!(found.requester_role, Role::SiteSupervisor);
        assert_eq!(found.material_ids.len(), 2);
        assert_eq!(found.material_ids[0].0, "MAT-1");
        assert!(!found.is_deleted);
    }

    #[tokio::test]
    async fn save_upserts_mutable_columns_only() {
        let pool = setup().await;
        let repo = SqlPurchaseRepository::new(pool);

        let purchase = sample_purchase("PR-11");
        repo.save(purchase.clone()).await.expect("save");

        let mut updated = purchase.clone();
        updated.purpose = "revised scope".to_string();
        updated.touch("u-pm-1", Utc::now());
        repo.save(updated).await.expect("upsert");

        let found = repo
            .find_by_id(&PurchaseId("PR-11".to_string()))
            .await
            .expect("find")
            .expect("should exist");
        assert_eq!(found.purpose, "revised scope");
        assert_eq!(found.updated_by, "u-pm-1");
        assert_eq!(found.created_by, purchase.created_by);
    }

    #[tokio::test]
    async fn soft_deleted_rows_are_still_returned() {
        let pool = setup().await;
        let repo = SqlPurchaseRepository::new(pool);

        let mut purchase = sample_purchase("PR-12");
        purchase.is_deleted = true;
        repo.save(purchase).await.expect("save");

        let found = repo.find_by_id(&PurchaseId("PR-12".to_string())).await.expect("find");
        assert!(found.expect("row should exist").is_deleted);
    }

    #[tokio::test]
    async fn missing_purchase_returns_none() {
        let pool = setup().await;
        let repo = SqlPurchaseRepository::new(pool);

        let found = repo.find_by_id(&PurchaseId("PR-404".to_string())).await.expect("find");
        assert!(found.is_none());
    }
}
