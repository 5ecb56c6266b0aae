use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::Row;

use reqflow_core::domain::material::{Material, MaterialId, MaterialPriority};

use super::purchase::parse_timestamp;
use super::{MaterialRepository, RepositoryError};
use crate::DbPool;

pub struct SqlMaterialRepository {
    pool: DbPool,
}

impl SqlMaterialRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_decimal(raw: &str, column: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(raw)
        .map_err(|e| RepositoryError::Decode(format!("column `{column}`: {e}")))
}

fn row_to_material(row: &sqlx::sqlite::SqliteRow) -> Result<Material, RepositoryError> {
    let quantity: String =
        row.try_get("quantity").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let unit_cost: String =
        row.try_get("unit_cost").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let priority: String =
        row.try_get("priority").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Material {
        id: MaterialId(row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?),
        name: row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        category: row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        quantity: parse_decimal(&quantity, "quantity")?,
        unit: row.try_get("unit").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        unit_cost: parse_decimal(&unit_cost, "unit_cost")?,
        priority: MaterialPriority::parse(&priority),
        created_at: parse_timestamp(&created_at, "created_at")?,
    })
}

#[async_trait::async_trait]
impl MaterialRepository for SqlMaterialRepository {
    async fn find_by_ids(&self, ids: &[MaterialId]) -> Result<Vec<Material>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        // sqlite has no array binds; expand placeholders per id.
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, name, category, quantity, unit, unit_cost, priority, created_at
             FROM material WHERE id IN ({placeholders}) ORDER BY name ASC"
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(&id.0);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_material).collect()
    }

    async fn save(&self, material: Material) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO material (id, name, category, quantity, unit, unit_cost, priority, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 category = excluded.category,
                 quantity = excluded.quantity,
                 unit = excluded.unit,
                 unit_cost = excluded.unit_cost,
                 priority = excluded.priority",
        )
        .bind(&material.id.0)
        .bind(&material.name)
        .bind(&material.category)
        .bind(material.quantity.to_string())
        .bind(&material.unit)
        .bind(material.unit_cost.to_string())
        .bind(material.priority.as_str())
        .bind(material.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
