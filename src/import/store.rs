use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::models::Currency;
use crate::error::is_unique_violation;
use crate::import::row::UnitCandidate;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("La unidad con SKU '{0}' ya existe en el proyecto")]
    DuplicateSku(String),
    #[error("Database error: {0}")]
    Database(String),
}

/// Storage seam for the reconciliation loop. Production wraps the Postgres
/// pool; tests substitute an in-memory map so the loop runs without a
/// database.
#[async_trait]
pub trait ImportStore: Send + Sync {
    /// Currency lookup by upper-cased code
    async fn find_currency(&self, code: &str) -> Result<Option<Currency>, StoreError>;

    /// Existing unit id for the (sku, project) upsert key
    async fn find_unit(&self, project_id: Uuid, sku: &str) -> Result<Option<Uuid>, StoreError>;

    async fn create_unit(
        &self,
        project_id: Uuid,
        currency_id: Uuid,
        candidate: &UnitCandidate,
    ) -> Result<(), StoreError>;

    async fn update_unit(
        &self,
        unit_id: Uuid,
        currency_id: Uuid,
        candidate: &UnitCandidate,
    ) -> Result<(), StoreError>;
}

pub struct PgImportStore {
    pool: PgPool,
}

impl PgImportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImportStore for PgImportStore {
    async fn find_currency(&self, code: &str) -> Result<Option<Currency>, StoreError> {
        sqlx::query_as::<_, Currency>(
            "SELECT id, code, name, symbol, decimal_places, exchange_rate_to_usd, is_active \
             FROM currencies WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    async fn find_unit(&self, project_id: Uuid, sku: &str) -> Result<Option<Uuid>, StoreError> {
        let id: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM units WHERE project_id = $1 AND sku = $2")
                .bind(project_id)
                .bind(sku)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(id.map(|(id,)| id))
    }

    async fn create_unit(
        &self,
        project_id: Uuid,
        currency_id: Uuid,
        candidate: &UnitCandidate,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO units \
             (id, sku, name, unit_type, status, price, currency_id, project_id, \
              bedrooms, bathrooms, area_sqm, floor) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(Uuid::new_v4())
        .bind(&candidate.sku)
        .bind(&candidate.name)
        .bind(candidate.unit_type)
        .bind(candidate.status)
        .bind(candidate.price)
        .bind(currency_id)
        .bind(project_id)
        .bind(candidate.bedrooms)
        .bind(candidate.bathrooms)
        .bind(candidate.area_sqm)
        .bind(candidate.floor)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateSku(candidate.sku.clone())
            } else {
                StoreError::Database(e.to_string())
            }
        })?;
        Ok(())
    }

    async fn update_unit(
        &self,
        unit_id: Uuid,
        currency_id: Uuid,
        candidate: &UnitCandidate,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE units SET name = $2, unit_type = $3, status = $4, price = $5, \
             currency_id = $6, bedrooms = $7, bathrooms = $8, area_sqm = $9, floor = $10, \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(unit_id)
        .bind(&candidate.name)
        .bind(candidate.unit_type)
        .bind(candidate.status)
        .bind(candidate.price)
        .bind(currency_id)
        .bind(candidate.bedrooms)
        .bind(candidate.bathrooms)
        .bind(candidate.area_sqm)
        .bind(candidate.floor)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }
}
