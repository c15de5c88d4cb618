// handlers/protected/units.rs - /api/units CRUD and bulk operations

use axum::extract::{Path, Query};
use axum::{Extension, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

use crate::config;
use crate::database::manager::DatabaseManager;
use crate::database::models::{Unit, UnitStatus, UnitType};
use crate::error::{is_unique_violation, ApiError};
use crate::middleware::auth::AuthUser;
use crate::middleware::permissions::require_permission;
use crate::middleware::response::{ApiResponse, ApiResult};
use crate::services::audit::{self, AuditEntry};

use super::utils::{PageQuery, Paginated};

#[derive(Debug, Deserialize)]
pub struct UnitListQuery {
    #[serde(flatten)]
    pub page: PageQuery,
    pub project_id: Option<Uuid>,
    pub status: Option<String>,
    pub unit_type: Option<String>,
    pub bedrooms: Option<i32>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    /// Matches against SKU and name
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUnitRequest {
    pub sku: String,
    pub name: Option<String>,
    pub project_id: Uuid,
    pub unit_type: Option<String>,
    pub status: Option<String>,
    pub price: Decimal,
    /// ISO-style currency code; organization default when absent
    pub currency_code: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<Decimal>,
    pub area_sqm: Option<Decimal>,
    pub floor: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUnitRequest {
    pub name: Option<String>,
    pub unit_type: Option<String>,
    pub status: Option<String>,
    pub price: Option<Decimal>,
    pub currency_code: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<Decimal>,
    pub area_sqm: Option<Decimal>,
    pub floor: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct BulkStatusRequest {
    pub unit_ids: Vec<Uuid>,
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase", tag = "mode", content = "value")]
pub enum PriceAdjustment {
    /// Relative change, e.g. 5 raises prices by 5%
    Percentage(Decimal),
    /// Absolute delta added to every price
    Fixed(Decimal),
}

#[derive(Debug, Deserialize)]
pub struct BulkPriceRequest {
    pub unit_ids: Vec<Uuid>,
    #[serde(flatten)]
    pub adjustment: PriceAdjustment,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub unit_ids: Vec<Uuid>,
}

fn parse_unit_status(raw: &str) -> Result<UnitStatus, ApiError> {
    UnitStatus::parse(&raw.to_uppercase())
        .ok_or_else(|| ApiError::bad_request(format!("Estado de unidad inválido: {}", raw)))
}

fn parse_unit_type(raw: &str) -> Result<UnitType, ApiError> {
    UnitType::parse(&raw.to_uppercase())
        .ok_or_else(|| ApiError::bad_request(format!("Tipo de unidad inválido: {}", raw)))
}

/// GET /api/units - paginated, filterable list scoped to the caller's
/// organization through the owning project
pub async fn list(
    Extension(user): Extension<AuthUser>,
    Query(query): Query<UnitListQuery>,
) -> ApiResult<Paginated<Unit>> {
    require_permission(&user, "units.view")?;
    let pool = DatabaseManager::pool().await?;
    let (limit, offset, page) = query.page.resolve();

    let status = query.status.as_deref().map(parse_unit_status).transpose()?;
    let unit_type = query.unit_type.as_deref().map(parse_unit_type).transpose()?;

    let mut count_qb = QueryBuilder::new(
        "SELECT COUNT(*) FROM units WHERE project_id IN \
         (SELECT id FROM projects WHERE organization_id = ",
    );
    count_qb.push_bind(user.organization_id);
    count_qb.push(")");
    push_filters(&mut count_qb, &query, status, unit_type);
    let (total,): (i64,) = count_qb.build_query_as().fetch_one(&pool).await?;

    let mut qb = QueryBuilder::new(
        "SELECT * FROM units WHERE project_id IN \
         (SELECT id FROM projects WHERE organization_id = ",
    );
    qb.push_bind(user.organization_id);
    qb.push(")");
    push_filters(&mut qb, &query, status, unit_type);
    qb.push(" ORDER BY sku ASC LIMIT ");
    qb.push_bind(limit);
    qb.push(" OFFSET ");
    qb.push_bind(offset);
    let units: Vec<Unit> = qb.build_query_as().fetch_all(&pool).await?;

    Ok(ApiResponse::success(Paginated::new(units, total, page, limit)))
}

fn push_filters(
    qb: &mut QueryBuilder<'_, sqlx::Postgres>,
    query: &UnitListQuery,
    status: Option<UnitStatus>,
    unit_type: Option<UnitType>,
) {
    if let Some(project_id) = query.project_id {
        qb.push(" AND project_id = ");
        qb.push_bind(project_id);
    }
    if let Some(status) = status {
        qb.push(" AND status = ");
        qb.push_bind(status);
    }
    if let Some(unit_type) = unit_type {
        qb.push(" AND unit_type = ");
        qb.push_bind(unit_type);
    }
    if let Some(bedrooms) = query.bedrooms {
        qb.push(" AND bedrooms = ");
        qb.push_bind(bedrooms);
    }
    if let Some(min_price) = query.min_price {
        qb.push(" AND price >= ");
        qb.push_bind(min_price);
    }
    if let Some(max_price) = query.max_price {
        qb.push(" AND price <= ");
        qb.push_bind(max_price);
    }
    if let Some(search) = query.search.as_deref() {
        let pattern = format!("%{}%", search);
        qb.push(" AND (sku ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR name ILIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }
}

/// GET /api/units/:id
pub async fn get(Extension(user): Extension<AuthUser>, Path(id): Path<Uuid>) -> ApiResult<Unit> {
    require_permission(&user, "units.view")?;
    let pool = DatabaseManager::pool().await?;
    let unit = find_unit(&pool, user.organization_id, id).await?;
    Ok(ApiResponse::success(unit))
}

/// POST /api/units
pub async fn create(
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateUnitRequest>,
) -> ApiResult<Unit> {
    require_permission(&user, "units.create")?;
    let sku = payload.sku.trim();
    if sku.is_empty() {
        return Err(ApiError::field_error("Datos inválidos", "sku", "requerido"));
    }
    if payload.price.is_sign_negative() {
        return Err(ApiError::field_error("Datos inválidos", "price", "debe ser positivo"));
    }
    let unit_type = match payload.unit_type.as_deref() {
        Some(raw) => parse_unit_type(raw)?,
        None => UnitType::Apartment,
    };
    let status = match payload.status.as_deref() {
        Some(raw) => parse_unit_status(raw)?,
        None => UnitStatus::Available,
    };

    let pool = DatabaseManager::pool().await?;
    assert_project_in_org(&pool, user.organization_id, payload.project_id).await?;
    let currency_id = resolve_currency(&pool, payload.currency_code.as_deref()).await?;

    let unit = sqlx::query_as::<_, Unit>(
        r#"
        INSERT INTO units
            (id, sku, name, unit_type, status, price, currency_id, project_id,
             bedrooms, bathrooms, area_sqm, floor, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(sku)
    .bind(&payload.name)
    .bind(unit_type)
    .bind(status)
    .bind(payload.price)
    .bind(currency_id)
    .bind(payload.project_id)
    .bind(payload.bedrooms)
    .bind(payload.bathrooms)
    .bind(payload.area_sqm)
    .bind(payload.floor)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::conflict(format!("La unidad con SKU '{}' ya existe en el proyecto", sku))
        } else {
            e.into()
        }
    })?;

    audit::record(
        &pool,
        &user,
        AuditEntry::new("CREATE", "unit")
            .entity_id(unit.id)
            .project_id(unit.project_id)
            .new_values(json!({"sku": unit.sku, "price": unit.price, "status": unit.status})),
    )
    .await;

    Ok(ApiResponse::created(unit))
}

/// PUT /api/units/:id - partial update, absent fields keep their value
pub async fn update(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUnitRequest>,
) -> ApiResult<Unit> {
    require_permission(&user, "units.edit")?;
    if payload.price.is_some_and(|p| p.is_sign_negative()) {
        return Err(ApiError::field_error("Datos inválidos", "price", "debe ser positivo"));
    }
    let pool = DatabaseManager::pool().await?;
    let existing = find_unit(&pool, user.organization_id, id).await?;

    let unit_type = match payload.unit_type.as_deref() {
        Some(raw) => parse_unit_type(raw)?,
        None => existing.unit_type,
    };
    let status = match payload.status.as_deref() {
        Some(raw) => parse_unit_status(raw)?,
        None => existing.status,
    };
    let currency_id = match payload.currency_code.as_deref() {
        Some(code) => resolve_currency(&pool, Some(code)).await?,
        None => existing.currency_id,
    };

    let unit = sqlx::query_as::<_, Unit>(
        r#"
        UPDATE units
        SET name = $1, unit_type = $2, status = $3, price = $4, currency_id = $5,
            bedrooms = $6, bathrooms = $7, area_sqm = $8, floor = $9, updated_at = NOW()
        WHERE id = $10
        RETURNING *
        "#,
    )
    .bind(payload.name.as_ref().or(existing.name.as_ref()))
    .bind(unit_type)
    .bind(status)
    .bind(payload.price.unwrap_or(existing.price))
    .bind(currency_id)
    .bind(payload.bedrooms.or(existing.bedrooms))
    .bind(payload.bathrooms.or(existing.bathrooms))
    .bind(payload.area_sqm.or(existing.area_sqm))
    .bind(payload.floor.or(existing.floor))
    .bind(id)
    .fetch_one(&pool)
    .await?;

    audit::record(
        &pool,
        &user,
        AuditEntry::new("UPDATE", "unit")
            .entity_id(unit.id)
            .project_id(unit.project_id)
            .old_values(json!({"price": existing.price, "status": existing.status}))
            .new_values(json!({"price": unit.price, "status": unit.status})),
    )
    .await;

    Ok(ApiResponse::success(unit))
}

/// DELETE /api/units/:id - marks the unit UNAVAILABLE rather than removing
/// it, so past leads and audit history keep their reference
pub async fn delete(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    require_permission(&user, "units.delete")?;
    let pool = DatabaseManager::pool().await?;
    let existing = find_unit(&pool, user.organization_id, id).await?;

    sqlx::query("UPDATE units SET status = $1, updated_at = NOW() WHERE id = $2")
        .bind(UnitStatus::Unavailable)
        .bind(id)
        .execute(&pool)
        .await?;

    audit::record(
        &pool,
        &user,
        AuditEntry::new("DELETE", "unit")
            .entity_id(id)
            .project_id(existing.project_id)
            .old_values(json!({"sku": existing.sku, "status": existing.status})),
    )
    .await;

    Ok(ApiResponse::success(json!({"deleted": true})).with_message("Unidad eliminada"))
}

/// PUT /api/units/bulk/status
pub async fn bulk_status(
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<BulkStatusRequest>,
) -> ApiResult<serde_json::Value> {
    require_permission(&user, "units.bulk_update")?;
    if payload.unit_ids.is_empty() {
        return Err(ApiError::bad_request("unit_ids no puede estar vacío"));
    }
    let status = parse_unit_status(&payload.status)?;
    let pool = DatabaseManager::pool().await?;

    let result = sqlx::query(
        r#"
        UPDATE units SET status = $1, updated_at = NOW()
        WHERE id = ANY($2)
          AND project_id IN (SELECT id FROM projects WHERE organization_id = $3)
        "#,
    )
    .bind(status)
    .bind(&payload.unit_ids)
    .bind(user.organization_id)
    .execute(&pool)
    .await?;

    let updated = result.rows_affected();
    audit::record(
        &pool,
        &user,
        AuditEntry::new("BULK_STATUS", "unit")
            .metadata(json!({"requested": payload.unit_ids.len(), "updated": updated, "status": status})),
    )
    .await;

    Ok(ApiResponse::success(json!({"updated": updated}))
        .with_message(format!("{} unidades actualizadas", updated)))
}

/// PUT /api/units/bulk/prices - percentage or fixed adjustment, results
/// rounded to 2 decimal places and floored at zero
pub async fn bulk_prices(
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<BulkPriceRequest>,
) -> ApiResult<serde_json::Value> {
    require_permission(&user, "units.bulk_update")?;
    if payload.unit_ids.is_empty() {
        return Err(ApiError::bad_request("unit_ids no puede estar vacío"));
    }
    let pool = DatabaseManager::pool().await?;

    let (sql, value) = match payload.adjustment {
        PriceAdjustment::Percentage(pct) => (
            r#"
            UPDATE units
            SET price = GREATEST(ROUND(price * (1 + $1 / 100), 2), 0), updated_at = NOW()
            WHERE id = ANY($2)
              AND project_id IN (SELECT id FROM projects WHERE organization_id = $3)
            "#,
            pct,
        ),
        PriceAdjustment::Fixed(delta) => (
            r#"
            UPDATE units
            SET price = GREATEST(ROUND(price + $1, 2), 0), updated_at = NOW()
            WHERE id = ANY($2)
              AND project_id IN (SELECT id FROM projects WHERE organization_id = $3)
            "#,
            delta,
        ),
    };

    let result = sqlx::query(sql)
        .bind(value)
        .bind(&payload.unit_ids)
        .bind(user.organization_id)
        .execute(&pool)
        .await?;

    let updated = result.rows_affected();
    audit::record(
        &pool,
        &user,
        AuditEntry::new("BULK_PRICE", "unit")
            .metadata(json!({"requested": payload.unit_ids.len(), "updated": updated})),
    )
    .await;

    Ok(ApiResponse::success(json!({"updated": updated}))
        .with_message(format!("{} precios actualizados", updated)))
}

/// DELETE /api/units/bulk
pub async fn bulk_delete(
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<BulkDeleteRequest>,
) -> ApiResult<serde_json::Value> {
    require_permission(&user, "units.delete")?;
    if payload.unit_ids.is_empty() {
        return Err(ApiError::bad_request("unit_ids no puede estar vacío"));
    }
    let pool = DatabaseManager::pool().await?;

    let result = sqlx::query(
        r#"
        DELETE FROM units
        WHERE id = ANY($1)
          AND project_id IN (SELECT id FROM projects WHERE organization_id = $2)
        "#,
    )
    .bind(&payload.unit_ids)
    .bind(user.organization_id)
    .execute(&pool)
    .await?;

    let deleted = result.rows_affected();
    audit::record(
        &pool,
        &user,
        AuditEntry::new("BULK_DELETE", "unit")
            .metadata(json!({"requested": payload.unit_ids.len(), "deleted": deleted})),
    )
    .await;

    Ok(ApiResponse::success(json!({"deleted": deleted}))
        .with_message(format!("{} unidades eliminadas", deleted)))
}

async fn find_unit(pool: &PgPool, organization_id: Uuid, id: Uuid) -> Result<Unit, ApiError> {
    sqlx::query_as::<_, Unit>(
        r#"
        SELECT u.* FROM units u
        JOIN projects p ON p.id = u.project_id
        WHERE u.id = $1 AND p.organization_id = $2
        "#,
    )
    .bind(id)
    .bind(organization_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Unidad no encontrada"))
}

async fn assert_project_in_org(
    pool: &PgPool,
    organization_id: Uuid,
    project_id: Uuid,
) -> Result<(), ApiError> {
    let found: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM projects WHERE id = $1 AND organization_id = $2")
            .bind(project_id)
            .bind(organization_id)
            .fetch_optional(pool)
            .await?;
    found.map(|_| ()).ok_or_else(|| ApiError::not_found("Proyecto no encontrado"))
}

async fn resolve_currency(pool: &PgPool, code: Option<&str>) -> Result<Uuid, ApiError> {
    let code = code
        .map(str::to_uppercase)
        .unwrap_or_else(|| config::config().import.default_currency.clone());
    let found: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM currencies WHERE code = $1 AND is_active = TRUE")
            .bind(&code)
            .fetch_optional(pool)
            .await?;
    found
        .map(|(id,)| id)
        .ok_or_else(|| ApiError::bad_request(format!("Moneda desconocida: {}", code)))
}
