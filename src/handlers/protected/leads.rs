// handlers/protected/leads.rs - /api/leads CRUD

use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::{Lead, LeadStage};
use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::middleware::permissions::require_permission;
use crate::middleware::response::{ApiResponse, ApiResult};
use crate::services::audit::{self, AuditEntry};

use super::utils::{PageQuery, Paginated};

#[derive(Debug, Deserialize)]
pub struct LeadListQuery {
    #[serde(flatten)]
    pub page: PageQuery,
    pub project_id: Option<Uuid>,
    pub stage: Option<String>,
    pub assigned_to_id: Option<Uuid>,
    /// Matches against name and email
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateLeadRequest {
    pub name: String,
    pub project_id: Uuid,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub stage: Option<String>,
    pub source: Option<String>,
    pub notes: Option<String>,
    pub assigned_to_id: Option<Uuid>,
    pub budget: Option<Decimal>,
    pub expected_close_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLeadRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub stage: Option<String>,
    pub source: Option<String>,
    pub notes: Option<String>,
    pub assigned_to_id: Option<Uuid>,
    pub budget: Option<Decimal>,
    pub expected_close_date: Option<DateTime<Utc>>,
}

fn parse_stage(raw: &str) -> Result<LeadStage, ApiError> {
    LeadStage::parse(&raw.to_uppercase())
        .ok_or_else(|| ApiError::bad_request(format!("Etapa de lead inválida: {}", raw)))
}

/// GET /api/leads
pub async fn list(
    Extension(user): Extension<AuthUser>,
    Query(query): Query<LeadListQuery>,
) -> ApiResult<Paginated<Lead>> {
    require_permission(&user, "leads.view")?;
    let pool = DatabaseManager::pool().await?;
    let (limit, offset, page) = query.page.resolve();
    let stage = query.stage.as_deref().map(parse_stage).transpose()?;

    let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM leads WHERE organization_id = ");
    count_qb.push_bind(user.organization_id);
    push_filters(&mut count_qb, &query, stage);
    let (total,): (i64,) = count_qb.build_query_as().fetch_one(&pool).await?;

    let mut qb = QueryBuilder::new("SELECT * FROM leads WHERE organization_id = ");
    qb.push_bind(user.organization_id);
    push_filters(&mut qb, &query, stage);
    qb.push(" ORDER BY created_at DESC LIMIT ");
    qb.push_bind(limit);
    qb.push(" OFFSET ");
    qb.push_bind(offset);
    let leads: Vec<Lead> = qb.build_query_as().fetch_all(&pool).await?;

    Ok(ApiResponse::success(Paginated::new(leads, total, page, limit)))
}

fn push_filters(
    qb: &mut QueryBuilder<'_, sqlx::Postgres>,
    query: &LeadListQuery,
    stage: Option<LeadStage>,
) {
    if let Some(project_id) = query.project_id {
        qb.push(" AND project_id = ");
        qb.push_bind(project_id);
    }
    if let Some(stage) = stage {
        qb.push(" AND stage = ");
        qb.push_bind(stage);
    }
    if let Some(assigned) = query.assigned_to_id {
        qb.push(" AND assigned_to_id = ");
        qb.push_bind(assigned);
    }
    if let Some(search) = query.search.as_deref() {
        let pattern = format!("%{}%", search);
        qb.push(" AND (name ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR email ILIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }
}

/// GET /api/leads/:id
pub async fn get(Extension(user): Extension<AuthUser>, Path(id): Path<Uuid>) -> ApiResult<Lead> {
    require_permission(&user, "leads.view")?;
    let pool = DatabaseManager::pool().await?;
    let lead = find_lead(&pool, user.organization_id, id).await?;
    Ok(ApiResponse::success(lead))
}

/// POST /api/leads
pub async fn create(
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateLeadRequest>,
) -> ApiResult<Lead> {
    require_permission(&user, "leads.create")?;
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::field_error("Datos inválidos", "name", "requerido"));
    }
    let stage = match payload.stage.as_deref() {
        Some(raw) => parse_stage(raw)?,
        None => LeadStage::New,
    };
    if payload.assigned_to_id.is_some() {
        require_permission(&user, "leads.assign")?;
    }

    let pool = DatabaseManager::pool().await?;
    let project: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM projects WHERE id = $1 AND organization_id = $2")
            .bind(payload.project_id)
            .bind(user.organization_id)
            .fetch_optional(&pool)
            .await?;
    if project.is_none() {
        return Err(ApiError::not_found("Proyecto no encontrado"));
    }

    let lead = sqlx::query_as::<_, Lead>(
        r#"
        INSERT INTO leads
            (id, organization_id, project_id, name, email, phone, company, stage,
             source, notes, assigned_to_id, budget, expected_close_date,
             created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.organization_id)
    .bind(payload.project_id)
    .bind(name)
    .bind(&payload.email)
    .bind(&payload.phone)
    .bind(&payload.company)
    .bind(stage)
    .bind(&payload.source)
    .bind(&payload.notes)
    .bind(payload.assigned_to_id)
    .bind(payload.budget)
    .bind(payload.expected_close_date)
    .fetch_one(&pool)
    .await?;

    audit::record(
        &pool,
        &user,
        AuditEntry::new("CREATE", "lead")
            .entity_id(lead.id)
            .project_id(lead.project_id)
            .new_values(json!({"name": lead.name, "stage": lead.stage})),
    )
    .await;

    Ok(ApiResponse::created(lead))
}

/// PUT /api/leads/:id - partial update; reassignment needs leads.assign
pub async fn update(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLeadRequest>,
) -> ApiResult<Lead> {
    require_permission(&user, "leads.edit")?;
    let pool = DatabaseManager::pool().await?;
    let existing = find_lead(&pool, user.organization_id, id).await?;

    let stage = match payload.stage.as_deref() {
        Some(raw) => parse_stage(raw)?,
        None => existing.stage,
    };
    if payload.assigned_to_id.is_some() && payload.assigned_to_id != existing.assigned_to_id {
        require_permission(&user, "leads.assign")?;
    }

    let lead = sqlx::query_as::<_, Lead>(
        r#"
        UPDATE leads
        SET name = $1, email = $2, phone = $3, company = $4, stage = $5,
            source = $6, notes = $7, assigned_to_id = $8, budget = $9,
            expected_close_date = $10, updated_at = NOW()
        WHERE id = $11 AND organization_id = $12
        RETURNING *
        "#,
    )
    .bind(payload.name.as_deref().unwrap_or(&existing.name))
    .bind(payload.email.as_ref().or(existing.email.as_ref()))
    .bind(payload.phone.as_ref().or(existing.phone.as_ref()))
    .bind(payload.company.as_ref().or(existing.company.as_ref()))
    .bind(stage)
    .bind(payload.source.as_ref().or(existing.source.as_ref()))
    .bind(payload.notes.as_ref().or(existing.notes.as_ref()))
    .bind(payload.assigned_to_id.or(existing.assigned_to_id))
    .bind(payload.budget.or(existing.budget))
    .bind(payload.expected_close_date.or(existing.expected_close_date))
    .bind(id)
    .bind(user.organization_id)
    .fetch_one(&pool)
    .await?;

    audit::record(
        &pool,
        &user,
        AuditEntry::new("UPDATE", "lead")
            .entity_id(lead.id)
            .project_id(lead.project_id)
            .old_values(json!({"stage": existing.stage}))
            .new_values(json!({"stage": lead.stage})),
    )
    .await;

    Ok(ApiResponse::success(lead))
}

/// DELETE /api/leads/:id
pub async fn delete(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    require_permission(&user, "leads.delete")?;
    let pool = DatabaseManager::pool().await?;
    let existing = find_lead(&pool, user.organization_id, id).await?;

    sqlx::query("DELETE FROM leads WHERE id = $1 AND organization_id = $2")
        .bind(id)
        .bind(user.organization_id)
        .execute(&pool)
        .await?;

    audit::record(
        &pool,
        &user,
        AuditEntry::new("DELETE", "lead")
            .entity_id(id)
            .project_id(existing.project_id)
            .old_values(json!({"name": existing.name, "stage": existing.stage})),
    )
    .await;

    Ok(ApiResponse::success(json!({"deleted": true})).with_message("Lead eliminado"))
}

async fn find_lead(pool: &PgPool, organization_id: Uuid, id: Uuid) -> Result<Lead, ApiError> {
    sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1 AND organization_id = $2")
        .bind(id)
        .bind(organization_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Lead no encontrado"))
}
