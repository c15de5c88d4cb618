// handlers/protected/projects.rs - /api/projects CRUD

use axum::extract::{Path, Query};
use axum::{Extension, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::{Project, ProjectStatus};
use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::middleware::permissions::require_permission;
use crate::middleware::response::{ApiResponse, ApiResult};
use crate::services::audit::{self, AuditEntry};

use super::utils::{PageQuery, Paginated};

#[derive(Debug, Deserialize)]
pub struct ProjectListQuery {
    #[serde(flatten)]
    pub page: PageQuery,
    pub status: Option<String>,
    /// Case-insensitive substring match on name
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
}

fn parse_status(raw: &str) -> Result<ProjectStatus, ApiError> {
    ProjectStatus::parse(&raw.to_uppercase())
        .ok_or_else(|| ApiError::bad_request(format!("Estado de proyecto inválido: {}", raw)))
}

fn validate_coordinates(
    latitude: Option<Decimal>,
    longitude: Option<Decimal>,
) -> Result<(), ApiError> {
    if let Some(lat) = latitude {
        if lat < Decimal::from(-90) || lat > Decimal::from(90) {
            return Err(ApiError::field_error("Datos inválidos", "latitude", "fuera de rango"));
        }
    }
    if let Some(lon) = longitude {
        if lon < Decimal::from(-180) || lon > Decimal::from(180) {
            return Err(ApiError::field_error("Datos inválidos", "longitude", "fuera de rango"));
        }
    }
    Ok(())
}

/// GET /api/projects - paginated list, scoped to the caller's organization
pub async fn list(
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ProjectListQuery>,
) -> ApiResult<Paginated<Project>> {
    require_permission(&user, "projects.view")?;
    let pool = DatabaseManager::pool().await?;
    let (limit, offset, page) = query.page.resolve();

    let status = query.status.as_deref().map(parse_status).transpose()?;

    let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM projects WHERE organization_id = ");
    count_qb.push_bind(user.organization_id);
    push_filters(&mut count_qb, status, query.search.as_deref());
    let (total,): (i64,) = count_qb.build_query_as().fetch_one(&pool).await?;

    let mut qb = QueryBuilder::new("SELECT * FROM projects WHERE organization_id = ");
    qb.push_bind(user.organization_id);
    push_filters(&mut qb, status, query.search.as_deref());
    qb.push(" ORDER BY created_at DESC LIMIT ");
    qb.push_bind(limit);
    qb.push(" OFFSET ");
    qb.push_bind(offset);
    let projects: Vec<Project> = qb.build_query_as().fetch_all(&pool).await?;

    Ok(ApiResponse::success(Paginated::new(projects, total, page, limit)))
}

fn push_filters(
    qb: &mut QueryBuilder<'_, sqlx::Postgres>,
    status: Option<ProjectStatus>,
    search: Option<&str>,
) {
    if let Some(status) = status {
        qb.push(" AND status = ");
        qb.push_bind(status);
    }
    if let Some(search) = search {
        qb.push(" AND name ILIKE ");
        qb.push_bind(format!("%{}%", search));
    }
}

/// GET /api/projects/:id
pub async fn get(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Project> {
    require_permission(&user, "projects.view")?;
    let pool = DatabaseManager::pool().await?;
    let project = find_project(&pool, user.organization_id, id).await?;
    Ok(ApiResponse::success(project))
}

/// POST /api/projects
pub async fn create(
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateProjectRequest>,
) -> ApiResult<Project> {
    require_permission(&user, "projects.create")?;
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::field_error("Datos inválidos", "name", "requerido"));
    }
    let status = match payload.status.as_deref() {
        Some(raw) => parse_status(raw)?,
        None => ProjectStatus::Active,
    };
    validate_coordinates(payload.latitude, payload.longitude)?;

    let pool = DatabaseManager::pool().await?;
    let project = sqlx::query_as::<_, Project>(
        r#"
        INSERT INTO projects
            (id, organization_id, name, description, status, address,
             latitude, longitude, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.organization_id)
    .bind(name)
    .bind(&payload.description)
    .bind(status)
    .bind(&payload.address)
    .bind(payload.latitude)
    .bind(payload.longitude)
    .fetch_one(&pool)
    .await?;

    audit::record(
        &pool,
        &user,
        AuditEntry::new("CREATE", "project")
            .entity_id(project.id)
            .project_id(project.id)
            .new_values(json!({"name": project.name, "status": project.status})),
    )
    .await;

    Ok(ApiResponse::created(project))
}

/// PUT /api/projects/:id - partial update, absent fields keep their value
pub async fn update(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProjectRequest>,
) -> ApiResult<Project> {
    require_permission(&user, "projects.edit")?;
    validate_coordinates(payload.latitude, payload.longitude)?;
    let pool = DatabaseManager::pool().await?;
    let existing = find_project(&pool, user.organization_id, id).await?;

    let status = match payload.status.as_deref() {
        Some(raw) => parse_status(raw)?,
        None => existing.status,
    };

    let project = sqlx::query_as::<_, Project>(
        r#"
        UPDATE projects
        SET name = $1, description = $2, status = $3, address = $4,
            latitude = $5, longitude = $6, updated_at = NOW()
        WHERE id = $7 AND organization_id = $8
        RETURNING *
        "#,
    )
    .bind(payload.name.as_deref().unwrap_or(&existing.name))
    .bind(payload.description.as_ref().or(existing.description.as_ref()))
    .bind(status)
    .bind(payload.address.as_ref().or(existing.address.as_ref()))
    .bind(payload.latitude.or(existing.latitude))
    .bind(payload.longitude.or(existing.longitude))
    .bind(id)
    .bind(user.organization_id)
    .fetch_one(&pool)
    .await?;

    audit::record(
        &pool,
        &user,
        AuditEntry::new("UPDATE", "project")
            .entity_id(project.id)
            .project_id(project.id)
            .old_values(json!({"name": existing.name, "status": existing.status}))
            .new_values(json!({"name": project.name, "status": project.status})),
    )
    .await;

    Ok(ApiResponse::success(project))
}

/// DELETE /api/projects/:id - hard delete; units and leads cascade
pub async fn delete(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    require_permission(&user, "projects.delete")?;
    let pool = DatabaseManager::pool().await?;
    let existing = find_project(&pool, user.organization_id, id).await?;

    sqlx::query("DELETE FROM projects WHERE id = $1 AND organization_id = $2")
        .bind(id)
        .bind(user.organization_id)
        .execute(&pool)
        .await?;

    audit::record(
        &pool,
        &user,
        AuditEntry::new("DELETE", "project")
            .entity_id(id)
            .old_values(json!({"name": existing.name})),
    )
    .await;

    Ok(ApiResponse::success(json!({"deleted": true})).with_message("Proyecto eliminado"))
}

async fn find_project(pool: &PgPool, organization_id: Uuid, id: Uuid) -> Result<Project, ApiError> {
    sqlx::query_as::<_, Project>(
        "SELECT * FROM projects WHERE id = $1 AND organization_id = $2",
    )
    .bind(id)
    .bind(organization_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Proyecto no encontrado"))
}
