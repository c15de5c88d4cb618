// handlers/public/auth/register.rs - POST /auth/register

use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::{generate_token_pair, hash_password, validate_email_format, validate_password_strength};
use crate::database::manager::DatabaseManager;
use crate::database::models::{organization::slugify, Organization, User, UserRole};
use crate::error::{is_unique_violation, ApiError};
use crate::middleware::response::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Organization to create; the registering user becomes its admin
    pub organization_name: String,
}

/// Register a new organization together with its first (admin) user.
/// Both rows are written in one transaction.
pub async fn register(Json(payload): Json<RegisterRequest>) -> ApiResult<Value> {
    let email = payload.email.trim().to_lowercase();
    validate_email_format(&email).map_err(|reason| ApiError::field_error("Datos inválidos", "email", reason))?;
    validate_password_strength(&payload.password)
        .map_err(|reason| ApiError::field_error("Datos inválidos", "password", reason))?;

    let organization_name = payload.organization_name.trim();
    if organization_name.is_empty() {
        return Err(ApiError::field_error("Datos inválidos", "organization_name", "requerido"));
    }

    let password_hash = hash_password(&payload.password)
        .map_err(|_| ApiError::internal_server_error("Error al procesar la contraseña"))?;

    let pool = DatabaseManager::pool().await?;
    let mut tx = pool.begin().await?;

    let slug = available_slug(&mut tx, organization_name).await?;
    let organization = sqlx::query_as::<_, Organization>(
        r#"
        INSERT INTO organizations (id, name, slug, created_at, updated_at)
        VALUES ($1, $2, $3, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(organization_name)
    .bind(&slug)
    .fetch_one(&mut *tx)
    .await?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users
            (id, email, password_hash, first_name, last_name, role,
             organization_id, is_active, email_verified, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, FALSE, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&email)
    .bind(&password_hash)
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .bind(UserRole::Admin)
    .bind(organization.id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::conflict("El correo ya está registrado")
        } else {
            e.into()
        }
    })?;

    tx.commit().await?;

    let tokens = generate_token_pair(user.id, &user.email, user.role, user.organization_id)
        .map_err(|_| ApiError::internal_server_error("Error al generar el token"))?;

    Ok(ApiResponse::created(json!({
        "user": user,
        "organization": organization,
        "tokens": tokens,
    }))
    .with_message("Registro exitoso"))
}

/// Slug the organization name, suffixing with a short random tail if the
/// plain slug is already taken.
async fn available_slug(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    name: &str,
) -> Result<String, ApiError> {
    let base = slugify(name);
    let base = if base.is_empty() { "org".to_string() } else { base };

    let taken: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM organizations WHERE slug = $1")
        .bind(&base)
        .fetch_optional(&mut **tx)
        .await?;

    if taken.is_none() {
        return Ok(base);
    }
    let tail = Uuid::new_v4().simple().to_string();
    Ok(format!("{}-{}", base, &tail[..6]))
}
