// handlers/protected/auth.rs - GET /api/auth/me, POST /api/auth/logout

use axum::Extension;
use serde_json::{json, Value};

use crate::database::manager::DatabaseManager;
use crate::database::models::{Organization, User};
use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::middleware::response::{ApiResponse, ApiResult};

/// Current user plus their organization, fetched fresh from storage so
/// profile edits show up without re-login.
pub async fn me(Extension(user): Extension<AuthUser>) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;

    let record = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user.user_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid token"))?;

    let organization = sqlx::query_as::<_, Organization>(
        "SELECT * FROM organizations WHERE id = $1",
    )
    .bind(record.organization_id)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::success(json!({
        "user": record,
        "organization": organization,
    })))
}

/// Stateless logout. Tokens are not stored server side, so this only
/// confirms the client should discard its pair.
pub async fn logout(Extension(_user): Extension<AuthUser>) -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({})).with_message("Sesión cerrada"))
}
