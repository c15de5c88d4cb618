// handlers/public/auth/refresh.rs - POST /auth/refresh

use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{generate_token_pair, verify_jwt, AuthError};
use crate::database::manager::DatabaseManager;
use crate::database::models::User;
use crate::error::ApiError;
use crate::middleware::response::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

/// Exchange a valid refresh token for a fresh access/refresh pair. The
/// user must still exist and be active; role changes since issuance are
/// picked up here.
pub async fn refresh(Json(payload): Json<RefreshRequest>) -> ApiResult<Value> {
    let claims = verify_jwt(&payload.refresh_token).map_err(|e| match e {
        AuthError::TokenExpired => ApiError::unauthorized("Token expired"),
        AuthError::MissingSecret => ApiError::service_unavailable("Authentication not configured"),
        _ => ApiError::unauthorized("Invalid token"),
    })?;

    if claims.token_type != "refresh" {
        return Err(ApiError::unauthorized("Invalid token"));
    }

    let pool = DatabaseManager::pool().await?;
    let user = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE id = $1 AND is_active = TRUE",
    )
    .bind(claims.user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| ApiError::unauthorized("Invalid token"))?;

    let tokens = generate_token_pair(user.id, &user.email, user.role, user.organization_id)
        .map_err(|_| ApiError::internal_server_error("Error al generar el token"))?;

    Ok(ApiResponse::success(json!({ "tokens": tokens })))
}
