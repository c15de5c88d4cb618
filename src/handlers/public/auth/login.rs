// handlers/public/auth/login.rs - POST /auth/login

use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{generate_token_pair, verify_password};
use crate::database::manager::DatabaseManager;
use crate::database::models::User;
use crate::error::ApiError;
use crate::middleware::response::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Authenticate with email and password, returning an access/refresh pair.
/// Unknown emails and wrong passwords get the same response.
pub async fn login(Json(payload): Json<LoginRequest>) -> ApiResult<Value> {
    let email = payload.email.trim().to_lowercase();
    let pool = DatabaseManager::pool().await?;

    let user = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE email = $1 AND is_active = TRUE",
    )
    .bind(&email)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| ApiError::unauthorized("Credenciales inválidas"))?;

    let valid = verify_password(&payload.password, &user.password_hash)
        .map_err(|_| ApiError::internal_server_error("Error al verificar la contraseña"))?;
    if !valid {
        return Err(ApiError::unauthorized("Credenciales inválidas"));
    }

    sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
        .bind(user.id)
        .execute(&pool)
        .await?;

    let tokens = generate_token_pair(user.id, &user.email, user.role, user.organization_id)
        .map_err(|_| ApiError::internal_server_error("Error al generar el token"))?;

    Ok(ApiResponse::success(json!({
        "user": user,
        "tokens": tokens,
    }))
    .with_message("Inicio de sesión exitoso"))
}
