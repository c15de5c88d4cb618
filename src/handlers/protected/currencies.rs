// handlers/protected/currencies.rs - /api/currencies list and conversion

use axum::extract::{Path, Query};
use axum::Extension;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::Currency;
use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::middleware::permissions::require_permission;
use crate::middleware::response::{ApiResponse, ApiResult};

/// GET /api/currencies - active currencies, alphabetical by code
pub async fn list(Extension(user): Extension<AuthUser>) -> ApiResult<Vec<Currency>> {
    require_permission(&user, "currencies.view")?;
    let pool = DatabaseManager::pool().await?;
    let currencies = sqlx::query_as::<_, Currency>(
        "SELECT * FROM currencies WHERE is_active = TRUE ORDER BY code",
    )
    .fetch_all(&pool)
    .await?;
    Ok(ApiResponse::success(currencies))
}

/// GET /api/currencies/:key - lookup by UUID or by code ("USD", case-insensitive)
pub async fn get(
    Extension(user): Extension<AuthUser>,
    Path(key): Path<String>,
) -> ApiResult<Currency> {
    require_permission(&user, "currencies.view")?;
    let pool = DatabaseManager::pool().await?;
    let currency = find_currency(&pool, &key).await?;
    Ok(ApiResponse::success(currency))
}

#[derive(Debug, Deserialize)]
pub struct ConvertQuery {
    pub amount: Decimal,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Serialize)]
pub struct Conversion {
    pub amount: Decimal,
    pub from: String,
    pub to: String,
    pub converted: Decimal,
    pub rate: Decimal,
}

/// GET /api/currencies/convert?amount=..&from=..&to=..
///
/// Rates are stored as units of the currency per one USD, so conversion
/// always pivots through USD. Results round to the target currency's
/// configured decimal places.
pub async fn convert(
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ConvertQuery>,
) -> ApiResult<Conversion> {
    require_permission(&user, "currencies.view")?;
    let pool = DatabaseManager::pool().await?;

    let from = find_currency(&pool, &query.from).await?;
    let to = find_currency(&pool, &query.to).await?;

    if from.exchange_rate_to_usd.is_zero() {
        return Err(ApiError::bad_request(format!(
            "Tasa de cambio no disponible para {}",
            from.code
        )));
    }

    let rate = to.exchange_rate_to_usd / from.exchange_rate_to_usd;
    let converted = (query.amount * rate).round_dp(to.decimal_places as u32);

    Ok(ApiResponse::success(Conversion {
        amount: query.amount,
        from: from.code,
        to: to.code,
        converted,
        rate,
    }))
}

async fn find_currency(pool: &PgPool, key: &str) -> Result<Currency, ApiError> {
    let currency = if let Ok(id) = key.parse::<Uuid>() {
        sqlx::query_as::<_, Currency>("SELECT * FROM currencies WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
    } else {
        sqlx::query_as::<_, Currency>("SELECT * FROM currencies WHERE code = $1")
            .bind(key.to_uppercase())
            .fetch_optional(pool)
            .await?
    };
    currency.ok_or_else(|| ApiError::not_found(format!("Moneda no encontrada: {}", key)))
}
