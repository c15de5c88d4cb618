// handlers/protected/analytics.rs - GET /api/analytics/dashboard

use axum::Extension;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::{Lead, Project};
use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::middleware::permissions::require_permission;
use crate::middleware::response::{ApiResponse, ApiResult};
use crate::services::audit;

#[derive(Debug, FromRow)]
struct CountByKey {
    key: String,
    count: i64,
}

/// Organization-wide dashboard: project and unit totals, breakdowns by
/// status/stage, and inventory value normalized to USD via stored rates.
pub async fn dashboard(Extension(user): Extension<AuthUser>) -> ApiResult<Value> {
    require_permission(&user, "analytics.organization")?;
    let pool = DatabaseManager::pool().await?;
    let org = user.organization_id;

    let (total_projects,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM projects WHERE organization_id = $1")
            .bind(org)
            .fetch_one(&pool)
            .await?;

    let (total_users,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM users WHERE organization_id = $1 AND is_active = TRUE")
            .bind(org)
            .fetch_one(&pool)
            .await?;

    let units_by_status = count_grouped(
        &pool,
        r#"
        SELECT u.status::TEXT AS key, COUNT(*) AS count
        FROM units u
        JOIN projects p ON p.id = u.project_id
        WHERE p.organization_id = $1
        GROUP BY u.status
        "#,
        org,
    )
    .await?;

    let leads_by_stage = count_grouped(
        &pool,
        r#"
        SELECT stage::TEXT AS key, COUNT(*) AS count
        FROM leads
        WHERE organization_id = $1
        GROUP BY stage
        "#,
        org,
    )
    .await?;

    let total_units: i64 = units_by_status.values().filter_map(Value::as_i64).sum();

    // Rates are units-per-USD, so dividing normalizes every price to USD
    let inventory: Option<(Option<Decimal>, Option<Decimal>)> = sqlx::query_as(
        r#"
        SELECT
            SUM(u.price / NULLIF(c.exchange_rate_to_usd, 0))
                FILTER (WHERE u.status = 'AVAILABLE') AS available_value,
            SUM(u.price / NULLIF(c.exchange_rate_to_usd, 0))
                FILTER (WHERE u.status = 'SOLD') AS sold_value
        FROM units u
        JOIN projects p ON p.id = u.project_id
        JOIN currencies c ON c.id = u.currency_id
        WHERE p.organization_id = $1
        "#,
    )
    .bind(org)
    .fetch_optional(&pool)
    .await?;
    let (available_value, sold_value) = inventory.unwrap_or((None, None));

    let recent_projects: Vec<Project> = sqlx::query_as(
        "SELECT * FROM projects WHERE organization_id = $1 ORDER BY created_at DESC LIMIT 5",
    )
    .bind(org)
    .fetch_all(&pool)
    .await?;

    let recent_activity = audit::recent(&pool, org, 5).await?;

    let recent_leads: Vec<Lead> = sqlx::query_as(
        "SELECT * FROM leads WHERE organization_id = $1 ORDER BY created_at DESC LIMIT 5",
    )
    .bind(org)
    .fetch_all(&pool)
    .await?;

    let total_leads: i64 = leads_by_stage.values().filter_map(Value::as_i64).sum();
    let won_leads = leads_by_stage.get("WON").and_then(Value::as_i64).unwrap_or(0);
    let conversion_rate = if total_leads > 0 {
        (Decimal::from(won_leads) / Decimal::from(total_leads) * Decimal::from(100)).round_dp(1)
    } else {
        Decimal::ZERO
    };

    Ok(ApiResponse::success(json!({
        "total_projects": total_projects,
        "total_units": total_units,
        "total_leads": total_leads,
        "total_users": total_users,
        "units_by_status": units_by_status,
        "leads_by_stage": leads_by_stage,
        "conversion_rate": conversion_rate,
        "inventory_value_usd": {
            "available": available_value.unwrap_or_default().round_dp(2),
            "sold": sold_value.unwrap_or_default().round_dp(2),
        },
        "recent_projects": recent_projects,
        "recent_leads": recent_leads,
        "recent_activity": recent_activity,
    })))
}

async fn count_grouped(pool: &PgPool, sql: &str, org: Uuid) -> Result<Map<String, Value>, ApiError> {
    let rows: Vec<CountByKey> = sqlx::query_as(sql).bind(org).fetch_all(pool).await?;
    Ok(rows.into_iter().map(|r| (r.key, json!(r.count))).collect())
}
