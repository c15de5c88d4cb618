use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Currency {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub symbol: String,
    pub decimal_places: i32,
    pub exchange_rate_to_usd: Decimal,
    pub is_active: bool,
}
