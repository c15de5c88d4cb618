use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "unit_type", rename_all = "UPPERCASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitType {
    Apartment,
    House,
    Commercial,
    Land,
    Office,
    Parking,
    Storage,
}

impl UnitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitType::Apartment => "APARTMENT",
            UnitType::House => "HOUSE",
            UnitType::Commercial => "COMMERCIAL",
            UnitType::Land => "LAND",
            UnitType::Office => "OFFICE",
            UnitType::Parking => "PARKING",
            UnitType::Storage => "STORAGE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "APARTMENT" => Some(UnitType::Apartment),
            "HOUSE" => Some(UnitType::House),
            "COMMERCIAL" => Some(UnitType::Commercial),
            "LAND" => Some(UnitType::Land),
            "OFFICE" => Some(UnitType::Office),
            "PARKING" => Some(UnitType::Parking),
            "STORAGE" => Some(UnitType::Storage),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "unit_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    Available,
    Reserved,
    Sold,
    Unavailable,
}

impl UnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Available => "AVAILABLE",
            UnitStatus::Reserved => "RESERVED",
            UnitStatus::Sold => "SOLD",
            UnitStatus::Unavailable => "UNAVAILABLE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AVAILABLE" => Some(UnitStatus::Available),
            "RESERVED" => Some(UnitStatus::Reserved),
            "SOLD" => Some(UnitStatus::Sold),
            "UNAVAILABLE" => Some(UnitStatus::Unavailable),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Unit {
    pub id: Uuid,
    pub sku: String,
    pub name: Option<String>,
    pub unit_type: UnitType,
    pub status: UnitStatus,
    pub price: Decimal,
    pub currency_id: Uuid,
    pub project_id: Uuid,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<Decimal>,
    pub area_sqm: Option<Decimal>,
    pub floor: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
