use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "lead_stage", rename_all = "UPPERCASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStage {
    New,
    Contacted,
    Qualified,
    Proposal,
    Negotiation,
    Won,
    Lost,
}

impl LeadStage {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NEW" => Some(LeadStage::New),
            "CONTACTED" => Some(LeadStage::Contacted),
            "QUALIFIED" => Some(LeadStage::Qualified),
            "PROPOSAL" => Some(LeadStage::Proposal),
            "NEGOTIATION" => Some(LeadStage::Negotiation),
            "WON" => Some(LeadStage::Won),
            "LOST" => Some(LeadStage::Lost),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Lead {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub stage: LeadStage,
    pub source: Option<String>,
    pub notes: Option<String>,
    pub assigned_to_id: Option<Uuid>,
    pub budget: Option<Decimal>,
    pub expected_close_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
