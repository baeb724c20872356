use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SettlementDraft {
    pub payer_id: String,
    pub payee_id: String,
    #[schema(value_type = String, example = "50.00")]
    pub amount: Decimal,
    pub currency: String,
    pub note: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub id: String,
    pub group_id: String,
    pub created_by: String,
    pub payer_id: String,
    pub payee_id: String,
    #[schema(value_type = String, example = "50.00")]
    pub amount: Decimal,
    pub currency: String,
    pub note: Option<String>,
    #[schema(value_type = String, example = "2024-06-01T12:34:56Z")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, example = "2024-06-01T12:34:56Z")]
    pub updated_at: DateTime<Utc>,
    #[schema(value_type = Option<String>, example = "2024-06-01T12:34:56Z")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
}

impl Settlement {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
