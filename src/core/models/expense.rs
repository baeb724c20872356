use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SplitType {
    Equal,
    Exact,
    Percentage,
}

impl std::fmt::Display for SplitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SplitType::Equal => "equal",
            SplitType::Exact => "exact",
            SplitType::Percentage => "percentage",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseSplit {
    pub user_id: String,
    #[schema(value_type = String, example = "33.33")]
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, example = "33.33")]
    pub percentage: Option<Decimal>,
}

impl ExpenseSplit {
    pub fn new(user_id: impl Into<String>, amount: Decimal) -> Self {
        ExpenseSplit {
            user_id: user_id.into(),
            amount,
            percentage: None,
        }
    }

    pub fn with_percentage(user_id: impl Into<String>, amount: Decimal, percentage: Decimal) -> Self {
        ExpenseSplit {
            user_id: user_id.into(),
            amount,
            percentage: Some(percentage),
        }
    }
}

/// Caller-supplied expense fields, before validation.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseDraft {
    pub description: String,
    pub paid_by: String,
    #[schema(value_type = String, example = "100.00")]
    pub amount: Decimal,
    pub currency: String,
    pub split_type: SplitType,
    pub participants: Vec<String>,
    /// May be left empty for equal splits; the service then generates them.
    #[serde(default)]
    pub splits: Vec<ExpenseSplit>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    pub group_id: String,
    pub created_by: String,
    pub paid_by: String,
    pub description: String,
    #[schema(value_type = String, example = "100.00")]
    pub amount: Decimal,
    pub currency: String,
    pub split_type: SplitType,
    pub participants: Vec<String>,
    pub splits: Vec<ExpenseSplit>,
    #[schema(value_type = String, example = "2024-06-01T12:34:56Z")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, example = "2024-06-01T12:34:56Z")]
    pub updated_at: DateTime<Utc>,
    #[schema(value_type = Option<String>, example = "2024-06-01T12:34:56Z")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
}

impl Expense {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
