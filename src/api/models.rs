use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::core::errors::SplitifydError;
use crate::core::models::{
    expense::ExpenseDraft,
    group::{MemberRole, SecurityPreset},
    settlement::SettlementDraft,
};

#[derive(Deserialize, ToSchema)]
pub struct CreateGroupRequest {
    pub name: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    pub user_id: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SecurityPresetRequest {
    pub preset: SecurityPreset,
}

#[derive(Deserialize, ToSchema)]
pub struct SetRoleRequest {
    pub role: MemberRole,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateExpenseRequest {
    pub group_id: String,
    #[serde(flatten)]
    pub expense: ExpenseDraft,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSettlementRequest {
    pub group_id: String,
    #[serde(flatten)]
    pub settlement: SettlementDraft,
}

#[derive(Deserialize, ToSchema)]
pub struct AddCommentRequest {
    pub text: String,
}

/// `cursor` and `limit` are kept as raw strings so bad values map to API error codes.
#[derive(Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// Opaque continuation token from a previous page
    pub cursor: Option<String>,
    /// Page size, 1 to 100
    pub limit: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: String,
    pub error: String,
}

// Newtype wrapper for SplitifydError to implement IntoResponse
pub struct ApiError(pub SplitifydError);

impl From<SplitifydError> for ApiError {
    fn from(err: SplitifydError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            SplitifydError::InvalidCurrency(_)
            | SplitifydError::InvalidAmount(_)
            | SplitifydError::PrecisionError(_)
            | SplitifydError::DuplicateParticipant(_)
            | SplitifydError::InvalidSplits(_)
            | SplitifydError::DuplicateSplitUser(_)
            | SplitifydError::InvalidSplitUser(_)
            | SplitifydError::InvalidSplitAmount(_)
            | SplitifydError::InvalidSplitTotal { .. }
            | SplitifydError::InvalidPercentage { .. }
            | SplitifydError::InvalidPercentageTotal(_)
            | SplitifydError::SelfSettlement
            | SplitifydError::InvalidParticipant(_)
            | SplitifydError::InvalidRequest(_)
            | SplitifydError::InvalidCursorFormat(_)
            | SplitifydError::InvalidQueryParams(_)
            | SplitifydError::InvalidInput(..) => StatusCode::BAD_REQUEST,
            SplitifydError::NotAuthorized(_) | SplitifydError::NotMember(_) => StatusCode::FORBIDDEN,
            SplitifydError::GroupNotFound(_)
            | SplitifydError::ExpenseNotFound(_)
            | SplitifydError::SettlementNotFound(_) => StatusCode::NOT_FOUND,
            SplitifydError::ConcurrentModification(_) => StatusCode::CONFLICT,
            SplitifydError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            SplitifydError::StorageError(_)
            | SplitifydError::LoggingError(_)
            | SplitifydError::CacheError(_)
            | SplitifydError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = ErrorResponse {
            code: self.0.code().to_string(),
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(SplitifydError::InvalidSplitTotal { expected: dec!(100), actual: dec!(99.98) }, StatusCode::BAD_REQUEST)]
    #[case(SplitifydError::DuplicateSplitUser("u1".into()), StatusCode::BAD_REQUEST)]
    #[case(SplitifydError::InvalidRequest("last admin".into()), StatusCode::BAD_REQUEST)]
    #[case(SplitifydError::NotAuthorized("nope".into()), StatusCode::FORBIDDEN)]
    #[case(SplitifydError::NotMember("u9".into()), StatusCode::FORBIDDEN)]
    #[case(SplitifydError::ExpenseNotFound("e1".into()), StatusCode::NOT_FOUND)]
    #[case(SplitifydError::ConcurrentModification("g1".into()), StatusCode::CONFLICT)]
    #[case(SplitifydError::Unauthenticated("missing".into()), StatusCode::UNAUTHORIZED)]
    #[case(SplitifydError::StorageError("down".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    fn status_mapping(#[case] error: SplitifydError, #[case] expected: StatusCode) {
        assert_eq!(ApiError(error).status(), expected);
    }
}
