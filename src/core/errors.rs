use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub title: String,
    pub description: String,
}

#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum SplitifydError {
    /// Currency code is not in the currency table
    #[error("Unknown currency: {0}")]
    InvalidCurrency(String),

    /// Amount is zero, negative or malformed
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Amount carries more decimal places than the currency allows
    #[error("{0}")]
    PrecisionError(String),

    #[error("Participant {0} appears more than once")]
    DuplicateParticipant(String),

    /// Splits and participants do not line up one to one
    #[error("Invalid splits: {0}")]
    InvalidSplits(String),

    #[error("User {0} appears more than once in splits")]
    DuplicateSplitUser(String),

    /// Split references a user who is not a participant
    #[error("Split user {0} is not a participant")]
    InvalidSplitUser(String),

    #[error("Split amount for {0} must be greater than zero")]
    InvalidSplitAmount(String),

    #[error("Split amounts total {actual}, expected {expected}")]
    InvalidSplitTotal { expected: Decimal, actual: Decimal },

    #[error("Percentage for {user_id} must be greater than 0 and at most 100, got {percentage:?}")]
    InvalidPercentage {
        user_id: String,
        percentage: Option<Decimal>,
    },

    #[error("Percentages total {0}, expected 100")]
    InvalidPercentageTotal(Decimal),

    /// Payee and payer are the same user
    #[error("Cannot create settlement to self")]
    SelfSettlement,

    /// Payer, payee or participant is not an active group member
    #[error("User {0} is not an active group member")]
    InvalidParticipant(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    /// Business rule refusal, e.g. removing the last admin
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("User {0} is not a group member")]
    NotMember(String),

    #[error("Invalid cursor format: {0}")]
    InvalidCursorFormat(String),

    #[error("Invalid query parameters: {0}")]
    InvalidQueryParams(String),

    #[error("Invalid input for field `{0}`: {1:?}")]
    InvalidInput(String, FieldError),

    #[error("Group {0} not found")]
    GroupNotFound(String),

    #[error("Expense {0} not found")]
    ExpenseNotFound(String),

    #[error("Settlement {0} not found")]
    SettlementNotFound(String),

    /// Optimistic concurrency check failed; the caller may retry
    #[error("Concurrent modification of {0}")]
    ConcurrentModification(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Logging error: {0}")]
    LoggingError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl SplitifydError {
    /// Machine-readable code returned to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            SplitifydError::InvalidCurrency(_) => "INVALID_CURRENCY",
            SplitifydError::InvalidAmount(_) => "INVALID_AMOUNT",
            SplitifydError::PrecisionError(_) => "INVALID_AMOUNT_PRECISION",
            SplitifydError::DuplicateParticipant(_) => "DUPLICATE_PARTICIPANTS",
            SplitifydError::InvalidSplits(_) => "INVALID_SPLITS",
            SplitifydError::DuplicateSplitUser(_) => "DUPLICATE_SPLIT_USERS",
            SplitifydError::InvalidSplitUser(_) => "INVALID_SPLIT_USER",
            SplitifydError::InvalidSplitAmount(_) => "INVALID_SPLIT_AMOUNT",
            SplitifydError::InvalidSplitTotal { .. } => "INVALID_SPLIT_TOTAL",
            SplitifydError::InvalidPercentage { .. } => "INVALID_PERCENTAGE",
            SplitifydError::InvalidPercentageTotal(_) => "INVALID_PERCENTAGE_TOTAL",
            SplitifydError::SelfSettlement => "SELF_SETTLEMENT",
            SplitifydError::InvalidParticipant(_) => "INVALID_PARTICIPANT",
            SplitifydError::NotAuthorized(_) => "NOT_AUTHORIZED",
            SplitifydError::InvalidRequest(_) => "INVALID_REQUEST",
            SplitifydError::NotMember(_) => "NOT_GROUP_MEMBER",
            SplitifydError::InvalidCursorFormat(_) => "INVALID_CURSOR_FORMAT",
            SplitifydError::InvalidQueryParams(_) => "INVALID_QUERY_PARAMS",
            SplitifydError::InvalidInput(..) => "INVALID_INPUT",
            SplitifydError::GroupNotFound(_) => "GROUP_NOT_FOUND",
            SplitifydError::ExpenseNotFound(_) => "EXPENSE_NOT_FOUND",
            SplitifydError::SettlementNotFound(_) => "SETTLEMENT_NOT_FOUND",
            SplitifydError::ConcurrentModification(_) => "CONCURRENT_UPDATE",
            SplitifydError::Unauthenticated(_) => "UNAUTHORIZED",
            SplitifydError::StorageError(_) => "STORAGE_ERROR",
            SplitifydError::LoggingError(_) => "LOGGING_ERROR",
            SplitifydError::CacheError(_) => "CACHE_ERROR",
            SplitifydError::InternalServerError(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the failure came from a lost optimistic-concurrency race.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SplitifydError::ConcurrentModification(_))
    }
}
