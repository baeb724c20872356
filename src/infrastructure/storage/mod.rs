use crate::core::errors::SplitifydError;
use crate::core::models::{
    comment::{Comment, CommentTarget},
    expense::Expense,
    group::{Group, PermissionHistoryEntry},
    settlement::Settlement,
};
use crate::core::pagination::{Cursor, PageableQuery, SortDirection};
use async_trait::async_trait;

/// A document together with the version it was read at.
#[derive(Clone, Debug)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

/// Every expense and settlement of a group, soft-deleted ones included, as of one
/// ledger revision. Each ledger write bumps the revision.
#[derive(Clone, Debug, Default)]
pub struct Ledger {
    pub revision: u64,
    pub expenses: Vec<Expense>,
    pub settlements: Vec<Settlement>,
}

/// An ordered, limited list read. Built through [`PageableQuery`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListQuery {
    pub sort_field: String,
    pub direction: SortDirection,
    pub limit: usize,
    pub start_after: Option<Cursor>,
}

impl Default for ListQuery {
    fn default() -> Self {
        ListQuery {
            sort_field: "createdAt".to_string(),
            direction: SortDirection::Desc,
            limit: usize::MAX,
            start_after: None,
        }
    }
}

impl PageableQuery for ListQuery {
    fn order_by(mut self, field: &str, direction: SortDirection) -> Self {
        self.sort_field = field.to_string();
        self.direction = direction;
        self
    }

    fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn start_after(mut self, sort_value: &str, id: &str) -> Self {
        self.start_after = Some(Cursor::new(sort_value, id));
        self
    }
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn create_group(&self, group: Group) -> Result<Versioned<Group>, SplitifydError>;
    async fn get_group(&self, group_id: &str) -> Result<Option<Versioned<Group>>, SplitifydError>;
    /// Writes `group` if it is still at `expected_version` and appends `history` in the
    /// same step. When `expected_ledger_revision` is set the group's ledger must also be
    /// unchanged. Fails with `ConcurrentModification` otherwise. Returns the new version.
    async fn commit_group(
        &self,
        group: Group,
        expected_version: u64,
        expected_ledger_revision: Option<u64>,
        history: Vec<PermissionHistoryEntry>,
    ) -> Result<u64, SplitifydError>;
    async fn get_permission_history(&self, group_id: &str) -> Result<Vec<PermissionHistoryEntry>, SplitifydError>;
    async fn get_ledger(&self, group_id: &str) -> Result<Ledger, SplitifydError>;

    /// Writes `expense` only while its group is still at `group_version`.
    async fn save_expense(&self, expense: Expense, group_version: u64) -> Result<(), SplitifydError>;
    async fn get_expense(&self, expense_id: &str) -> Result<Option<Expense>, SplitifydError>;
    /// Non-deleted expenses of the group, ordered and limited by `query`.
    async fn query_expenses(&self, group_id: &str, query: &ListQuery) -> Result<Vec<Expense>, SplitifydError>;

    /// Same group version guard as [`Storage::save_expense`].
    async fn save_settlement(&self, settlement: Settlement, group_version: u64) -> Result<(), SplitifydError>;
    async fn get_settlement(&self, settlement_id: &str) -> Result<Option<Settlement>, SplitifydError>;
    async fn query_settlements(&self, group_id: &str, query: &ListQuery) -> Result<Vec<Settlement>, SplitifydError>;

    async fn save_comment(&self, comment: Comment) -> Result<(), SplitifydError>;
    async fn query_comments(
        &self,
        group_id: &str,
        target: &CommentTarget,
        query: &ListQuery,
    ) -> Result<Vec<Comment>, SplitifydError>;
}

pub mod in_memory;
