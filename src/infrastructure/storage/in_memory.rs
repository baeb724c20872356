use crate::core::errors::SplitifydError;
use crate::core::models::{
    comment::{Comment, CommentTarget},
    expense::Expense,
    group::{Group, PermissionHistoryEntry},
    settlement::Settlement,
};
use crate::core::pagination::{SortDirection, timestamp_sort_value};
use crate::infrastructure::storage::{Ledger, ListQuery, Storage, Versioned};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

const SORT_FIELD_CREATED_AT: &str = "createdAt";

#[derive(Clone, Default)]
pub struct InMemoryStorage {
    groups: Arc<RwLock<HashMap<String, Versioned<Group>>>>,
    permission_history: Arc<RwLock<HashMap<String, Vec<PermissionHistoryEntry>>>>,
    ledger_revisions: Arc<RwLock<HashMap<String, u64>>>,
    expenses: Arc<RwLock<HashMap<String, Expense>>>,
    settlements: Arc<RwLock<HashMap<String, Settlement>>>,
    comments: Arc<RwLock<HashMap<String, Comment>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        InMemoryStorage {
            groups: Arc::new(RwLock::new(HashMap::new())),
            permission_history: Arc::new(RwLock::new(HashMap::new())),
            ledger_revisions: Arc::new(RwLock::new(HashMap::new())),
            expenses: Arc::new(RwLock::new(HashMap::new())),
            settlements: Arc::new(RwLock::new(HashMap::new())),
            comments: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

// Locks are taken groups first, then ledger revisions, then everything else.

fn check_group_version(
    groups: &HashMap<String, Versioned<Group>>,
    group_id: &str,
    expected_version: u64,
) -> Result<(), SplitifydError> {
    let current = groups
        .get(group_id)
        .ok_or_else(|| SplitifydError::GroupNotFound(group_id.to_string()))?;
    if current.version != expected_version {
        return Err(SplitifydError::ConcurrentModification(format!(
            "group {} is at version {}, expected {}",
            group_id, current.version, expected_version
        )));
    }
    Ok(())
}

/// Orders by `(createdAt, id)` and keeps what comes strictly after the cursor.
fn run_query<'a, T: Clone + 'a>(
    items: impl Iterator<Item = &'a T>,
    query: &ListQuery,
    key: impl Fn(&T) -> (String, String),
) -> Result<Vec<T>, SplitifydError> {
    if query.sort_field != SORT_FIELD_CREATED_AT {
        return Err(SplitifydError::StorageError(format!(
            "unsupported sort field: {}",
            query.sort_field
        )));
    }

    let mut keyed: Vec<((String, String), T)> = items.map(|item| (key(item), item.clone())).collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    if query.direction == SortDirection::Desc {
        keyed.reverse();
    }

    let after = query
        .start_after
        .as_ref()
        .map(|cursor| (cursor.sort_value.clone(), cursor.id.clone()));
    Ok(keyed
        .into_iter()
        .filter(|(k, _)| match (&after, query.direction) {
            (None, _) => true,
            (Some(after), SortDirection::Asc) => k > after,
            (Some(after), SortDirection::Desc) => k < after,
        })
        .take(query.limit)
        .map(|(_, item)| item)
        .collect())
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn create_group(&self, group: Group) -> Result<Versioned<Group>, SplitifydError> {
        let mut groups = self.groups.write().await;
        if groups.contains_key(&group.id) {
            return Err(SplitifydError::StorageError(format!("group {} already exists", group.id)));
        }
        let stored = Versioned { version: 1, value: group };
        groups.insert(stored.value.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn get_group(&self, group_id: &str) -> Result<Option<Versioned<Group>>, SplitifydError> {
        let groups = self.groups.read().await;
        Ok(groups.get(group_id).cloned())
    }

    async fn commit_group(
        &self,
        group: Group,
        expected_version: u64,
        expected_ledger_revision: Option<u64>,
        history: Vec<PermissionHistoryEntry>,
    ) -> Result<u64, SplitifydError> {
        // Every lock is held for the whole commit so the history never diverges from the group.
        let mut groups = self.groups.write().await;
        let ledger_revisions = self.ledger_revisions.read().await;
        let mut permission_history = self.permission_history.write().await;

        check_group_version(&groups, &group.id, expected_version)?;
        if let Some(expected) = expected_ledger_revision {
            let revision = ledger_revisions.get(&group.id).copied().unwrap_or_default();
            if revision != expected {
                return Err(SplitifydError::ConcurrentModification(format!(
                    "ledger of group {} is at revision {}, expected {}",
                    group.id, revision, expected
                )));
            }
        }
        let current = groups
            .get_mut(&group.id)
            .ok_or_else(|| SplitifydError::GroupNotFound(group.id.clone()))?;

        let log = permission_history.entry(group.id.clone()).or_default();
        for mut entry in history {
            entry.sequence = log.len() as u64 + 1;
            log.push(entry);
        }

        current.version += 1;
        current.value = group;
        Ok(current.version)
    }

    async fn get_permission_history(&self, group_id: &str) -> Result<Vec<PermissionHistoryEntry>, SplitifydError> {
        let permission_history = self.permission_history.read().await;
        Ok(permission_history.get(group_id).cloned().unwrap_or_default())
    }

    async fn get_ledger(&self, group_id: &str) -> Result<Ledger, SplitifydError> {
        let ledger_revisions = self.ledger_revisions.read().await;
        let expenses = self.expenses.read().await;
        let settlements = self.settlements.read().await;
        Ok(Ledger {
            revision: ledger_revisions.get(group_id).copied().unwrap_or_default(),
            expenses: expenses.values().filter(|e| e.group_id == group_id).cloned().collect(),
            settlements: settlements.values().filter(|s| s.group_id == group_id).cloned().collect(),
        })
    }

    async fn save_expense(&self, expense: Expense, group_version: u64) -> Result<(), SplitifydError> {
        let groups = self.groups.read().await;
        check_group_version(&groups, &expense.group_id, group_version)?;
        let mut ledger_revisions = self.ledger_revisions.write().await;
        let mut expenses = self.expenses.write().await;
        *ledger_revisions.entry(expense.group_id.clone()).or_default() += 1;
        expenses.insert(expense.id.clone(), expense);
        Ok(())
    }

    async fn get_expense(&self, expense_id: &str) -> Result<Option<Expense>, SplitifydError> {
        let expenses = self.expenses.read().await;
        Ok(expenses.get(expense_id).cloned())
    }

    async fn query_expenses(&self, group_id: &str, query: &ListQuery) -> Result<Vec<Expense>, SplitifydError> {
        let expenses = self.expenses.read().await;
        run_query(
            expenses.values().filter(|e| e.group_id == group_id && !e.is_deleted()),
            query,
            |e| (timestamp_sort_value(&e.created_at), e.id.clone()),
        )
    }

    async fn save_settlement(&self, settlement: Settlement, group_version: u64) -> Result<(), SplitifydError> {
        let groups = self.groups.read().await;
        check_group_version(&groups, &settlement.group_id, group_version)?;
        let mut ledger_revisions = self.ledger_revisions.write().await;
        let mut settlements = self.settlements.write().await;
        *ledger_revisions.entry(settlement.group_id.clone()).or_default() += 1;
        settlements.insert(settlement.id.clone(), settlement);
        Ok(())
    }

    async fn get_settlement(&self, settlement_id: &str) -> Result<Option<Settlement>, SplitifydError> {
        let settlements = self.settlements.read().await;
        Ok(settlements.get(settlement_id).cloned())
    }

    async fn query_settlements(&self, group_id: &str, query: &ListQuery) -> Result<Vec<Settlement>, SplitifydError> {
        let settlements = self.settlements.read().await;
        run_query(
            settlements.values().filter(|s| s.group_id == group_id && !s.is_deleted()),
            query,
            |s| (timestamp_sort_value(&s.created_at), s.id.clone()),
        )
    }

    async fn save_comment(&self, comment: Comment) -> Result<(), SplitifydError> {
        let mut comments = self.comments.write().await;
        comments.insert(comment.id.clone(), comment);
        Ok(())
    }

    async fn query_comments(
        &self,
        group_id: &str,
        target: &CommentTarget,
        query: &ListQuery,
    ) -> Result<Vec<Comment>, SplitifydError> {
        let comments = self.comments.read().await;
        run_query(
            comments
                .values()
                .filter(|c| c.group_id == group_id && &c.target == target),
            query,
            |c| (timestamp_sort_value(&c.created_at), c.id.clone()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::expense::{ExpenseSplit, SplitType};
    use crate::core::models::group::{PermissionChangeType, SecurityPreset};
    use crate::core::pagination::{Cursor, PageableQuery, apply_pagination};
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn group(id: &str) -> Group {
        let now = Utc::now();
        Group {
            id: id.to_string(),
            name: "Flat".to_string(),
            created_by: "admin".to_string(),
            members: BTreeMap::new(),
            security_preset: SecurityPreset::Open,
            permissions: SecurityPreset::Open.defaults().unwrap(),
            created_at: now,
            updated_at: now,
        }
    }

    fn history_entry() -> PermissionHistoryEntry {
        PermissionHistoryEntry {
            sequence: 0,
            timestamp: Utc::now(),
            changed_by: "admin".to_string(),
            change_type: PermissionChangeType::Preset,
            changes: json!({ "preset": "managed" }),
        }
    }

    fn expense(id: &str, group_id: &str) -> Expense {
        let now = Utc::now();
        Expense {
            id: id.to_string(),
            group_id: group_id.to_string(),
            created_by: "admin".to_string(),
            paid_by: "admin".to_string(),
            description: "Rent".to_string(),
            amount: dec!(10),
            currency: "USD".to_string(),
            split_type: SplitType::Exact,
            participants: vec!["admin".to_string()],
            splits: vec![ExpenseSplit::new("admin", dec!(10))],
            created_at: now,
            updated_at: now,
            deleted_at: None,
            deleted_by: None,
        }
    }

    fn comment(id: &str, minutes: i64) -> Comment {
        Comment {
            id: id.to_string(),
            group_id: "g1".to_string(),
            target: CommentTarget::Group,
            author_id: "admin".to_string(),
            text: format!("comment {id}"),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes),
        }
    }

    #[tokio::test]
    async fn stale_commit_is_rejected_without_touching_history() {
        let storage = InMemoryStorage::new();
        let created = storage.create_group(group("g1")).await.unwrap();
        assert_eq!(created.version, 1);

        let version = storage
            .commit_group(created.value.clone(), 1, None, vec![history_entry()])
            .await
            .unwrap();
        assert_eq!(version, 2);

        let stale = storage.commit_group(created.value, 1, None, vec![history_entry()]).await;
        assert!(matches!(stale, Err(SplitifydError::ConcurrentModification(_))));

        let history = storage.get_permission_history("g1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].sequence, 1);
    }

    #[tokio::test]
    async fn ledger_writes_are_tied_to_the_group_version() {
        let storage = InMemoryStorage::new();
        let created = storage.create_group(group("g1")).await.unwrap();
        storage.save_expense(expense("e1", "g1"), 1).await.unwrap();

        let ledger = storage.get_ledger("g1").await.unwrap();
        assert_eq!(ledger.revision, 1);
        assert_eq!(ledger.expenses.len(), 1);

        // A commit that read the ledger before the next write loses.
        storage.save_expense(expense("e2", "g1"), 1).await.unwrap();
        let stale = storage.commit_group(created.value.clone(), 1, Some(ledger.revision), vec![]).await;
        assert!(matches!(stale, Err(SplitifydError::ConcurrentModification(_))));

        let version = storage.commit_group(created.value, 1, Some(2), vec![]).await.unwrap();
        assert_eq!(version, 2);

        // A write checked against the old group version loses too.
        let late = storage.save_expense(expense("e3", "g1"), 1).await;
        assert!(matches!(late, Err(SplitifydError::ConcurrentModification(_))));
        let missing = storage.save_expense(expense("e4", "nope"), 1).await;
        assert!(matches!(missing, Err(SplitifydError::GroupNotFound(_))));
        assert_eq!(storage.get_ledger("g1").await.unwrap().expenses.len(), 2);
    }

    #[tokio::test]
    async fn comment_query_walks_pages_newest_first() {
        let storage = InMemoryStorage::new();
        for (id, minutes) in [("c1", 1), ("c2", 2), ("c3", 3)] {
            storage.save_comment(comment(id, minutes)).await.unwrap();
        }

        let first = apply_pagination(ListQuery::default(), "createdAt", None, SortDirection::Desc, 2);
        let page = storage.query_comments("g1", &CommentTarget::Group, &first).await.unwrap();
        let ids: Vec<_> = page.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c3", "c2"]);

        let last = &page[1];
        let cursor = Cursor::new(timestamp_sort_value(&last.created_at), last.id.clone());
        let next = apply_pagination(ListQuery::default(), "createdAt", Some(&cursor), SortDirection::Desc, 2);
        let page = storage.query_comments("g1", &CommentTarget::Group, &next).await.unwrap();
        let ids: Vec<_> = page.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1"]);
    }

    #[tokio::test]
    async fn unknown_sort_field_is_an_error() {
        let storage = InMemoryStorage::new();
        let query = ListQuery::default().order_by("amount", SortDirection::Asc);
        let result = storage.query_expenses("g1", &query).await;
        assert!(matches!(result, Err(SplitifydError::StorageError(_))));
    }
}
