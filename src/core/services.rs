use crate::auth::jwt::{Claims, JwtService};
use crate::constants::{
    COMMENT_ADDED, DEFAULT_PAGE_SIZE, DEFAULT_TRANSACTION_ATTEMPTS, EXPENSE_CREATED, EXPENSE_DELETED,
    EXPENSE_UPDATED, GROUP_CREATED, MAX_COMMENT_LENGTH, MAX_DESCRIPTION_LENGTH, MAX_GROUP_NAME_LENGTH,
    MAX_NOTE_LENGTH, MAX_PAGE_SIZE, MAX_USER_ID_LENGTH, MEMBER_ADDED, MEMBER_APPROVED, MEMBER_REMOVED,
    MEMBER_ROLE_CHANGED, PERMISSIONS_UPDATED, SECURITY_PRESET_APPLIED, SETTLEMENT_CREATED, SETTLEMENT_DELETED,
    SETTLEMENT_UPDATED,
};
use crate::core::allocation::equal_splits;
use crate::core::balances::{GroupBalances, compute_balances, has_outstanding_balance, simplify_debts};
use crate::core::errors::{FieldError, SplitifydError};
use crate::core::models::{
    audit::AppLog,
    comment::{Comment, CommentTarget},
    expense::{Expense, ExpenseDraft, SplitType},
    group::{
        Group, GroupAction, GroupMember, MemberRole, MemberStatus, PartialGroupPermissions, PermissionChangeType,
        PermissionHistoryEntry, SecurityPreset,
    },
    settlement::{Settlement, SettlementDraft},
};
use crate::core::pagination::{
    Cursor, Page, SortDirection, apply_pagination, decode_cursor, parse_limit, timestamp_sort_value,
};
use crate::core::permissions::{self, GroupSecurity, UserPermissions};
use crate::core::validation::{ValidatedExpense, validate_expense, validate_expense_draft, validate_settlement};
use crate::infrastructure::cache::Cache;
use crate::infrastructure::logging::LoggingService;
use crate::infrastructure::storage::{Ledger, ListQuery, Storage, Versioned};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

const SORT_FIELD: &str = "createdAt";

/// A permission change to record in the group's history.
type HistoryChange = (PermissionChangeType, serde_json::Value);

pub struct SplitifydService<L: LoggingService, S: Storage, C: Cache> {
    storage: S,
    logging: L,
    cache: C,
    jwt_service: JwtService,
    transaction_attempts: u32,
    default_page_size: usize,
    max_page_size: usize,
}

impl<L: LoggingService, S: Storage, C: Cache> SplitifydService<L, S, C> {
    pub fn new(storage: S, logging: L, cache: C, jwt_secret: impl Into<String>) -> Self {
        SplitifydService {
            storage,
            logging,
            cache,
            jwt_service: JwtService::new(jwt_secret),
            transaction_attempts: DEFAULT_TRANSACTION_ATTEMPTS,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }

    /// Caps how many times a group mutation is attempted when it loses a version race.
    pub fn with_transaction_attempts(mut self, attempts: u32) -> Self {
        self.transaction_attempts = attempts.max(1);
        self
    }

    pub fn with_page_sizes(mut self, default_page_size: usize, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size.max(1);
        self.default_page_size = default_page_size.clamp(1, self.max_page_size);
        self
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, SplitifydError> {
        self.jwt_service.validate_token(token)
    }

    pub fn generate_token(&self, user_id: &str) -> Result<String, SplitifydError> {
        self.jwt_service.generate_token(user_id)
    }

    async fn load_versioned_group(&self, group_id: &str) -> Result<Versioned<Group>, SplitifydError> {
        self.storage
            .get_group(group_id)
            .await?
            .ok_or_else(|| SplitifydError::GroupNotFound(group_id.to_string()))
    }

    async fn load_group(&self, group_id: &str) -> Result<Group, SplitifydError> {
        Ok(self.load_versioned_group(group_id).await?.value)
    }

    /// Read, mutate and commit a group at the version it was read, retrying
    /// version conflicts up to the configured number of attempts.
    async fn transact_group<F>(&self, group_id: &str, actor_id: &str, mut mutate: F) -> Result<Group, SplitifydError>
    where
        F: FnMut(&mut Group, DateTime<Utc>) -> Result<Option<HistoryChange>, SplitifydError> + Send,
    {
        self.run_group_transaction(group_id, actor_id, false, |group, _, now| mutate(group, now))
            .await
    }

    /// Like [`Self::transact_group`], but also hands the group's ledger to `mutate` and
    /// fails the commit if any expense or settlement was written after it was read.
    async fn transact_group_with_ledger<F>(
        &self,
        group_id: &str,
        actor_id: &str,
        mutate: F,
    ) -> Result<Group, SplitifydError>
    where
        F: FnMut(&mut Group, &Ledger, DateTime<Utc>) -> Result<Option<HistoryChange>, SplitifydError> + Send,
    {
        self.run_group_transaction(group_id, actor_id, true, mutate).await
    }

    async fn run_group_transaction<F>(
        &self,
        group_id: &str,
        actor_id: &str,
        with_ledger: bool,
        mut mutate: F,
    ) -> Result<Group, SplitifydError>
    where
        F: FnMut(&mut Group, &Ledger, DateTime<Utc>) -> Result<Option<HistoryChange>, SplitifydError> + Send,
    {
        let mut attempt = 1;
        loop {
            let Versioned { version, value: mut group } = self.load_versioned_group(group_id).await?;
            let ledger = if with_ledger {
                self.storage.get_ledger(group_id).await?
            } else {
                Ledger::default()
            };
            let ledger_revision = with_ledger.then_some(ledger.revision);

            let now = Utc::now();
            let change = mutate(&mut group, &ledger, now)?;
            group.updated_at = now;
            let history: Vec<PermissionHistoryEntry> = change
                .map(|(change_type, changes)| PermissionHistoryEntry {
                    sequence: 0,
                    timestamp: now,
                    changed_by: actor_id.to_string(),
                    change_type,
                    changes,
                })
                .into_iter()
                .collect();

            match self
                .storage
                .commit_group(group.clone(), version, ledger_revision, history)
                .await
            {
                Ok(new_version) => {
                    debug!(group_id, new_version, attempt, "group committed");
                    return Ok(group);
                }
                Err(e) if e.is_retryable() && attempt < self.transaction_attempts => {
                    warn!(group_id, attempt, "concurrent group update, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn require_member(group: &Group, user_id: &str) -> Result<(), SplitifydError> {
        match group.member(user_id) {
            Some(_) => Ok(()),
            None => Err(SplitifydError::NotMember(user_id.to_string())),
        }
    }

    fn require_active_member(group: &Group, user_id: &str) -> Result<(), SplitifydError> {
        match group.member(user_id) {
            None => Err(SplitifydError::NotMember(user_id.to_string())),
            Some(member) if !member.is_active() => Err(SplitifydError::NotAuthorized(format!(
                "membership of {} in group {} is pending approval",
                user_id, group.id
            ))),
            Some(_) => Ok(()),
        }
    }

    fn require_active_participants<'a>(
        group: &Group,
        user_ids: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), SplitifydError> {
        for user_id in user_ids {
            if group.active_member(user_id).is_none() {
                return Err(SplitifydError::InvalidParticipant(user_id.to_string()));
            }
        }
        Ok(())
    }

    fn validate_text(&self, field: &str, value: &str, max_chars: usize) -> Result<(), SplitifydError> {
        let invalid = |title: &str, description: String| {
            SplitifydError::InvalidInput(
                field.to_string(),
                FieldError {
                    field: field.to_string(),
                    title: title.to_string(),
                    description,
                },
            )
        };
        if value.trim().is_empty() {
            return Err(invalid(&format!("Invalid {}", field), format!("{} cannot be empty", field)));
        }
        if value.chars().count() > max_chars {
            return Err(invalid(
                &format!("{} Too Long", field),
                format!("{} cannot exceed {} characters", field, max_chars),
            ));
        }
        if value.chars().any(|c| c.is_control()) {
            return Err(invalid(
                &format!("Invalid {}", field),
                format!("{} contains invalid characters", field),
            ));
        }
        Ok(())
    }

    fn list_params(
        &self,
        cursor: Option<&str>,
        limit: Option<&str>,
    ) -> Result<(Option<Cursor>, usize), SplitifydError> {
        let limit = parse_limit(limit, self.default_page_size, self.max_page_size)?;
        let cursor = cursor.map(decode_cursor).transpose()?;
        Ok((cursor, limit))
    }

    fn list_query(cursor: Option<&Cursor>, limit: usize) -> ListQuery {
        // One extra row tells whether another page exists.
        apply_pagination(ListQuery::default(), SORT_FIELD, cursor, SortDirection::Desc, limit + 1)
    }

    /// Fills in generated equal splits and runs the validator.
    fn validate_draft(draft: &ExpenseDraft) -> Result<ValidatedExpense, SplitifydError> {
        if draft.split_type == SplitType::Equal && draft.splits.is_empty() {
            let splits = equal_splits(draft.amount, &draft.currency, &draft.participants)?;
            return validate_expense(draft.amount, &draft.currency, draft.split_type, &draft.participants, &splits);
        }
        validate_expense_draft(draft)
    }

    fn check_expense_draft(&self, group: &Group, draft: &ExpenseDraft) -> Result<ValidatedExpense, SplitifydError> {
        self.validate_text("description", &draft.description, MAX_DESCRIPTION_LENGTH)?;
        let validated = Self::validate_draft(draft)?;
        Self::require_active_participants(
            group,
            std::iter::once(draft.paid_by.as_str()).chain(validated.participants.iter().map(String::as_str)),
        )?;
        Ok(validated)
    }

    async fn live_expense(&self, expense_id: &str) -> Result<Expense, SplitifydError> {
        self.storage
            .get_expense(expense_id)
            .await?
            .filter(|e| !e.is_deleted())
            .ok_or_else(|| SplitifydError::ExpenseNotFound(expense_id.to_string()))
    }

    async fn live_settlement(&self, settlement_id: &str) -> Result<Settlement, SplitifydError> {
        self.storage
            .get_settlement(settlement_id)
            .await?
            .filter(|s| !s.is_deleted())
            .ok_or_else(|| SplitifydError::SettlementNotFound(settlement_id.to_string()))
    }

    // Groups and membership

    pub async fn create_group(&self, creator_id: &str, name: &str) -> Result<Group, SplitifydError> {
        self.validate_text("name", name, MAX_GROUP_NAME_LENGTH)?;
        self.validate_text("creatorId", creator_id, MAX_USER_ID_LENGTH)?;

        let now = Utc::now();
        let preset = SecurityPreset::Open;
        let permissions = preset
            .defaults()
            .ok_or_else(|| SplitifydError::InternalServerError("open preset has no defaults".to_string()))?;
        let mut members = BTreeMap::new();
        members.insert(
            creator_id.to_string(),
            GroupMember {
                user_id: creator_id.to_string(),
                role: MemberRole::Admin,
                status: MemberStatus::Active,
                joined_at: now,
                last_permission_change: now,
            },
        );

        let group = Group {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            created_by: creator_id.to_string(),
            members,
            security_preset: preset,
            permissions,
            created_at: now,
            updated_at: now,
        };
        let group = self.storage.create_group(group).await?.value;

        info!(group_id = %group.id, creator_id, "group created");
        self.logging
            .log_action(
                GROUP_CREATED,
                json!({ "group_id": group.id, "name": group.name }),
                Some(creator_id),
            )
            .await?;
        Ok(group)
    }

    pub async fn get_group(&self, actor_id: &str, group_id: &str) -> Result<Group, SplitifydError> {
        let group = self.load_group(group_id).await?;
        Self::require_member(&group, actor_id)?;
        Ok(group)
    }

    /// Invites `user_id`. The new member starts `pending` when approval is restricted.
    pub async fn add_member(&self, actor_id: &str, group_id: &str, user_id: &str) -> Result<GroupMember, SplitifydError> {
        self.validate_text("userId", user_id, MAX_USER_ID_LENGTH)?;
        let group = self
            .transact_group(group_id, actor_id, |group, now| {
                permissions::authorize(group, actor_id, GroupAction::MemberInvitation, None)?;
                if group.member(user_id).is_some() {
                    return Err(SplitifydError::InvalidRequest(format!(
                        "user {} is already a member of this group",
                        user_id
                    )));
                }
                let status = permissions::initial_member_status(group);
                group.members.insert(
                    user_id.to_string(),
                    GroupMember {
                        user_id: user_id.to_string(),
                        role: MemberRole::Member,
                        status,
                        joined_at: now,
                        last_permission_change: now,
                    },
                );
                Ok(None)
            })
            .await?;
        self.cache.invalidate(group_id, Some(user_id)).await?;

        let member = group
            .member(user_id)
            .cloned()
            .ok_or_else(|| SplitifydError::InternalServerError(format!("member {} missing after add", user_id)))?;
        info!(group_id, user_id, status = ?member.status, "member added");
        self.logging
            .log_action(
                MEMBER_ADDED,
                json!({ "group_id": group_id, "user_id": user_id, "status": member.status }),
                Some(actor_id),
            )
            .await?;
        Ok(member)
    }

    pub async fn approve_member(
        &self,
        actor_id: &str,
        group_id: &str,
        user_id: &str,
    ) -> Result<GroupMember, SplitifydError> {
        let group = self
            .transact_group(group_id, actor_id, |group, now| {
                permissions::authorize(group, actor_id, GroupAction::MemberApproval, None)?;
                let member = group
                    .members
                    .get_mut(user_id)
                    .ok_or_else(|| SplitifydError::NotMember(user_id.to_string()))?;
                if member.is_active() {
                    return Err(SplitifydError::InvalidRequest(format!("user {} is not pending", user_id)));
                }
                member.status = MemberStatus::Active;
                member.last_permission_change = now;
                Ok(None)
            })
            .await?;
        self.cache.invalidate(group_id, Some(user_id)).await?;

        let member = group
            .member(user_id)
            .cloned()
            .ok_or_else(|| SplitifydError::InternalServerError(format!("member {} missing after approval", user_id)))?;
        info!(group_id, user_id, "member approved");
        self.logging
            .log_action(
                MEMBER_APPROVED,
                json!({ "group_id": group_id, "user_id": user_id }),
                Some(actor_id),
            )
            .await?;
        Ok(member)
    }

    /// Removes a member, or lets a member leave. Members still owing or owed money stay.
    pub async fn remove_member(&self, actor_id: &str, group_id: &str, user_id: &str) -> Result<(), SplitifydError> {
        self.transact_group_with_ledger(group_id, actor_id, |group, ledger, _| {
            Self::require_member(group, actor_id)?;
            permissions::can_remove_member(group, actor_id, user_id)?;
            let balances = compute_balances(&ledger.expenses, &ledger.settlements)?;
            if has_outstanding_balance(&balances, user_id) {
                return Err(SplitifydError::InvalidRequest(format!(
                    "user {} has an outstanding balance in this group",
                    user_id
                )));
            }
            group.members.remove(user_id);
            Ok(None)
        })
        .await?;
        self.cache.invalidate(group_id, Some(user_id)).await?;

        info!(group_id, user_id, removed_by = actor_id, "member removed");
        self.logging
            .log_action(
                MEMBER_REMOVED,
                json!({ "group_id": group_id, "user_id": user_id }),
                Some(actor_id),
            )
            .await?;
        Ok(())
    }

    // Permissions

    pub async fn apply_security_preset(
        &self,
        actor_id: &str,
        group_id: &str,
        preset: SecurityPreset,
    ) -> Result<GroupSecurity, SplitifydError> {
        let group = self
            .transact_group(group_id, actor_id, |group, _| {
                Self::require_member(group, actor_id)?;
                let changes = permissions::apply_security_preset(group, actor_id, preset)?;
                Ok(Some((PermissionChangeType::Preset, changes)))
            })
            .await?;
        self.cache.invalidate(group_id, None).await?;

        info!(group_id, ?preset, "security preset applied");
        self.logging
            .log_action(
                SECURITY_PRESET_APPLIED,
                json!({ "group_id": group_id, "preset": preset }),
                Some(actor_id),
            )
            .await?;
        Ok(GroupSecurity::of(&group))
    }

    pub async fn update_group_permissions(
        &self,
        actor_id: &str,
        group_id: &str,
        changes: &PartialGroupPermissions,
    ) -> Result<GroupSecurity, SplitifydError> {
        let group = self
            .transact_group(group_id, actor_id, |group, _| {
                Self::require_member(group, actor_id)?;
                let record = permissions::apply_permission_update(group, actor_id, changes)?;
                Ok(Some((PermissionChangeType::Custom, record)))
            })
            .await?;
        self.cache.invalidate(group_id, None).await?;

        info!(group_id, "group permissions updated");
        self.logging
            .log_action(
                PERMISSIONS_UPDATED,
                json!({ "group_id": group_id, "changes": changes }),
                Some(actor_id),
            )
            .await?;
        Ok(GroupSecurity::of(&group))
    }

    pub async fn set_member_role(
        &self,
        actor_id: &str,
        group_id: &str,
        target_id: &str,
        role: MemberRole,
    ) -> Result<GroupMember, SplitifydError> {
        let group = self
            .transact_group(group_id, actor_id, |group, now| {
                Self::require_member(group, actor_id)?;
                let record = permissions::apply_role_change(group, actor_id, target_id, role, now)?;
                Ok(Some((PermissionChangeType::Role, record)))
            })
            .await?;
        self.cache.invalidate(group_id, Some(target_id)).await?;

        let member = group
            .member(target_id)
            .cloned()
            .ok_or_else(|| SplitifydError::InternalServerError(format!("member {} missing after role change", target_id)))?;
        info!(group_id, target_id, %role, "member role changed");
        self.logging
            .log_action(
                MEMBER_ROLE_CHANGED,
                json!({ "group_id": group_id, "user_id": target_id, "role": role }),
                Some(actor_id),
            )
            .await?;
        Ok(member)
    }

    /// Effective permissions of `user_id`, served from the cache when present.
    pub async fn get_user_permissions(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> Result<UserPermissions, SplitifydError> {
        if let Some(cached) = self.cache.get_user_permissions(group_id, user_id).await? {
            debug!(group_id, user_id, "user permissions cache hit");
            return Ok(cached);
        }
        let generation = self.cache.generation(group_id).await?;
        let group = self.load_group(group_id).await?;
        let computed = permissions::user_permissions(&group, user_id)?;
        self.cache.save_user_permissions(&computed, generation).await?;
        Ok(computed)
    }

    pub async fn get_group_permissions(&self, actor_id: &str, group_id: &str) -> Result<GroupSecurity, SplitifydError> {
        self.get_user_permissions(group_id, actor_id).await?;
        if let Some(cached) = self.cache.get_group_permissions(group_id).await? {
            return Ok(cached);
        }
        let generation = self.cache.generation(group_id).await?;
        let security = GroupSecurity::of(&self.load_group(group_id).await?);
        self.cache.save_group_permissions(&security, generation).await?;
        Ok(security)
    }

    pub async fn get_permission_history(
        &self,
        actor_id: &str,
        group_id: &str,
    ) -> Result<Vec<PermissionHistoryEntry>, SplitifydError> {
        let group = self.load_group(group_id).await?;
        Self::require_member(&group, actor_id)?;
        self.storage.get_permission_history(group_id).await
    }

    // Expenses

    pub async fn create_expense(
        &self,
        actor_id: &str,
        group_id: &str,
        draft: ExpenseDraft,
    ) -> Result<Expense, SplitifydError> {
        let Versioned { version, value: group } = self.load_versioned_group(group_id).await?;
        Self::require_active_member(&group, actor_id)?;
        let validated = self.check_expense_draft(&group, &draft)?;

        let now = Utc::now();
        let expense = Expense {
            id: Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            created_by: actor_id.to_string(),
            paid_by: draft.paid_by,
            description: draft.description.trim().to_string(),
            amount: validated.amount,
            currency: validated.currency.code.to_string(),
            split_type: validated.split_type,
            participants: validated.participants,
            splits: validated.splits,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            deleted_by: None,
        };
        self.storage.save_expense(expense.clone(), version).await?;

        info!(group_id, expense_id = %expense.id, split_type = %expense.split_type, "expense created");
        self.logging
            .log_action(
                EXPENSE_CREATED,
                json!({
                    "expense_id": expense.id,
                    "group_id": group_id,
                    "amount": expense.amount,
                    "currency": expense.currency,
                    "paid_by": expense.paid_by
                }),
                Some(actor_id),
            )
            .await?;
        Ok(expense)
    }

    pub async fn update_expense(
        &self,
        actor_id: &str,
        expense_id: &str,
        draft: ExpenseDraft,
    ) -> Result<Expense, SplitifydError> {
        let mut expense = self.live_expense(expense_id).await?;
        let Versioned { version, value: group } = self.load_versioned_group(&expense.group_id).await?;
        permissions::authorize(&group, actor_id, GroupAction::ExpenseEditing, Some(&expense.created_by))?;
        let validated = self.check_expense_draft(&group, &draft)?;

        expense.paid_by = draft.paid_by;
        expense.description = draft.description.trim().to_string();
        expense.amount = validated.amount;
        expense.currency = validated.currency.code.to_string();
        expense.split_type = validated.split_type;
        expense.participants = validated.participants;
        expense.splits = validated.splits;
        expense.updated_at = Utc::now();
        self.storage.save_expense(expense.clone(), version).await?;

        info!(group_id = %expense.group_id, expense_id, "expense updated");
        self.logging
            .log_action(
                EXPENSE_UPDATED,
                json!({ "expense_id": expense_id, "group_id": expense.group_id, "amount": expense.amount }),
                Some(actor_id),
            )
            .await?;
        Ok(expense)
    }

    /// Soft delete; the expense stops counting towards balances.
    pub async fn delete_expense(&self, actor_id: &str, expense_id: &str) -> Result<(), SplitifydError> {
        let mut expense = self.live_expense(expense_id).await?;
        let Versioned { version, value: group } = self.load_versioned_group(&expense.group_id).await?;
        permissions::authorize(&group, actor_id, GroupAction::ExpenseDeletion, Some(&expense.created_by))?;

        let now = Utc::now();
        expense.deleted_at = Some(now);
        expense.deleted_by = Some(actor_id.to_string());
        expense.updated_at = now;
        self.storage.save_expense(expense.clone(), version).await?;

        info!(group_id = %expense.group_id, expense_id, "expense deleted");
        self.logging
            .log_action(
                EXPENSE_DELETED,
                json!({ "expense_id": expense_id, "group_id": expense.group_id }),
                Some(actor_id),
            )
            .await?;
        Ok(())
    }

    pub async fn list_expenses(
        &self,
        actor_id: &str,
        group_id: &str,
        cursor: Option<&str>,
        limit: Option<&str>,
    ) -> Result<Page<Expense>, SplitifydError> {
        let group = self.load_group(group_id).await?;
        Self::require_member(&group, actor_id)?;
        let (cursor, limit) = self.list_params(cursor, limit)?;

        let rows = self
            .storage
            .query_expenses(group_id, &Self::list_query(cursor.as_ref(), limit))
            .await?;
        Ok(Page::from_overfetch(rows, limit, |e| {
            Cursor::new(timestamp_sort_value(&e.created_at), e.id.clone())
        }))
    }

    // Settlements

    fn check_settlement_draft(&self, group: &Group, draft: &SettlementDraft) -> Result<(), SplitifydError> {
        validate_settlement(draft.amount, &draft.currency, &draft.payer_id, &draft.payee_id)?;
        if let Some(note) = &draft.note {
            self.validate_text("note", note, MAX_NOTE_LENGTH)?;
        }
        Self::require_active_participants(group, [draft.payer_id.as_str(), draft.payee_id.as_str()])
    }

    /// Settlements may be changed by whoever recorded them, or by an admin.
    fn authorize_settlement_change(group: &Group, actor_id: &str, settlement: &Settlement) -> Result<(), SplitifydError> {
        Self::require_active_member(group, actor_id)?;
        let is_admin = group.member(actor_id).is_some_and(|m| m.is_active_admin());
        if settlement.created_by != actor_id && !is_admin {
            return Err(SplitifydError::NotAuthorized(format!(
                "only the creator or an admin may change settlement {}",
                settlement.id
            )));
        }
        Ok(())
    }

    pub async fn create_settlement(
        &self,
        actor_id: &str,
        group_id: &str,
        draft: SettlementDraft,
    ) -> Result<Settlement, SplitifydError> {
        let Versioned { version, value: group } = self.load_versioned_group(group_id).await?;
        Self::require_active_member(&group, actor_id)?;
        self.check_settlement_draft(&group, &draft)?;
        let rule = crate::core::currency::get_currency_rule(&draft.currency)?;

        let now = Utc::now();
        let settlement = Settlement {
            id: Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            created_by: actor_id.to_string(),
            payer_id: draft.payer_id,
            payee_id: draft.payee_id,
            amount: draft.amount,
            currency: rule.code.to_string(),
            note: draft.note,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            deleted_by: None,
        };
        self.storage.save_settlement(settlement.clone(), version).await?;

        info!(group_id, settlement_id = %settlement.id, "settlement created");
        self.logging
            .log_action(
                SETTLEMENT_CREATED,
                json!({
                    "settlement_id": settlement.id,
                    "group_id": group_id,
                    "payer_id": settlement.payer_id,
                    "payee_id": settlement.payee_id,
                    "amount": settlement.amount,
                    "currency": settlement.currency
                }),
                Some(actor_id),
            )
            .await?;
        Ok(settlement)
    }

    pub async fn update_settlement(
        &self,
        actor_id: &str,
        settlement_id: &str,
        draft: SettlementDraft,
    ) -> Result<Settlement, SplitifydError> {
        let mut settlement = self.live_settlement(settlement_id).await?;
        let Versioned { version, value: group } = self.load_versioned_group(&settlement.group_id).await?;
        Self::authorize_settlement_change(&group, actor_id, &settlement)?;
        self.check_settlement_draft(&group, &draft)?;
        let rule = crate::core::currency::get_currency_rule(&draft.currency)?;

        settlement.payer_id = draft.payer_id;
        settlement.payee_id = draft.payee_id;
        settlement.amount = draft.amount;
        settlement.currency = rule.code.to_string();
        settlement.note = draft.note;
        settlement.updated_at = Utc::now();
        self.storage.save_settlement(settlement.clone(), version).await?;

        info!(group_id = %settlement.group_id, settlement_id, "settlement updated");
        self.logging
            .log_action(
                SETTLEMENT_UPDATED,
                json!({ "settlement_id": settlement_id, "group_id": settlement.group_id, "amount": settlement.amount }),
                Some(actor_id),
            )
            .await?;
        Ok(settlement)
    }

    pub async fn delete_settlement(&self, actor_id: &str, settlement_id: &str) -> Result<(), SplitifydError> {
        let mut settlement = self.live_settlement(settlement_id).await?;
        let Versioned { version, value: group } = self.load_versioned_group(&settlement.group_id).await?;
        Self::authorize_settlement_change(&group, actor_id, &settlement)?;

        let now = Utc::now();
        settlement.deleted_at = Some(now);
        settlement.deleted_by = Some(actor_id.to_string());
        settlement.updated_at = now;
        self.storage.save_settlement(settlement.clone(), version).await?;

        info!(group_id = %settlement.group_id, settlement_id, "settlement deleted");
        self.logging
            .log_action(
                SETTLEMENT_DELETED,
                json!({ "settlement_id": settlement_id, "group_id": settlement.group_id }),
                Some(actor_id),
            )
            .await?;
        Ok(())
    }

    pub async fn list_settlements(
        &self,
        actor_id: &str,
        group_id: &str,
        cursor: Option<&str>,
        limit: Option<&str>,
    ) -> Result<Page<Settlement>, SplitifydError> {
        let group = self.load_group(group_id).await?;
        Self::require_member(&group, actor_id)?;
        let (cursor, limit) = self.list_params(cursor, limit)?;

        let rows = self
            .storage
            .query_settlements(group_id, &Self::list_query(cursor.as_ref(), limit))
            .await?;
        Ok(Page::from_overfetch(rows, limit, |s| {
            Cursor::new(timestamp_sort_value(&s.created_at), s.id.clone())
        }))
    }

    // Balances

    /// Recomputes balances from the ledger; nothing is cached or persisted.
    pub async fn get_group_balances(&self, actor_id: &str, group_id: &str) -> Result<GroupBalances, SplitifydError> {
        let (group, ledger) = futures::try_join!(self.load_group(group_id), self.storage.get_ledger(group_id))?;
        Self::require_member(&group, actor_id)?;

        let balances_by_currency = compute_balances(&ledger.expenses, &ledger.settlements)?;
        let simplified_debts = simplify_debts(&balances_by_currency);
        debug!(
            group_id,
            revision = ledger.revision,
            expenses = ledger.expenses.len(),
            settlements = ledger.settlements.len(),
            "balances computed"
        );

        Ok(GroupBalances {
            group_id: group_id.to_string(),
            balances_by_currency,
            simplified_debts,
        })
    }

    // Comments

    pub async fn add_comment(
        &self,
        actor_id: &str,
        group_id: &str,
        target: CommentTarget,
        text: &str,
    ) -> Result<Comment, SplitifydError> {
        let group = self.load_group(group_id).await?;
        Self::require_active_member(&group, actor_id)?;
        self.validate_text("text", text, MAX_COMMENT_LENGTH)?;
        if let CommentTarget::Expense(expense_id) = &target {
            let expense = self.live_expense(expense_id).await?;
            if expense.group_id != group_id {
                return Err(SplitifydError::ExpenseNotFound(expense_id.clone()));
            }
        }

        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            target,
            author_id: actor_id.to_string(),
            text: text.trim().to_string(),
            created_at: Utc::now(),
        };
        self.storage.save_comment(comment.clone()).await?;

        info!(group_id, comment_id = %comment.id, "comment added");
        self.logging
            .log_action(
                COMMENT_ADDED,
                json!({ "comment_id": comment.id, "group_id": group_id, "target": comment.target }),
                Some(actor_id),
            )
            .await?;
        Ok(comment)
    }

    /// Comments on an expense, located through the expense's group.
    pub async fn add_expense_comment(
        &self,
        actor_id: &str,
        expense_id: &str,
        text: &str,
    ) -> Result<Comment, SplitifydError> {
        let expense = self.live_expense(expense_id).await?;
        self.add_comment(actor_id, &expense.group_id, CommentTarget::Expense(expense.id), text)
            .await
    }

    pub async fn list_comments(
        &self,
        actor_id: &str,
        group_id: &str,
        target: &CommentTarget,
        cursor: Option<&str>,
        limit: Option<&str>,
    ) -> Result<Page<Comment>, SplitifydError> {
        let group = self.load_group(group_id).await?;
        Self::require_member(&group, actor_id)?;
        let (cursor, limit) = self.list_params(cursor, limit)?;

        let rows = self
            .storage
            .query_comments(group_id, target, &Self::list_query(cursor.as_ref(), limit))
            .await?;
        Ok(Page::from_overfetch(rows, limit, |c| {
            Cursor::new(timestamp_sort_value(&c.created_at), c.id.clone())
        }))
    }

    pub async fn list_expense_comments(
        &self,
        actor_id: &str,
        expense_id: &str,
        cursor: Option<&str>,
        limit: Option<&str>,
    ) -> Result<Page<Comment>, SplitifydError> {
        let expense = self.live_expense(expense_id).await?;
        let target = CommentTarget::Expense(expense.id.clone());
        self.list_comments(actor_id, &expense.group_id, &target, cursor, limit)
            .await
    }

    /// Every recorded action across all groups. Operator use only, never routed.
    pub async fn get_app_logs(&self) -> Result<Vec<AppLog>, SplitifydError> {
        self.logging.get_logs().await
    }

    /// Actions recorded against one group, readable by its members.
    pub async fn get_group_logs(&self, actor_id: &str, group_id: &str) -> Result<Vec<AppLog>, SplitifydError> {
        let group = self.load_group(group_id).await?;
        Self::require_member(&group, actor_id)?;
        let logs = self.logging.get_logs().await?;
        Ok(logs
            .into_iter()
            .filter(|log| log.details.get("group_id").and_then(|id| id.as_str()) == Some(group_id))
            .collect())
    }
}
