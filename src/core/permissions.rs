//! Group permission rules.
//!
//! Everything here is pure: it reads or mutates a `Group` value and never touches
//! storage. The service wraps these in a store transaction and takes care of the
//! history log and cache invalidation.

use crate::core::errors::SplitifydError;
use crate::core::models::group::{
    Group, GroupAction, GroupPermissions, MemberRole, MemberStatus, PartialGroupPermissions, PermissionLevel,
    SecurityPreset,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

/// Who is asking. System callers (scheduled jobs, triggers) satisfy `automatic`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Actor<'a> {
    User(&'a str),
    System,
}

/// How far an action reaches for a given member.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActionAccess {
    None,
    Own,
    Any,
}

/// Effective permissions of one member, as cached per (group, user).
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserPermissions {
    pub group_id: String,
    pub user_id: String,
    pub role: MemberRole,
    pub status: MemberStatus,
    pub expense_editing: ActionAccess,
    pub expense_deletion: ActionAccess,
    pub can_invite_members: bool,
    pub can_approve_members: bool,
    pub can_manage_settings: bool,
    pub can_change_roles: bool,
}

impl UserPermissions {
    /// Decides `action` on a resource created by `resource_owner` (if any).
    pub fn allows(&self, action: GroupAction, resource_owner: Option<&str>) -> bool {
        let access = match action {
            GroupAction::ExpenseEditing => self.expense_editing,
            GroupAction::ExpenseDeletion => self.expense_deletion,
            GroupAction::MemberInvitation => bool_access(self.can_invite_members),
            GroupAction::MemberApproval => bool_access(self.can_approve_members),
            GroupAction::SettingsManagement => bool_access(self.can_manage_settings),
        };
        match access {
            ActionAccess::Any => true,
            ActionAccess::Own => resource_owner == Some(self.user_id.as_str()),
            ActionAccess::None => false,
        }
    }
}

/// Group-wide permission settings, as cached per group.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroupSecurity {
    pub group_id: String,
    pub security_preset: SecurityPreset,
    pub permissions: GroupPermissions,
}

impl GroupSecurity {
    pub fn of(group: &Group) -> Self {
        GroupSecurity {
            group_id: group.id.clone(),
            security_preset: group.security_preset,
            permissions: group.permissions,
        }
    }
}

fn bool_access(allowed: bool) -> ActionAccess {
    if allowed { ActionAccess::Any } else { ActionAccess::None }
}

fn level_access(level: PermissionLevel, role: MemberRole, active: bool) -> ActionAccess {
    if !active {
        return ActionAccess::None;
    }
    match (level, role) {
        (PermissionLevel::Automatic, _) => ActionAccess::None,
        (PermissionLevel::Anyone, _) | (_, MemberRole::Admin) => ActionAccess::Any,
        (PermissionLevel::OwnerAndAdmin, MemberRole::Member) => ActionAccess::Own,
        (PermissionLevel::AdminOnly, MemberRole::Member) => ActionAccess::None,
    }
}

/// Pure permission check against the group's current settings.
pub fn check_permission(group: &Group, actor: Actor<'_>, action: GroupAction, resource_owner: Option<&str>) -> bool {
    let user_id = match actor {
        Actor::System => return true,
        Actor::User(user_id) => user_id,
    };
    let Some(member) = group.member(user_id) else {
        return false;
    };
    match level_access(group.permissions.level_for(action), member.role, member.is_active()) {
        ActionAccess::Any => true,
        ActionAccess::Own => resource_owner == Some(user_id),
        ActionAccess::None => false,
    }
}

/// Like [`check_permission`] but explains a refusal.
pub fn authorize(
    group: &Group,
    user_id: &str,
    action: GroupAction,
    resource_owner: Option<&str>,
) -> Result<(), SplitifydError> {
    if group.member(user_id).is_none() {
        return Err(SplitifydError::NotMember(user_id.to_string()));
    }
    if !check_permission(group, Actor::User(user_id), action, resource_owner) {
        return Err(SplitifydError::NotAuthorized(format!(
            "user {} may not perform {:?} in group {}",
            user_id, action, group.id
        )));
    }
    Ok(())
}

/// Computes a member's effective permissions. Fails with `NotMember` for strangers.
pub fn user_permissions(group: &Group, user_id: &str) -> Result<UserPermissions, SplitifydError> {
    let member = group
        .member(user_id)
        .ok_or_else(|| SplitifydError::NotMember(user_id.to_string()))?;
    let active = member.is_active();
    let access = |action| level_access(group.permissions.level_for(action), member.role, active);

    Ok(UserPermissions {
        group_id: group.id.clone(),
        user_id: user_id.to_string(),
        role: member.role,
        status: member.status,
        expense_editing: access(GroupAction::ExpenseEditing),
        expense_deletion: access(GroupAction::ExpenseDeletion),
        can_invite_members: access(GroupAction::MemberInvitation) == ActionAccess::Any,
        can_approve_members: access(GroupAction::MemberApproval) == ActionAccess::Any,
        can_manage_settings: access(GroupAction::SettingsManagement) == ActionAccess::Any,
        can_change_roles: member.is_active_admin(),
    })
}

/// Replaces the group's permissions with a preset bundle. Returns the change record.
pub fn apply_security_preset(
    group: &mut Group,
    actor_id: &str,
    preset: SecurityPreset,
) -> Result<serde_json::Value, SplitifydError> {
    if !group.member(actor_id).is_some_and(|m| m.is_active_admin()) {
        return Err(SplitifydError::NotAuthorized(
            "only admins can apply a security preset".to_string(),
        ));
    }
    let permissions = preset.defaults().ok_or_else(|| {
        SplitifydError::InvalidRequest("custom is not an assignable security preset".to_string())
    })?;

    let previous = group.security_preset;
    group.security_preset = preset;
    group.permissions = permissions;
    Ok(json!({
        "previousPreset": previous,
        "preset": preset,
        "permissions": permissions,
    }))
}

/// Merges `changes` over the current permissions and marks the group `custom`.
///
/// The actor is checked against `settings_management` as it stands before the update.
pub fn apply_permission_update(
    group: &mut Group,
    actor_id: &str,
    changes: &PartialGroupPermissions,
) -> Result<serde_json::Value, SplitifydError> {
    if !check_permission(group, Actor::User(actor_id), GroupAction::SettingsManagement, None) {
        return Err(SplitifydError::NotAuthorized(
            "settings management permission required".to_string(),
        ));
    }
    if changes.is_empty() {
        return Err(SplitifydError::InvalidRequest("no permission changes supplied".to_string()));
    }

    let previous: GroupPermissions = group.permissions;
    group.permissions = previous.merge(changes);
    group.security_preset = SecurityPreset::Custom;
    Ok(json!({
        "previous": previous,
        "changes": changes,
    }))
}

/// Validates a role change without applying it.
///
/// Refusing to strip the last active admin is an `InvalidRequest`; every other
/// refusal is `NotAuthorized`.
pub fn can_change_role(
    group: &Group,
    actor_id: &str,
    target_id: &str,
    new_role: MemberRole,
) -> Result<(), SplitifydError> {
    if !group.member(actor_id).is_some_and(|m| m.is_active_admin()) {
        return Err(SplitifydError::NotAuthorized(
            "only admins can change member roles".to_string(),
        ));
    }
    let target = group.member(target_id).ok_or_else(|| {
        SplitifydError::InvalidRequest(format!("user {} is not a member of this group", target_id))
    })?;
    if target.is_active_admin() && new_role != MemberRole::Admin && group.active_admin_count() <= 1 {
        return Err(SplitifydError::InvalidRequest(
            "cannot change role of the last admin".to_string(),
        ));
    }
    Ok(())
}

pub fn apply_role_change(
    group: &mut Group,
    actor_id: &str,
    target_id: &str,
    new_role: MemberRole,
    now: DateTime<Utc>,
) -> Result<serde_json::Value, SplitifydError> {
    can_change_role(group, actor_id, target_id, new_role)?;
    let member = group
        .members
        .get_mut(target_id)
        .ok_or_else(|| SplitifydError::InvalidRequest(format!("user {} is not a member", target_id)))?;
    let previous = member.role;
    member.role = new_role;
    member.last_permission_change = now;
    Ok(json!({
        "userId": target_id,
        "previousRole": previous,
        "role": new_role,
    }))
}

/// Members may leave on their own; admins may remove others. The last active
/// admin cannot go while other members remain.
pub fn can_remove_member(group: &Group, actor_id: &str, target_id: &str) -> Result<(), SplitifydError> {
    let target = group.member(target_id).ok_or_else(|| {
        SplitifydError::InvalidRequest(format!("user {} is not a member of this group", target_id))
    })?;
    if actor_id != target_id && !group.member(actor_id).is_some_and(|m| m.is_active_admin()) {
        return Err(SplitifydError::NotAuthorized(
            "only admins can remove other members".to_string(),
        ));
    }
    if target.is_active_admin() && group.active_admin_count() <= 1 && group.members.len() > 1 {
        return Err(SplitifydError::InvalidRequest(
            "cannot remove the last admin while other members remain".to_string(),
        ));
    }
    Ok(())
}

/// Status for a newly invited member, from the group's approval setting.
pub fn initial_member_status(group: &Group) -> MemberStatus {
    match group.permissions.member_approval {
        PermissionLevel::AdminOnly | PermissionLevel::OwnerAndAdmin => MemberStatus::Pending,
        PermissionLevel::Anyone | PermissionLevel::Automatic => MemberStatus::Active,
    }
}
