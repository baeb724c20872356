use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    Member,
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MemberRole::Admin => "admin",
            MemberRole::Member => "member",
        };
        write!(f, "{}", s)
    }
}

/// Pending members wait for approval and hold no permissions yet.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Active,
    Pending,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub user_id: String,
    pub role: MemberRole,
    pub status: MemberStatus,
    #[schema(value_type = String, example = "2024-06-01T12:34:56Z")]
    pub joined_at: DateTime<Utc>,
    #[schema(value_type = String, example = "2024-06-01T12:34:56Z")]
    pub last_permission_change: DateTime<Utc>,
}

impl GroupMember {
    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }

    pub fn is_active_admin(&self) -> bool {
        self.is_active() && self.role == MemberRole::Admin
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionLevel {
    Anyone,
    /// Admins, or the member who created the resource.
    OwnerAndAdmin,
    AdminOnly,
    /// Performed by the system; never granted to a user directly.
    Automatic,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SecurityPreset {
    Open,
    Managed,
    Custom,
}

impl SecurityPreset {
    /// Permission bundle for an assignable preset. `Custom` has none.
    pub fn defaults(self) -> Option<GroupPermissions> {
        match self {
            SecurityPreset::Open => Some(GroupPermissions {
                expense_editing: PermissionLevel::Anyone,
                expense_deletion: PermissionLevel::Anyone,
                member_invitation: PermissionLevel::Anyone,
                member_approval: PermissionLevel::Automatic,
                settings_management: PermissionLevel::Anyone,
            }),
            SecurityPreset::Managed => Some(GroupPermissions {
                expense_editing: PermissionLevel::OwnerAndAdmin,
                expense_deletion: PermissionLevel::OwnerAndAdmin,
                member_invitation: PermissionLevel::AdminOnly,
                member_approval: PermissionLevel::AdminOnly,
                settings_management: PermissionLevel::AdminOnly,
            }),
            SecurityPreset::Custom => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroupPermissions {
    pub expense_editing: PermissionLevel,
    pub expense_deletion: PermissionLevel,
    pub member_invitation: PermissionLevel,
    pub member_approval: PermissionLevel,
    pub settings_management: PermissionLevel,
}

impl GroupPermissions {
    pub fn level_for(&self, action: GroupAction) -> PermissionLevel {
        match action {
            GroupAction::ExpenseEditing => self.expense_editing,
            GroupAction::ExpenseDeletion => self.expense_deletion,
            GroupAction::MemberInvitation => self.member_invitation,
            GroupAction::MemberApproval => self.member_approval,
            GroupAction::SettingsManagement => self.settings_management,
        }
    }

    /// Overlays the fields present in `changes`.
    pub fn merge(&self, changes: &PartialGroupPermissions) -> GroupPermissions {
        GroupPermissions {
            expense_editing: changes.expense_editing.unwrap_or(self.expense_editing),
            expense_deletion: changes.expense_deletion.unwrap_or(self.expense_deletion),
            member_invitation: changes.member_invitation.unwrap_or(self.member_invitation),
            member_approval: changes.member_approval.unwrap_or(self.member_approval),
            settings_management: changes.settings_management.unwrap_or(self.settings_management),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PartialGroupPermissions {
    pub expense_editing: Option<PermissionLevel>,
    pub expense_deletion: Option<PermissionLevel>,
    pub member_invitation: Option<PermissionLevel>,
    pub member_approval: Option<PermissionLevel>,
    pub settings_management: Option<PermissionLevel>,
}

impl PartialGroupPermissions {
    pub fn is_empty(&self) -> bool {
        *self == PartialGroupPermissions::default()
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum GroupAction {
    ExpenseEditing,
    ExpenseDeletion,
    MemberInvitation,
    MemberApproval,
    SettingsManagement,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PermissionChangeType {
    Preset,
    Custom,
    Role,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionHistoryEntry {
    pub sequence: u64,
    #[schema(value_type = String, example = "2024-06-01T12:34:56Z")]
    pub timestamp: DateTime<Utc>,
    pub changed_by: String,
    pub change_type: PermissionChangeType,
    #[schema(value_type = Object)]
    pub changes: serde_json::Value,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    pub created_by: String,
    pub members: BTreeMap<String, GroupMember>,
    pub security_preset: SecurityPreset,
    pub permissions: GroupPermissions,
    #[schema(value_type = String, example = "2024-06-01T12:34:56Z")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, example = "2024-06-01T12:34:56Z")]
    pub updated_at: DateTime<Utc>,
}

impl Group {
    pub fn member(&self, user_id: &str) -> Option<&GroupMember> {
        self.members.get(user_id)
    }

    pub fn active_member(&self, user_id: &str) -> Option<&GroupMember> {
        self.members.get(user_id).filter(|m| m.is_active())
    }

    pub fn active_admin_count(&self) -> usize {
        self.members.values().filter(|m| m.is_active_admin()).count()
    }
}
