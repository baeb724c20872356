use utoipa::OpenApi;

use crate::{
    api::models::{
        AddCommentRequest, AddMemberRequest, CreateExpenseRequest, CreateGroupRequest, CreateSettlementRequest,
        ErrorResponse, SecurityPresetRequest, SetRoleRequest,
    },
    core::{
        balances::{GroupBalances, SimplifiedDebt},
        models::{
            audit::AppLog,
            comment::{Comment, CommentTarget},
            expense::{Expense, ExpenseDraft, ExpenseSplit, SplitType},
            group::{
                Group, GroupMember, GroupPermissions, MemberRole, MemberStatus, PartialGroupPermissions,
                PermissionChangeType, PermissionHistoryEntry, PermissionLevel, SecurityPreset,
            },
            settlement::{Settlement, SettlementDraft},
        },
        permissions::{ActionAccess, GroupSecurity, UserPermissions},
    },
};

#[derive(OpenApi)]
#[openapi(
    paths(
        super::handlers::create_group,
        super::handlers::get_group,
        super::handlers::add_member,
        super::handlers::approve_member,
        super::handlers::remove_member,
        super::handlers::set_member_role,
        super::handlers::get_member_permissions,
        super::handlers::apply_security_preset,
        super::handlers::update_group_permissions,
        super::handlers::get_group_permissions,
        super::handlers::get_permission_history,
        super::handlers::get_group_balances,
        super::handlers::list_group_expenses,
        super::handlers::list_group_settlements,
        super::handlers::list_group_comments,
        super::handlers::add_group_comment,
        super::handlers::create_expense,
        super::handlers::update_expense,
        super::handlers::delete_expense,
        super::handlers::list_expense_comments,
        super::handlers::add_expense_comment,
        super::handlers::create_settlement,
        super::handlers::update_settlement,
        super::handlers::delete_settlement,
        super::handlers::get_group_logs
    ),
    components(schemas(
        CreateGroupRequest,
        AddMemberRequest,
        SecurityPresetRequest,
        SetRoleRequest,
        CreateExpenseRequest,
        CreateSettlementRequest,
        AddCommentRequest,
        ErrorResponse,
        Group,
        GroupMember,
        MemberRole,
        MemberStatus,
        PermissionLevel,
        SecurityPreset,
        GroupPermissions,
        PartialGroupPermissions,
        PermissionChangeType,
        PermissionHistoryEntry,
        GroupSecurity,
        UserPermissions,
        ActionAccess,
        Expense,
        ExpenseDraft,
        ExpenseSplit,
        SplitType,
        Settlement,
        SettlementDraft,
        Comment,
        CommentTarget,
        GroupBalances,
        SimplifiedDebt,
        AppLog
    )),
    info(
        title = "Splitifyd API",
        description = "Group expense splitting: validated splits, group permissions, balances and paginated lists",
        version = "0.1.0"
    )
)]
pub struct ApiDoc;
