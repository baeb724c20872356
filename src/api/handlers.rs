use crate::{
    api::models::*,
    auth::jwt::Claims,
    core::{
        balances::GroupBalances,
        errors::SplitifydError,
        models::{
            audit::AppLog,
            comment::{Comment, CommentTarget},
            expense::{Expense, ExpenseDraft},
            group::{Group, GroupMember, PartialGroupPermissions, PermissionHistoryEntry},
            settlement::{Settlement, SettlementDraft},
        },
        pagination::Page,
        permissions::{GroupSecurity, UserPermissions},
        services::SplitifydService,
    },
    infrastructure::{
        cache::in_memory::InMemoryCache, logging::in_memory::InMemoryLogging, storage::in_memory::InMemoryStorage,
    },
};
use axum::{
    Extension, Json, Router,
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::IntoResponse,
    routing::{get, post, put},
};
use http::header;

use std::sync::Arc;

pub type AppService = SplitifydService<InMemoryLogging, InMemoryStorage, InMemoryCache>;

// Middleware to validate the bearer token and expose its claims to handlers
async fn auth_middleware(
    State(service): State<Arc<AppService>>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| SplitifydError::Unauthenticated("Missing Authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| SplitifydError::Unauthenticated("Invalid Authorization header".to_string()))?;

    let claims = service.validate_token(token)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

pub fn api_routes(service: Arc<AppService>) -> Router {
    Router::new()
        .route("/groups", post(create_group))
        .route("/groups/{group_id}", get(get_group))
        .route("/groups/{group_id}/members", post(add_member))
        .route("/groups/{group_id}/members/{user_id}", axum::routing::delete(remove_member))
        .route("/groups/{group_id}/members/{user_id}/approve", post(approve_member))
        .route("/groups/{group_id}/members/{user_id}/role", put(set_member_role))
        .route("/groups/{group_id}/members/{user_id}/permissions", get(get_member_permissions))
        .route("/groups/{group_id}/security-preset", put(apply_security_preset))
        .route(
            "/groups/{group_id}/permissions",
            get(get_group_permissions).put(update_group_permissions),
        )
        .route("/groups/{group_id}/permissions/history", get(get_permission_history))
        .route("/groups/{group_id}/balances", get(get_group_balances))
        .route("/groups/{group_id}/logs", get(get_group_logs))
        .route("/groups/{group_id}/expenses", get(list_group_expenses))
        .route("/groups/{group_id}/settlements", get(list_group_settlements))
        .route(
            "/groups/{group_id}/comments",
            get(list_group_comments).post(add_group_comment),
        )
        .route("/expenses", post(create_expense))
        .route("/expenses/{expense_id}", put(update_expense).delete(delete_expense))
        .route(
            "/expenses/{expense_id}/comments",
            get(list_expense_comments).post(add_expense_comment),
        )
        .route("/settlements", post(create_settlement))
        .route(
            "/settlements/{settlement_id}",
            put(update_settlement).delete(delete_settlement),
        )
        .route_layer(middleware::from_fn_with_state(service.clone(), auth_middleware))
        .with_state(service)
}

#[utoipa::path(
    post,
    path = "/api/groups",
    request_body = CreateGroupRequest,
    responses(
        (status = 201, description = "Group created, caller is its admin", body = Group),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn create_group(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<Group>), ApiError> {
    let group = service.create_group(&claims.sub, &req.name).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

#[utoipa::path(
    get,
    path = "/api/groups/{group_id}",
    params(("group_id" = String, Path, description = "Group ID")),
    responses(
        (status = 200, description = "Group", body = Group),
        (status = 403, description = "Not a group member", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn get_group(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<String>,
) -> Result<Json<Group>, ApiError> {
    Ok(Json(service.get_group(&claims.sub, &group_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/groups/{group_id}/members",
    request_body = AddMemberRequest,
    params(("group_id" = String, Path, description = "Group ID")),
    responses(
        (status = 201, description = "Member added, possibly pending approval", body = GroupMember),
        (status = 400, description = "Already a member", body = ErrorResponse),
        (status = 403, description = "Not allowed to invite", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn add_member(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<String>,
    Json(req): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<GroupMember>), ApiError> {
    let member = service.add_member(&claims.sub, &group_id, &req.user_id).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

#[utoipa::path(
    post,
    path = "/api/groups/{group_id}/members/{user_id}/approve",
    params(
        ("group_id" = String, Path, description = "Group ID"),
        ("user_id" = String, Path, description = "Pending member")
    ),
    responses(
        (status = 200, description = "Member approved", body = GroupMember),
        (status = 400, description = "Member is not pending", body = ErrorResponse),
        (status = 403, description = "Not allowed to approve", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn approve_member(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path((group_id, user_id)): Path<(String, String)>,
) -> Result<Json<GroupMember>, ApiError> {
    Ok(Json(service.approve_member(&claims.sub, &group_id, &user_id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/groups/{group_id}/members/{user_id}",
    params(
        ("group_id" = String, Path, description = "Group ID"),
        ("user_id" = String, Path, description = "Member to remove")
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 400, description = "Last admin or outstanding balance", body = ErrorResponse),
        (status = 403, description = "Not allowed to remove", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn remove_member(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path((group_id, user_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    service.remove_member(&claims.sub, &group_id, &user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/api/groups/{group_id}/members/{user_id}/role",
    request_body = SetRoleRequest,
    params(
        ("group_id" = String, Path, description = "Group ID"),
        ("user_id" = String, Path, description = "Member whose role changes")
    ),
    responses(
        (status = 200, description = "Role changed", body = GroupMember),
        (status = 400, description = "Would leave the group without an admin", body = ErrorResponse),
        (status = 403, description = "Not an admin", body = ErrorResponse),
        (status = 409, description = "Concurrent update, retry", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn set_member_role(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path((group_id, user_id)): Path<(String, String)>,
    Json(req): Json<SetRoleRequest>,
) -> Result<Json<GroupMember>, ApiError> {
    Ok(Json(
        service.set_member_role(&claims.sub, &group_id, &user_id, req.role).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/groups/{group_id}/members/{user_id}/permissions",
    params(
        ("group_id" = String, Path, description = "Group ID"),
        ("user_id" = String, Path, description = "Member to inspect")
    ),
    responses(
        (status = 200, description = "Effective permissions", body = UserPermissions),
        (status = 403, description = "Caller or target is not a member", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn get_member_permissions(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path((group_id, user_id)): Path<(String, String)>,
) -> Result<Json<UserPermissions>, ApiError> {
    let own = service.get_user_permissions(&group_id, &claims.sub).await?;
    if user_id == claims.sub {
        return Ok(Json(own));
    }
    Ok(Json(service.get_user_permissions(&group_id, &user_id).await?))
}

#[utoipa::path(
    put,
    path = "/api/groups/{group_id}/security-preset",
    request_body = SecurityPresetRequest,
    params(("group_id" = String, Path, description = "Group ID")),
    responses(
        (status = 200, description = "Preset applied", body = GroupSecurity),
        (status = 400, description = "Preset is not assignable", body = ErrorResponse),
        (status = 403, description = "Not an admin", body = ErrorResponse),
        (status = 409, description = "Concurrent update, retry", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn apply_security_preset(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<String>,
    Json(req): Json<SecurityPresetRequest>,
) -> Result<Json<GroupSecurity>, ApiError> {
    Ok(Json(
        service.apply_security_preset(&claims.sub, &group_id, req.preset).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/groups/{group_id}/permissions",
    request_body = PartialGroupPermissions,
    params(("group_id" = String, Path, description = "Group ID")),
    responses(
        (status = 200, description = "Permissions updated, preset is now custom", body = GroupSecurity),
        (status = 400, description = "Empty update", body = ErrorResponse),
        (status = 403, description = "Settings management not allowed", body = ErrorResponse),
        (status = 409, description = "Concurrent update, retry", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn update_group_permissions(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<String>,
    Json(changes): Json<PartialGroupPermissions>,
) -> Result<Json<GroupSecurity>, ApiError> {
    Ok(Json(
        service.update_group_permissions(&claims.sub, &group_id, &changes).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/groups/{group_id}/permissions",
    params(("group_id" = String, Path, description = "Group ID")),
    responses(
        (status = 200, description = "Preset and per-action permissions", body = GroupSecurity),
        (status = 403, description = "Not a group member", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn get_group_permissions(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<String>,
) -> Result<Json<GroupSecurity>, ApiError> {
    Ok(Json(service.get_group_permissions(&claims.sub, &group_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/groups/{group_id}/permissions/history",
    params(("group_id" = String, Path, description = "Group ID")),
    responses(
        (status = 200, description = "Permission changes, oldest first", body = [PermissionHistoryEntry]),
        (status = 403, description = "Not a group member", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn get_permission_history(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<String>,
) -> Result<Json<Vec<PermissionHistoryEntry>>, ApiError> {
    Ok(Json(service.get_permission_history(&claims.sub, &group_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/groups/{group_id}/balances",
    params(("group_id" = String, Path, description = "Group ID")),
    responses(
        (status = 200, description = "Net balances per currency and simplified debts", body = GroupBalances),
        (status = 403, description = "Not a group member", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn get_group_balances(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<String>,
) -> Result<Json<GroupBalances>, ApiError> {
    Ok(Json(service.get_group_balances(&claims.sub, &group_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/groups/{group_id}/expenses",
    params(("group_id" = String, Path, description = "Group ID"), ListParams),
    responses(
        (status = 200, description = "Page of expenses, newest first", body = Page<Expense>),
        (status = 400, description = "Bad cursor or limit", body = ErrorResponse),
        (status = 403, description = "Not a group member", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn list_group_expenses(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<Expense>>, ApiError> {
    let page = service
        .list_expenses(&claims.sub, &group_id, params.cursor.as_deref(), params.limit.as_deref())
        .await?;
    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/api/groups/{group_id}/settlements",
    params(("group_id" = String, Path, description = "Group ID"), ListParams),
    responses(
        (status = 200, description = "Page of settlements, newest first", body = Page<Settlement>),
        (status = 400, description = "Bad cursor or limit", body = ErrorResponse),
        (status = 403, description = "Not a group member", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn list_group_settlements(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<Settlement>>, ApiError> {
    let page = service
        .list_settlements(&claims.sub, &group_id, params.cursor.as_deref(), params.limit.as_deref())
        .await?;
    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/api/groups/{group_id}/comments",
    params(("group_id" = String, Path, description = "Group ID"), ListParams),
    responses(
        (status = 200, description = "Page of group comments, newest first", body = Page<Comment>),
        (status = 400, description = "Bad cursor or limit", body = ErrorResponse),
        (status = 403, description = "Not a group member", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn list_group_comments(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<Comment>>, ApiError> {
    let page = service
        .list_comments(
            &claims.sub,
            &group_id,
            &CommentTarget::Group,
            params.cursor.as_deref(),
            params.limit.as_deref(),
        )
        .await?;
    Ok(Json(page))
}

#[utoipa::path(
    post,
    path = "/api/groups/{group_id}/comments",
    request_body = AddCommentRequest,
    params(("group_id" = String, Path, description = "Group ID")),
    responses(
        (status = 201, description = "Comment added", body = Comment),
        (status = 400, description = "Empty or too long", body = ErrorResponse),
        (status = 403, description = "Not an active member", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn add_group_comment(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<String>,
    Json(req): Json<AddCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let comment = service
        .add_comment(&claims.sub, &group_id, CommentTarget::Group, &req.text)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[utoipa::path(
    post,
    path = "/api/expenses",
    request_body = CreateExpenseRequest,
    responses(
        (status = 201, description = "Expense created", body = Expense),
        (status = 400, description = "Validation failed; see code", body = ErrorResponse),
        (status = 403, description = "Not an active member", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn create_expense(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateExpenseRequest>,
) -> Result<(StatusCode, Json<Expense>), ApiError> {
    let expense = service.create_expense(&claims.sub, &req.group_id, req.expense).await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

#[utoipa::path(
    put,
    path = "/api/expenses/{expense_id}",
    request_body = ExpenseDraft,
    params(("expense_id" = String, Path, description = "Expense ID")),
    responses(
        (status = 200, description = "Expense updated", body = Expense),
        (status = 400, description = "Validation failed; see code", body = ErrorResponse),
        (status = 403, description = "Editing not allowed", body = ErrorResponse),
        (status = 404, description = "Expense not found", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn update_expense(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(expense_id): Path<String>,
    Json(draft): Json<ExpenseDraft>,
) -> Result<Json<Expense>, ApiError> {
    Ok(Json(service.update_expense(&claims.sub, &expense_id, draft).await?))
}

#[utoipa::path(
    delete,
    path = "/api/expenses/{expense_id}",
    params(("expense_id" = String, Path, description = "Expense ID")),
    responses(
        (status = 204, description = "Expense deleted"),
        (status = 403, description = "Deletion not allowed", body = ErrorResponse),
        (status = 404, description = "Expense not found", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn delete_expense(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(expense_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    service.delete_expense(&claims.sub, &expense_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/expenses/{expense_id}/comments",
    params(("expense_id" = String, Path, description = "Expense ID"), ListParams),
    responses(
        (status = 200, description = "Page of expense comments, newest first", body = Page<Comment>),
        (status = 400, description = "Bad cursor or limit", body = ErrorResponse),
        (status = 404, description = "Expense not found", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn list_expense_comments(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(expense_id): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<Comment>>, ApiError> {
    let page = service
        .list_expense_comments(&claims.sub, &expense_id, params.cursor.as_deref(), params.limit.as_deref())
        .await?;
    Ok(Json(page))
}

#[utoipa::path(
    post,
    path = "/api/expenses/{expense_id}/comments",
    request_body = AddCommentRequest,
    params(("expense_id" = String, Path, description = "Expense ID")),
    responses(
        (status = 201, description = "Comment added", body = Comment),
        (status = 400, description = "Empty or too long", body = ErrorResponse),
        (status = 404, description = "Expense not found", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn add_expense_comment(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(expense_id): Path<String>,
    Json(req): Json<AddCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let comment = service.add_expense_comment(&claims.sub, &expense_id, &req.text).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[utoipa::path(
    post,
    path = "/api/settlements",
    request_body = CreateSettlementRequest,
    responses(
        (status = 201, description = "Settlement recorded", body = Settlement),
        (status = 400, description = "Validation failed; see code", body = ErrorResponse),
        (status = 403, description = "Not an active member", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn create_settlement(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateSettlementRequest>,
) -> Result<(StatusCode, Json<Settlement>), ApiError> {
    let settlement = service
        .create_settlement(&claims.sub, &req.group_id, req.settlement)
        .await?;
    Ok((StatusCode::CREATED, Json(settlement)))
}

#[utoipa::path(
    put,
    path = "/api/settlements/{settlement_id}",
    request_body = SettlementDraft,
    params(("settlement_id" = String, Path, description = "Settlement ID")),
    responses(
        (status = 200, description = "Settlement updated", body = Settlement),
        (status = 400, description = "Validation failed; see code", body = ErrorResponse),
        (status = 403, description = "Only the creator or an admin", body = ErrorResponse),
        (status = 404, description = "Settlement not found", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn update_settlement(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(settlement_id): Path<String>,
    Json(draft): Json<SettlementDraft>,
) -> Result<Json<Settlement>, ApiError> {
    Ok(Json(
        service.update_settlement(&claims.sub, &settlement_id, draft).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/settlements/{settlement_id}",
    params(("settlement_id" = String, Path, description = "Settlement ID")),
    responses(
        (status = 204, description = "Settlement deleted"),
        (status = 403, description = "Only the creator or an admin", body = ErrorResponse),
        (status = 404, description = "Settlement not found", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn delete_settlement(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(settlement_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    service.delete_settlement(&claims.sub, &settlement_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/groups/{group_id}/logs",
    params(("group_id" = String, Path, description = "Group ID")),
    responses(
        (status = 200, description = "Actions recorded against the group", body = [AppLog]),
        (status = 403, description = "Not a member", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn get_group_logs(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<String>,
) -> Result<Json<Vec<AppLog>>, ApiError> {
    Ok(Json(service.get_group_logs(&claims.sub, &group_id).await?))
}
