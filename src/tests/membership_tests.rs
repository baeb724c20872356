use super::{create_test_service, equal_draft, open_group, settlement_draft};
use crate::constants::{GROUP_CREATED, MAX_GROUP_NAME_LENGTH, MAX_USER_ID_LENGTH, MEMBER_REMOVED};
use crate::core::errors::SplitifydError;
use crate::core::models::group::{MemberRole, MemberStatus, SecurityPreset};
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_create_group_makes_creator_sole_admin() {
    let service = create_test_service();
    let group = service.create_group("alice", "  Flat 4B  ").await.unwrap();

    assert_eq!(group.name, "Flat 4B");
    assert_eq!(group.security_preset, SecurityPreset::Open);
    assert_eq!(group.members.len(), 1);
    let alice = group.member("alice").unwrap();
    assert_eq!(alice.role, MemberRole::Admin);
    assert_eq!(alice.status, MemberStatus::Active);

    let logs = service.get_app_logs().await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action, GROUP_CREATED);
}

#[tokio::test]
async fn test_create_group_rejects_blank_name() {
    let service = create_test_service();
    let result = service.create_group("alice", "   ").await;
    assert!(matches!(result, Err(SplitifydError::InvalidInput(field, _)) if field == "name"));
}

#[tokio::test]
async fn test_user_ids_have_their_own_length_limit() {
    let service = create_test_service();
    let long_id = "u".repeat(MAX_USER_ID_LENGTH);
    let too_long = "u".repeat(MAX_USER_ID_LENGTH + 1);

    assert!(long_id.len() > MAX_GROUP_NAME_LENGTH);
    let group = service.create_group(&long_id, "Flat").await.unwrap();
    assert!(group.member(&long_id).is_some());
    service.add_member(&long_id, &group.id, &long_id.replace('u', "v")).await.unwrap();

    let result = service.create_group(&too_long, "Flat").await;
    assert!(matches!(result, Err(SplitifydError::InvalidInput(field, _)) if field == "creatorId"));
    let result = service.add_member(&long_id, &group.id, &too_long).await;
    assert!(matches!(result, Err(SplitifydError::InvalidInput(field, _)) if field == "userId"));
}

#[tokio::test]
async fn test_open_group_members_join_active() {
    let service = create_test_service();
    let group = open_group(&service, "alice", &["bob"]).await;

    // Anyone may invite in an open group.
    let carol = service.add_member("bob", &group.id, "carol").await.unwrap();
    assert_eq!(carol.status, MemberStatus::Active);
    assert_eq!(carol.role, MemberRole::Member);

    let duplicate = service.add_member("alice", &group.id, "carol").await;
    assert!(matches!(duplicate, Err(SplitifydError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_managed_group_invites_need_admin_and_approval() {
    let service = create_test_service();
    let group = open_group(&service, "admin", &["bob"]).await;
    service
        .apply_security_preset("admin", &group.id, SecurityPreset::Managed)
        .await
        .unwrap();

    let result = service.add_member("bob", &group.id, "carol").await;
    assert!(matches!(result, Err(SplitifydError::NotAuthorized(_))));

    let carol = service.add_member("admin", &group.id, "carol").await.unwrap();
    assert_eq!(carol.status, MemberStatus::Pending);

    // Pending members hold no permissions yet.
    let result = service
        .create_expense("carol", &group.id, equal_draft("carol", dec!(10), "USD", &["carol", "bob"]))
        .await;
    assert!(matches!(result, Err(SplitifydError::NotAuthorized(_))));
    let permissions = service.get_user_permissions(&group.id, "carol").await.unwrap();
    assert!(!permissions.can_invite_members);

    let result = service.approve_member("bob", &group.id, "carol").await;
    assert!(matches!(result, Err(SplitifydError::NotAuthorized(_))));

    let carol = service.approve_member("admin", &group.id, "carol").await.unwrap();
    assert_eq!(carol.status, MemberStatus::Active);

    // The approval invalidated the cached pending view.
    let permissions = service.get_user_permissions(&group.id, "carol").await.unwrap();
    assert_eq!(permissions.status, MemberStatus::Active);

    let again = service.approve_member("admin", &group.id, "carol").await;
    assert!(matches!(again, Err(SplitifydError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_member_can_leave_but_not_remove_others() {
    let service = create_test_service();
    let group = open_group(&service, "admin", &["bob", "carol"]).await;

    let result = service.remove_member("bob", &group.id, "carol").await;
    assert!(matches!(result, Err(SplitifydError::NotAuthorized(_))));

    service.remove_member("bob", &group.id, "bob").await.unwrap();
    service.remove_member("admin", &group.id, "carol").await.unwrap();

    let group = service.get_group("admin", &group.id).await.unwrap();
    assert_eq!(group.members.len(), 1);
    let removed = service.get_user_permissions(&group.id, "bob").await;
    assert!(matches!(removed, Err(SplitifydError::NotMember(_))));

    let logs = service.get_app_logs().await.unwrap();
    assert_eq!(logs.iter().filter(|log| log.action == MEMBER_REMOVED).count(), 2);
}

#[tokio::test]
async fn test_last_admin_cannot_leave_while_members_remain() {
    let service = create_test_service();
    let group = open_group(&service, "admin", &["bob"]).await;

    let result = service.remove_member("admin", &group.id, "admin").await;
    assert!(matches!(result, Err(SplitifydError::InvalidRequest(_))));

    service.remove_member("bob", &group.id, "bob").await.unwrap();
    // Alone in the group, the admin may leave.
    service.remove_member("admin", &group.id, "admin").await.unwrap();
}

#[tokio::test]
async fn test_member_with_outstanding_balance_cannot_be_removed() {
    let service = create_test_service();
    let group = open_group(&service, "admin", &["bob"]).await;
    service
        .create_expense("admin", &group.id, equal_draft("admin", dec!(40), "USD", &["admin", "bob"]))
        .await
        .unwrap();

    let result = service.remove_member("admin", &group.id, "bob").await;
    assert!(
        matches!(&result, Err(SplitifydError::InvalidRequest(msg)) if msg.contains("outstanding balance")),
        "{result:?}"
    );

    service
        .create_settlement("bob", &group.id, settlement_draft("bob", "admin", dec!(20), "USD"))
        .await
        .unwrap();
    service.remove_member("admin", &group.id, "bob").await.unwrap();
}

#[tokio::test]
async fn test_removing_from_unknown_group_fails() {
    let service = create_test_service();
    let result = service.remove_member("admin", "nope", "bob").await;
    assert!(matches!(result, Err(SplitifydError::GroupNotFound(_))));
}
