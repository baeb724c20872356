pub fn group_permissions_key(group_id: &str) -> String {
    format!("group_permissions:{}", group_id)
}

pub fn user_permissions_key(group_id: &str, user_id: &str) -> String {
    format!("{}{}", user_permissions_prefix(group_id), user_id)
}

/// Shared prefix of every per-user entry of a group.
pub fn user_permissions_prefix(group_id: &str) -> String {
    format!("user_permissions:{}:", group_id)
}
