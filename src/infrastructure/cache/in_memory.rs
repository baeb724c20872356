use crate::core::errors::SplitifydError;
use crate::core::permissions::{GroupSecurity, UserPermissions};
use crate::infrastructure::cache::Cache;
use crate::infrastructure::cache::cache_keys::{group_permissions_key, user_permissions_key, user_permissions_prefix};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Clone, Debug)]
enum CachedPermissions {
    Group(GroupSecurity),
    User(UserPermissions),
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CachedPermissions>,
    generations: HashMap<String, u64>,
}

impl CacheState {
    fn generation(&self, group_id: &str) -> u64 {
        self.generations.get(group_id).copied().unwrap_or_default()
    }
}

#[derive(Clone, Default)]
pub struct InMemoryCache {
    cache: Arc<RwLock<CacheState>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        InMemoryCache {
            cache: Arc::new(RwLock::new(CacheState::default())),
        }
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.entries.is_empty()
    }

    async fn save(&self, group_id: &str, key: String, entry: CachedPermissions, generation: u64) -> bool {
        let mut cache = self.cache.write().await;
        if cache.generation(group_id) != generation {
            debug!(group_id, %key, "stale permissions not cached");
            return false;
        }
        cache.entries.insert(key, entry);
        true
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn generation(&self, group_id: &str) -> Result<u64, SplitifydError> {
        Ok(self.cache.read().await.generation(group_id))
    }

    async fn get_user_permissions(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> Result<Option<UserPermissions>, SplitifydError> {
        let cache = self.cache.read().await;
        match cache.entries.get(&user_permissions_key(group_id, user_id)) {
            Some(CachedPermissions::User(permissions)) => Ok(Some(permissions.clone())),
            Some(CachedPermissions::Group(_)) => Err(SplitifydError::CacheError(format!(
                "unexpected group entry under user key for {}",
                user_id
            ))),
            None => Ok(None),
        }
    }

    async fn save_user_permissions(
        &self,
        permissions: &UserPermissions,
        generation: u64,
    ) -> Result<bool, SplitifydError> {
        let key = user_permissions_key(&permissions.group_id, &permissions.user_id);
        let entry = CachedPermissions::User(permissions.clone());
        Ok(self.save(&permissions.group_id, key, entry, generation).await)
    }

    async fn get_group_permissions(&self, group_id: &str) -> Result<Option<GroupSecurity>, SplitifydError> {
        let cache = self.cache.read().await;
        match cache.entries.get(&group_permissions_key(group_id)) {
            Some(CachedPermissions::Group(security)) => Ok(Some(security.clone())),
            Some(CachedPermissions::User(_)) => Err(SplitifydError::CacheError(format!(
                "unexpected user entry under group key for {}",
                group_id
            ))),
            None => Ok(None),
        }
    }

    async fn save_group_permissions(&self, security: &GroupSecurity, generation: u64) -> Result<bool, SplitifydError> {
        let key = group_permissions_key(&security.group_id);
        let entry = CachedPermissions::Group(security.clone());
        Ok(self.save(&security.group_id, key, entry, generation).await)
    }

    async fn invalidate(&self, group_id: &str, user_id: Option<&str>) -> Result<(), SplitifydError> {
        let mut cache = self.cache.write().await;
        *cache.generations.entry(group_id.to_string()).or_default() += 1;
        cache.entries.remove(&group_permissions_key(group_id));
        match user_id {
            Some(user_id) => {
                cache.entries.remove(&user_permissions_key(group_id, user_id));
            }
            None => {
                let prefix = user_permissions_prefix(group_id);
                cache.entries.retain(|key, _| !key.starts_with(&prefix));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::group::{MemberRole, MemberStatus, SecurityPreset};
    use crate::core::permissions::ActionAccess;

    fn user_entry(group_id: &str, user_id: &str) -> UserPermissions {
        UserPermissions {
            group_id: group_id.to_string(),
            user_id: user_id.to_string(),
            role: MemberRole::Member,
            status: MemberStatus::Active,
            expense_editing: ActionAccess::Any,
            expense_deletion: ActionAccess::Any,
            can_invite_members: true,
            can_approve_members: false,
            can_manage_settings: true,
            can_change_roles: false,
        }
    }

    fn group_entry(group_id: &str) -> GroupSecurity {
        GroupSecurity {
            group_id: group_id.to_string(),
            security_preset: SecurityPreset::Open,
            permissions: SecurityPreset::Open.defaults().unwrap(),
        }
    }

    async fn seeded() -> InMemoryCache {
        let cache = InMemoryCache::new();
        for (group, user) in [("g1", "u1"), ("g1", "u2"), ("g10", "u1")] {
            cache.save_user_permissions(&user_entry(group, user), 0).await.unwrap();
        }
        cache.save_group_permissions(&group_entry("g1"), 0).await.unwrap();
        cache.save_group_permissions(&group_entry("g10"), 0).await.unwrap();
        cache
    }

    #[tokio::test]
    async fn invalidating_a_user_keeps_other_members() {
        let cache = seeded().await;
        cache.invalidate("g1", Some("u1")).await.unwrap();

        assert!(cache.get_user_permissions("g1", "u1").await.unwrap().is_none());
        assert!(cache.get_group_permissions("g1").await.unwrap().is_none());
        assert!(cache.get_user_permissions("g1", "u2").await.unwrap().is_some());
        assert!(cache.get_user_permissions("g10", "u1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn invalidating_a_group_clears_all_its_users_only() {
        let cache = seeded().await;
        cache.invalidate("g1", None).await.unwrap();

        assert!(cache.get_user_permissions("g1", "u1").await.unwrap().is_none());
        assert!(cache.get_user_permissions("g1", "u2").await.unwrap().is_none());
        assert!(cache.get_group_permissions("g1").await.unwrap().is_none());
        // "g10" shares a textual prefix with "g1" but is a different group.
        assert!(cache.get_user_permissions("g10", "u1").await.unwrap().is_some());
        assert!(cache.get_group_permissions("g10").await.unwrap().is_some());
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn save_after_invalidation_is_dropped() {
        let cache = InMemoryCache::new();
        let before = cache.generation("g1").await.unwrap();
        cache.invalidate("g1", Some("u1")).await.unwrap();

        assert!(!cache.save_user_permissions(&user_entry("g1", "u1"), before).await.unwrap());
        assert!(!cache.save_group_permissions(&group_entry("g1"), before).await.unwrap());
        assert!(cache.is_empty().await);

        // Other groups keep their own generation.
        assert!(cache.save_user_permissions(&user_entry("g10", "u1"), 0).await.unwrap());

        let current = cache.generation("g1").await.unwrap();
        assert_eq!(current, before + 1);
        assert!(cache.save_user_permissions(&user_entry("g1", "u1"), current).await.unwrap());
        assert!(cache.get_user_permissions("g1", "u1").await.unwrap().is_some());
    }
}
