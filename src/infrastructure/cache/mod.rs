pub mod cache_keys;
pub mod in_memory;

use crate::core::errors::SplitifydError;
use crate::core::permissions::{GroupSecurity, UserPermissions};
use async_trait::async_trait;

/// Write-through permission cache. Entries never expire; they leave only through `invalidate`.
///
/// Every `invalidate` bumps the group's generation. Readers take the generation before
/// loading the group and pass it to the save, which is dropped when an invalidation
/// happened in between.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn generation(&self, group_id: &str) -> Result<u64, SplitifydError>;
    async fn get_user_permissions(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> Result<Option<UserPermissions>, SplitifydError>;
    /// Returns whether the entry was stored.
    async fn save_user_permissions(
        &self,
        permissions: &UserPermissions,
        generation: u64,
    ) -> Result<bool, SplitifydError>;
    async fn get_group_permissions(&self, group_id: &str) -> Result<Option<GroupSecurity>, SplitifydError>;
    async fn save_group_permissions(&self, security: &GroupSecurity, generation: u64) -> Result<bool, SplitifydError>;
    /// Drops the group entry, plus the entry of `user_id` or of every user when `None`.
    async fn invalidate(&self, group_id: &str, user_id: Option<&str>) -> Result<(), SplitifydError>;
}
