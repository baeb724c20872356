pub mod in_memory;

use crate::core::errors::SplitifydError;
use crate::core::models::audit::AppLog;
use async_trait::async_trait;

/// Application action log. Each mutating service call records one entry under a
/// constant action name from [`crate::constants`].
#[async_trait]
pub trait LoggingService: Send + Sync {
    async fn log_action(
        &self,
        action: &str,
        details: serde_json::Value,
        user_id: Option<&str>,
    ) -> Result<(), SplitifydError>;
    async fn get_logs(&self) -> Result<Vec<AppLog>, SplitifydError>;
}
