use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{EngineResult, SessionAnalytics};

/// Append-only analytics records (spec §6 `SessionAnalyticsStore`, §4.G
/// step 4). Consumed by the out-of-scope dashboard; the engine only writes.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SessionAnalyticsStore: Send + Sync {
    async fn append(&self, user_id: &str, record: &SessionAnalytics) -> EngineResult<()>;

    async fn get(&self, session_id: Uuid) -> EngineResult<Option<SessionAnalytics>>;
}
