use async_trait::async_trait;

use crate::domain::{EngineResult, SessionState};

/// Singleton per-user settings state (spec §6 `SessionStateStore`, §3
/// `SessionState`). Mutated only by the Adaptive Session Settings component
/// and the Post-Session Reducer.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SessionStateStore: Send + Sync {
    async fn get(&self, user_id: &str) -> EngineResult<Option<SessionState>>;

    async fn put(&self, user_id: &str, state: &SessionState) -> EngineResult<()>;
}
