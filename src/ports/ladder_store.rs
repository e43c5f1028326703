use async_trait::async_trait;

use crate::domain::{EngineResult, PatternLadder};

/// Per-tag pattern ladders (spec §6 `PatternLadderStore`, §4.H).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PatternLadderStore: Send + Sync {
    async fn get(&self, user_id: &str, tag: &str) -> EngineResult<Option<PatternLadder>>;

    async fn put(&self, user_id: &str, ladder: &PatternLadder) -> EngineResult<()>;

    async fn list(&self, user_id: &str) -> EngineResult<Vec<PatternLadder>>;
}
