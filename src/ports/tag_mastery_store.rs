use async_trait::async_trait;

use crate::domain::{EngineResult, TagMastery};

/// Per-tag mastery rows (spec §6 `TagMasteryStore`). Recompute (§4.B)
/// replaces rows atomically per tag; a failure on one tag must not corrupt
/// another, so the store exposes per-tag puts rather than a single
/// whole-table replace.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TagMasteryStore: Send + Sync {
    async fn get(&self, user_id: &str, tag: &str) -> EngineResult<Option<TagMastery>>;

    async fn list(&self, user_id: &str) -> EngineResult<Vec<TagMastery>>;

    async fn put(&self, user_id: &str, row: &TagMastery) -> EngineResult<()>;
}
