use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Attempt, EngineResult};

/// Append-only attempt history (spec §6 `AttemptLog`).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AttemptLog: Send + Sync {
    async fn append(&self, user_id: &str, attempt: &Attempt) -> EngineResult<()>;

    /// Most recent attempts first, newest-to-oldest.
    async fn list_by_recency(&self, user_id: &str, limit: usize) -> EngineResult<Vec<Attempt>>;

    async fn list_by_session(&self, user_id: &str, session_id: Uuid) -> EngineResult<Vec<Attempt>>;
}
