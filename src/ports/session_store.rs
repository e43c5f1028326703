use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{EngineResult, Session, SessionType};

/// Session persistence (spec §6 `SessionStore`).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: Uuid) -> EngineResult<Option<Session>>;

    async fn put(&self, user_id: &str, session: &Session) -> EngineResult<()>;

    async fn get_latest(&self, user_id: &str) -> EngineResult<Option<Session>>;

    async fn by_type(&self, user_id: &str, session_type: SessionType) -> EngineResult<Vec<Session>>;

    /// The user's single in-progress session, if any (§5: "a user may only
    /// have one session in_progress at a time").
    async fn get_in_progress(&self, user_id: &str) -> EngineResult<Option<Session>>;
}
