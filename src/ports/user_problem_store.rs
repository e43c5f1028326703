use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{EngineResult, UserProblem};

/// Per-user, per-problem spaced-repetition state (spec §6
/// `UserProblemStore`). Writer-exclusive per user (§5).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserProblemStore: Send + Sync {
    async fn get(&self, user_id: &str, leetcode_id: i64) -> EngineResult<Option<UserProblem>>;

    async fn get_by_problem_id(&self, user_id: &str, problem_id: Uuid) -> EngineResult<Option<UserProblem>>;

    async fn put(&self, user_id: &str, row: &UserProblem) -> EngineResult<()>;

    async fn list(&self, user_id: &str) -> EngineResult<Vec<UserProblem>>;

    /// Filtered range over `review_schedule` and `box_level`, used by the
    /// Scheduler (§4.D) to fetch due candidates without loading every row.
    async fn list_due_before(
        &self,
        user_id: &str,
        due_before: DateTime<Utc>,
        box_levels: std::ops::RangeInclusive<u8>,
    ) -> EngineResult<Vec<UserProblem>>;
}
