use async_trait::async_trait;

use crate::domain::{Difficulty, EngineResult, Problem};

/// Read-only access to the immutable problem catalog (spec §6
/// `ProblemCatalog`). The catalog is read-mostly and safe to share across
/// users (§5 "Shared resources").
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ProblemCatalog: Send + Sync {
    async fn get_by_slug(&self, slug: &str) -> EngineResult<Option<Problem>>;

    async fn get_by_id(&self, leetcode_id: i64) -> EngineResult<Option<Problem>>;

    /// Candidates for Priority 3 (§4.F): problems carrying at least one of
    /// `tags`, at or under `difficulty_cap`, excluding `exclude_ids`,
    /// truncated to `limit`. Catalog order (stable by `leetcode_id`) is the
    /// order onboarding sessions (and the fallback-on-failure path) use
    /// directly, without further scoring.
    async fn list_with_filter(
        &self,
        tags: &[String],
        difficulty_cap: Difficulty,
        exclude_ids: &[i64],
        limit: usize,
    ) -> EngineResult<Vec<Problem>>;

    /// Weighted edges of the problem-relationship graph from `leetcode_id`,
    /// used by Priority 1 (bridge problems) to find mastered problems
    /// strongly related to a recent failure. Grounded in the teacher's
    /// `ContentRepository::get_edges_from` — relationship data is a
    /// read-only catalog query, not a new top-level port (SPEC_FULL §14).
    async fn related_problems(&self, leetcode_id: i64) -> EngineResult<Vec<(i64, f64)>>;
}
