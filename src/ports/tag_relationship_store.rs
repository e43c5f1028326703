use async_trait::async_trait;

use crate::domain::{EngineResult, TagClassification, TagRelationship};

/// Read-only tag-relationship catalog (spec §6 `TagRelationshipStore`),
/// consumed by the Tier-Progression engine (§4.C) and the guard rail's
/// related-tag fallback (§4.F).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TagRelationshipStore: Send + Sync {
    async fn get(&self, tag: &str) -> EngineResult<Option<TagRelationship>>;

    async fn list(&self) -> EngineResult<Vec<TagRelationship>>;

    async fn list_by_classification(
        &self,
        classification: TagClassification,
    ) -> EngineResult<Vec<TagRelationship>>;
}
