//! Test utilities and fixtures.
//!
//! This module provides:
//! - Re-exports of mockall-generated mocks
//! - Reusable test fixtures (a small LeetCode-style problem catalog, tag
//!   relationships, user-problem rows)
//! - Helper functions for common mock setups

pub mod fixtures;

pub use crate::ports::{
    MockAttemptLog, MockPatternLadderStore, MockProblemCatalog, MockSessionAnalyticsStore, MockSessionStateStore,
    MockSessionStore, MockTagMasteryStore, MockTagRelationshipStore, MockUserProblemStore,
};
