//! Reusable test fixtures: a small LeetCode-style problem catalog plus
//! mock setup helpers to avoid duplicating this boilerplate across test
//! files.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::domain::{Difficulty, Problem, TagClassification, TagRelationship, UserProblem};
use crate::ports::MockProblemCatalog;

// ============================================================================
// Problem Fixtures
// ============================================================================

fn tags(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// A small but tag-diverse catalog: two-pointers, hash-table, and dynamic
/// programming, spanning all three difficulties.
pub fn create_catalog() -> Vec<Problem> {
    vec![
        Problem {
            leetcode_id: 1,
            title: "Two Sum".to_string(),
            slug: "two-sum".to_string(),
            difficulty: Difficulty::Easy,
            tags: tags(&["array", "hash-table"]),
        },
        Problem {
            leetcode_id: 15,
            title: "3Sum".to_string(),
            slug: "3sum".to_string(),
            difficulty: Difficulty::Medium,
            tags: tags(&["array", "two-pointers", "sorting"]),
        },
        Problem {
            leetcode_id: 11,
            title: "Container With Most Water".to_string(),
            slug: "container-with-most-water".to_string(),
            difficulty: Difficulty::Medium,
            tags: tags(&["array", "two-pointers", "greedy"]),
        },
        Problem {
            leetcode_id: 42,
            title: "Trapping Rain Water".to_string(),
            slug: "trapping-rain-water".to_string(),
            difficulty: Difficulty::Hard,
            tags: tags(&["array", "two-pointers", "dynamic-programming"]),
        },
        Problem {
            leetcode_id: 121,
            title: "Best Time to Buy and Sell Stock".to_string(),
            slug: "best-time-to-buy-and-sell-stock".to_string(),
            difficulty: Difficulty::Easy,
            tags: tags(&["array", "dynamic-programming"]),
        },
        Problem {
            leetcode_id: 300,
            title: "Longest Increasing Subsequence".to_string(),
            slug: "longest-increasing-subsequence".to_string(),
            difficulty: Difficulty::Medium,
            tags: tags(&["array", "dynamic-programming", "binary-search"]),
        },
        Problem {
            leetcode_id: 72,
            title: "Edit Distance".to_string(),
            slug: "edit-distance".to_string(),
            difficulty: Difficulty::Hard,
            tags: tags(&["string", "dynamic-programming"]),
        },
        Problem {
            leetcode_id: 217,
            title: "Contains Duplicate".to_string(),
            slug: "contains-duplicate".to_string(),
            difficulty: Difficulty::Easy,
            tags: tags(&["array", "hash-table", "sorting"]),
        },
    ]
}

pub fn get_problem(leetcode_id: i64) -> Option<Problem> {
    create_catalog().into_iter().find(|p| p.leetcode_id == leetcode_id)
}

// ============================================================================
// Tag Relationship Fixtures
// ============================================================================

/// A tag-relationship graph spanning all three classifications, with
/// `two-pointers` as the only Fundamental Technique and
/// `dynamic-programming` as the only Advanced Technique.
pub fn create_tag_relationships() -> Vec<TagRelationship> {
    vec![
        TagRelationship {
            tag: "array".to_string(),
            classification: TagClassification::CoreConcept,
            related: [("hash-table".to_string(), 0.6), ("two-pointers".to_string(), 0.7)]
                .into_iter()
                .collect(),
        },
        TagRelationship {
            tag: "hash-table".to_string(),
            classification: TagClassification::CoreConcept,
            related: [("array".to_string(), 0.6)].into_iter().collect(),
        },
        TagRelationship {
            tag: "sorting".to_string(),
            classification: TagClassification::CoreConcept,
            related: [("array".to_string(), 0.4)].into_iter().collect(),
        },
        TagRelationship {
            tag: "two-pointers".to_string(),
            classification: TagClassification::FundamentalTechnique,
            related: [("array".to_string(), 0.7), ("dynamic-programming".to_string(), 0.5)]
                .into_iter()
                .collect(),
        },
        TagRelationship {
            tag: "binary-search".to_string(),
            classification: TagClassification::FundamentalTechnique,
            related: [("array".to_string(), 0.3)].into_iter().collect(),
        },
        TagRelationship {
            tag: "greedy".to_string(),
            classification: TagClassification::FundamentalTechnique,
            related: [("two-pointers".to_string(), 0.4)].into_iter().collect(),
        },
        TagRelationship {
            tag: "dynamic-programming".to_string(),
            classification: TagClassification::AdvancedTechnique,
            related: [("two-pointers".to_string(), 0.5)].into_iter().collect(),
        },
        TagRelationship {
            tag: "string".to_string(),
            classification: TagClassification::AdvancedTechnique,
            related: [("dynamic-programming".to_string(), 0.4)].into_iter().collect(),
        },
    ]
}

// ============================================================================
// UserProblem Fixtures
// ============================================================================

/// A freshly-seeded `UserProblem` row for `leetcode_id`, as
/// `UserProblem::new_for_problem` would produce on first sight.
pub fn new_user_problem(leetcode_id: i64, now: DateTime<Utc>) -> UserProblem {
    UserProblem::new_for_problem(leetcode_id, now)
}

// ============================================================================
// Mock Setup Helpers
// ============================================================================

/// Configure `mock` to serve the fixture catalog for every `ProblemCatalog`
/// method, with `related_problems` wired from a small hand-picked edge
/// list rather than derived from `tags` (graph weights have no natural
/// catalog-derived value).
pub fn setup_catalog_mock(mock: &mut MockProblemCatalog) {
    let catalog = create_catalog();

    let by_slug = catalog.clone();
    mock.expect_get_by_slug()
        .returning(move |slug| Ok(by_slug.iter().find(|p| p.slug == slug).cloned()));

    let by_id = catalog.clone();
    mock.expect_get_by_id()
        .returning(move |id| Ok(by_id.iter().find(|p| p.leetcode_id == id).cloned()));

    let filterable = catalog.clone();
    mock.expect_list_with_filter().returning(move |tags, cap, exclude, limit| {
        let mut matches: Vec<Problem> = filterable
            .iter()
            .filter(|p| tags.is_empty() || p.tags.iter().any(|t| tags.contains(t)))
            .filter(|p| p.difficulty <= cap)
            .filter(|p| !exclude.contains(&p.leetcode_id))
            .cloned()
            .collect();
        matches.sort_by_key(|p| p.leetcode_id);
        matches.truncate(limit);
        Ok(matches)
    });

    mock.expect_related_problems().returning(|leetcode_id| {
        let edges: Vec<(i64, f64)> = match leetcode_id {
            1 => vec![(217, 0.8), (15, 0.3)],
            15 => vec![(11, 0.7), (42, 0.6)],
            11 => vec![(42, 0.8), (15, 0.7)],
            42 => vec![(11, 0.8), (72, 0.4)],
            121 => vec![(300, 0.5)],
            300 => vec![(121, 0.5), (72, 0.4)],
            72 => vec![(300, 0.4)],
            217 => vec![(1, 0.8)],
            _ => vec![],
        };
        Ok(edges)
    });
}

/// Configure `mock` with empty defaults for every `ProblemCatalog` method.
/// Use as a base, then layer specific expectations on top.
pub fn setup_default_catalog_mock(mock: &mut MockProblemCatalog) {
    mock.expect_get_by_slug().returning(|_| Ok(None));
    mock.expect_get_by_id().returning(|_| Ok(None));
    mock.expect_list_with_filter().returning(|_, _, _, _| Ok(vec![]));
    mock.expect_related_problems().returning(|_| Ok(vec![]));
}
