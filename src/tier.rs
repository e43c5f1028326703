//! Tier-Progression engine (spec §4.C). Tiers are ordered `Core Concept <
//! Fundamental Technique < Advanced Technique`; the engine's job is to
//! locate the user's current tier, pick the tags they should be actively
//! practicing (`focus_tags`), and decide whether enough time has passed to
//! push them into the next tier regardless of completion.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use crate::domain::{TagClassification, TagMastery, TagRelationship};

const FOCUS_TAG_LIMIT: usize = 5;
const TIER_MASTERED_FRACTION: f64 = 0.80;
const TIME_ESCAPE_DAYS: i64 = 30;
const TIME_ESCAPE_MASTERED_FRACTION: f64 = 0.60;

#[derive(Debug, Clone, PartialEq)]
pub struct TierSnapshot {
    pub current_tier: TagClassification,
    pub mastered_tags: Vec<String>,
    pub all_tags_in_current_tier: Vec<String>,
    pub focus_tags: Vec<String>,
    /// Set when the time-based escape (§4.C) pushed the tier forward this
    /// call; the caller should reset `tier_started_at`.
    pub advanced_by_time_escape: bool,
}

fn mastered_set(mastery: &[TagMastery]) -> HashMap<&str, &TagMastery> {
    mastery.iter().map(|m| (m.tag.as_str(), m)).collect()
}

fn tier_tags(relationships: &[TagRelationship], tier: TagClassification) -> Vec<&TagRelationship> {
    relationships.iter().filter(|r| r.classification == tier).collect()
}

fn mastered_count(tags: &[&TagRelationship], mastery: &HashMap<&str, &TagMastery>) -> usize {
    tags.iter()
        .filter(|t| mastery.get(t.tag.as_str()).map(|m| m.mastered).unwrap_or(false))
        .count()
}

/// Lowest tier whose mastered fraction is still under `TIER_MASTERED_FRACTION`.
/// If every tier clears the bar, the user is parked at the highest tier.
fn locate_current_tier(
    relationships: &[TagRelationship],
    mastery: &HashMap<&str, &TagMastery>,
) -> TagClassification {
    let mut tier = TagClassification::CoreConcept;
    loop {
        let tags = tier_tags(relationships, tier);
        let size = tags.len();
        let threshold = (size as f64 * TIER_MASTERED_FRACTION).ceil() as usize;
        let mastered = mastered_count(&tags, mastery);
        let clears_bar = size > 0 && mastered >= threshold;

        match (clears_bar, tier.next()) {
            (true, Some(next)) => tier = next,
            _ => return tier,
        }
    }
}

/// Onboarding: no `TagMastery` rows at all. The top-5 Core-Concept tags by
/// summed relationship weight become the opening focus window.
fn onboarding_snapshot(relationships: &[TagRelationship]) -> TierSnapshot {
    let core = tier_tags(relationships, TagClassification::CoreConcept);
    let all_tags: Vec<String> = core.iter().map(|t| t.tag.clone()).collect();

    let mut ranked: Vec<(&String, f64)> = core
        .iter()
        .map(|t| (&t.tag, t.related.values().sum::<f64>()))
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(b.0)));

    let focus_tags = ranked.into_iter().take(FOCUS_TAG_LIMIT).map(|(t, _)| t.clone()).collect();

    TierSnapshot {
        current_tier: TagClassification::CoreConcept,
        mastered_tags: Vec::new(),
        all_tags_in_current_tier: all_tags,
        focus_tags,
        advanced_by_time_escape: false,
    }
}

/// Select up to `5 - unmastered.len()` tags not yet in `TagMastery` at all,
/// ranked by summed relationship weight to tags the user has already
/// mastered (globally, not tier-restricted — a tag can bridge tiers).
fn seed_new_tags(
    relationships: &[TagRelationship],
    mastery: &HashMap<&str, &TagMastery>,
    already_chosen: &HashSet<&str>,
    needed: usize,
) -> Vec<String> {
    if needed == 0 {
        return Vec::new();
    }

    let mastered_tags: HashSet<&str> = mastery
        .iter()
        .filter(|(_, m)| m.mastered)
        .map(|(tag, _)| *tag)
        .collect();

    let mut candidates: Vec<(&str, f64)> = relationships
        .iter()
        .filter(|r| !mastery.contains_key(r.tag.as_str()) && !already_chosen.contains(r.tag.as_str()))
        .map(|r| {
            let weight: f64 = r
                .related
                .iter()
                .filter(|(related_tag, _)| mastered_tags.contains(related_tag.as_str()))
                .map(|(_, w)| *w)
                .sum();
            (r.tag.as_str(), weight)
        })
        .collect();

    candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(b.0)));
    candidates.into_iter().take(needed).map(|(t, _)| t.to_string()).collect()
}

/// Full tier-progression evaluation: current tier, focus tags, and whether
/// the time-based escape (§4.C) should advance the tier this call.
pub fn evaluate_tier(
    relationships: &[TagRelationship],
    mastery: &[TagMastery],
    tier_started_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> TierSnapshot {
    if mastery.is_empty() {
        return onboarding_snapshot(relationships);
    }

    let mastery_map = mastered_set(mastery);
    let mut current_tier = locate_current_tier(relationships, &mastery_map);

    let tags = tier_tags(relationships, current_tier);
    let size = tags.len();
    let mastered = mastered_count(&tags, &mastery_map);
    let mastered_fraction = if size == 0 { 0.0 } else { mastered as f64 / size as f64 };

    let days_at_tier = (now - tier_started_at).num_days();
    let mut advanced_by_time_escape = false;
    if days_at_tier >= TIME_ESCAPE_DAYS && mastered_fraction >= TIME_ESCAPE_MASTERED_FRACTION {
        if let Some(next) = current_tier.next() {
            current_tier = next;
            advanced_by_time_escape = true;
        }
    }

    let tags = tier_tags(relationships, current_tier);
    let all_tags_in_current_tier: Vec<String> = tags.iter().map(|t| t.tag.clone()).collect();
    let mastered_tags: Vec<String> = tags
        .iter()
        .filter(|t| mastery_map.get(t.tag.as_str()).map(|m| m.mastered).unwrap_or(false))
        .map(|t| t.tag.clone())
        .collect();

    let mut unmastered: Vec<(&str, f64)> = tags
        .iter()
        .filter(|t| !mastery_map.get(t.tag.as_str()).map(|m| m.mastered).unwrap_or(false))
        .map(|t| {
            let rate = mastery_map.get(t.tag.as_str()).map(|m| m.success_rate()).unwrap_or(0.0);
            (t.tag.as_str(), rate)
        })
        .collect();
    unmastered.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(b.0)));

    let mut focus_tags: Vec<String> = unmastered.into_iter().take(FOCUS_TAG_LIMIT).map(|(t, _)| t.to_string()).collect();

    if focus_tags.len() < FOCUS_TAG_LIMIT {
        let chosen: HashSet<&str> = focus_tags.iter().map(|s| s.as_str()).collect();
        let seeded = seed_new_tags(relationships, &mastery_map, &chosen, FOCUS_TAG_LIMIT - focus_tags.len());
        focus_tags.extend(seeded);
    }

    TierSnapshot {
        current_tier,
        mastered_tags,
        all_tags_in_current_tier,
        focus_tags,
        advanced_by_time_escape,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StruggleHistory;
    use std::collections::BTreeMap;

    fn relationship(tag: &str, classification: TagClassification, related: &[(&str, f64)]) -> TagRelationship {
        TagRelationship {
            tag: tag.to_string(),
            classification,
            related: related.iter().map(|(t, w)| (t.to_string(), *w)).collect::<BTreeMap<_, _>>(),
        }
    }

    fn mastery(tag: &str, mastered: bool, success_rate: f64) -> TagMastery {
        let total = 10;
        let successful = (success_rate * total as f64).round() as u32;
        TagMastery {
            tag: tag.to_string(),
            total_attempts: total,
            successful_attempts: successful,
            decay_score: 0.8,
            mastered,
            last_attempt_date: Some(Utc::now()),
            struggle_history: StruggleHistory::default(),
        }
    }

    #[test]
    fn onboarding_returns_top_core_concept_tags_by_weight() {
        let relationships = vec![
            relationship("array", TagClassification::CoreConcept, &[("hashing", 0.9)]),
            relationship("strings", TagClassification::CoreConcept, &[("hashing", 0.1)]),
        ];
        let snapshot = evaluate_tier(&relationships, &[], Utc::now(), Utc::now());
        assert_eq!(snapshot.current_tier, TagClassification::CoreConcept);
        assert_eq!(snapshot.focus_tags[0], "array");
    }

    #[test]
    fn current_tier_is_lowest_tier_under_threshold() {
        let relationships = vec![
            relationship("array", TagClassification::CoreConcept, &[]),
            relationship("strings", TagClassification::CoreConcept, &[]),
            relationship("dp", TagClassification::FundamentalTechnique, &[]),
        ];
        let mastery_rows = vec![mastery("array", true, 1.0), mastery("strings", true, 1.0)];
        let snapshot = evaluate_tier(&relationships, &mastery_rows, Utc::now(), Utc::now());
        assert_eq!(snapshot.current_tier, TagClassification::FundamentalTechnique);
    }

    #[test]
    fn time_based_escape_advances_tier() {
        let relationships = vec![
            relationship("array", TagClassification::CoreConcept, &[]),
            relationship("strings", TagClassification::CoreConcept, &[]),
            relationship("dp", TagClassification::FundamentalTechnique, &[]),
        ];
        let mastery_rows = vec![mastery("array", true, 1.0), mastery("strings", false, 0.6)];
        let now = Utc::now();
        let started = now - chrono::Duration::days(40);
        let snapshot = evaluate_tier(&relationships, &mastery_rows, started, now);
        assert!(snapshot.advanced_by_time_escape);
        assert_eq!(snapshot.current_tier, TagClassification::FundamentalTechnique);
    }

    #[test]
    fn focus_tags_seed_new_tags_when_tier_has_few_unmastered() {
        let relationships = vec![
            relationship("array", TagClassification::CoreConcept, &[]),
            relationship("two-pointers", TagClassification::CoreConcept, &[("array", 0.9)]),
            relationship("sliding-window", TagClassification::CoreConcept, &[("array", 0.1)]),
        ];
        let mastery_rows = vec![mastery("array", true, 1.0)];
        let snapshot = evaluate_tier(&relationships, &mastery_rows, Utc::now(), Utc::now());
        assert!(snapshot.focus_tags.contains(&"two-pointers".to_string()));
    }

    #[test]
    fn focus_tags_capped_at_five() {
        let relationships: Vec<TagRelationship> = (0..8)
            .map(|i| relationship(&format!("tag{i}"), TagClassification::CoreConcept, &[]))
            .collect();
        let mastery_rows: Vec<TagMastery> = (0..8).map(|i| mastery(&format!("tag{i}"), false, 0.1)).collect();
        let snapshot = evaluate_tier(&relationships, &mastery_rows, Utc::now(), Utc::now());
        assert_eq!(snapshot.focus_tags.len(), 5);
    }
}
