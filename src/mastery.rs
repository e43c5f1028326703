//! Tag-Mastery engine (spec §4.B). Recomputes a single tag's `TagMastery`
//! row from the member `UserProblem`/`Problem` pairs that carry it — a full
//! rebuild, not an incremental patch, which is what makes a recompute pass
//! idempotent and lets a failure on one tag leave every other tag
//! untouched (the orchestration layer calls this once per touched tag and
//! persists each result independently; see `reducer`).

use chrono::{DateTime, Utc};

use crate::decay;
use crate::domain::{Problem, StruggleHistory, TagMastery, UserProblem};

/// One tag's member rows, as seen by the recompute pass.
pub struct TagMasteryInput<'a> {
    pub tag: &'a str,
    /// `(user_problem, problem)` pairs for every catalog problem carrying
    /// this tag that the user has attempted at least once.
    pub members: Vec<(&'a UserProblem, &'a Problem)>,
    /// The tag's previous row, if any — carries `struggle_history` forward.
    pub previous: Option<&'a TagMastery>,
    pub now: DateTime<Utc>,
}

/// Adaptive mastery thresholds (spec §4.B). Returns true if *any* escape
/// hatch (or the base threshold) is satisfied.
pub fn meets_mastery_threshold(total_attempts: u32, success_rate: f64, consecutive_struggles: u32) -> bool {
    let base = total_attempts >= 4 && success_rate >= 0.80;
    let light_struggle = total_attempts >= 10 && success_rate >= 0.75;
    let moderate_struggle = total_attempts >= 20 && success_rate >= 0.70;
    let heavy_struggle = consecutive_struggles >= 6 && success_rate >= 0.65;
    base || light_struggle || moderate_struggle || heavy_struggle
}

/// Time-based escape hatch (§4.E): a tag with no recent attempts but a
/// historically solid success rate counts as "effectively mastered" for
/// progression decisions even if it never crossed the formal threshold.
pub fn effectively_mastered(tag: &TagMastery, now: DateTime<Utc>) -> bool {
    if tag.mastered {
        return true;
    }
    let days_since_last = tag
        .last_attempt_date
        .map(|last| (now - last).num_days())
        .unwrap_or(i64::MAX);
    days_since_last >= 20 && tag.success_rate() >= 0.6
}

/// Recompute a tag's mastery row. Pure and idempotent: the same `input`
/// always yields the same `TagMastery` (spec §8 property 8).
pub fn recompute_tag_mastery(input: TagMasteryInput<'_>) -> TagMastery {
    let TagMasteryInput {
        tag,
        members,
        previous,
        now,
    } = input;

    let total_attempts: u32 = members.iter().map(|(up, _)| up.attempt_stats.total).sum();
    let successful_attempts: u32 = members.iter().map(|(up, _)| up.attempt_stats.successful).sum();
    let success_rate = if total_attempts == 0 {
        0.0
    } else {
        successful_attempts as f64 / total_attempts as f64
    };

    let last_attempt_date = members
        .iter()
        .filter_map(|(up, _)| up.last_attempt_date)
        .max();

    let decay_score = stability_weighted_decay(&members, now);

    let prev_struggles = previous.map(|p| p.struggle_history.consecutive_struggles).unwrap_or(0);
    let mastered = meets_mastery_threshold(total_attempts, success_rate, prev_struggles);

    let struggle_history = next_struggle_history(previous, total_attempts, mastered, last_attempt_date, now);

    TagMastery {
        tag: tag.to_string(),
        total_attempts,
        successful_attempts,
        decay_score,
        mastered,
        last_attempt_date,
        struggle_history,
    }
}

fn stability_weighted_decay(members: &[(&UserProblem, &Problem)], now: DateTime<Utc>) -> f64 {
    if members.is_empty() {
        return 1.0;
    }

    let mut weight_sum = 0.0;
    let mut weighted_decay = 0.0;
    for (up, _) in members {
        let per_problem_decay = decay::decay_score(now, up.last_attempt_date, up.success_rate(), up.stability);
        weight_sum += up.stability;
        weighted_decay += up.stability * per_problem_decay;
    }

    if weight_sum <= 0.0 {
        members
            .iter()
            .map(|(up, _)| decay::decay_score(now, up.last_attempt_date, up.success_rate(), up.stability))
            .sum::<f64>()
            / members.len() as f64
    } else {
        weighted_decay / weight_sum
    }
}

/// `consecutive_struggles` increments when the tag is evaluated with `≥4`
/// attempts and still comes back unmastered; it resets on mastery.
/// `days_without_progress` tracks elapsed days since the last attempt for
/// as long as the tag stays unmastered with no new attempts recorded —
/// this detail is left unspecified by §4.B beyond "updated"; we reset it
/// to zero whenever new attempts landed since the previous recompute (that
/// *is* progress, even if mastery wasn't reached) and otherwise accumulate
/// the days elapsed since the tag was last touched.
fn next_struggle_history(
    previous: Option<&TagMastery>,
    total_attempts: u32,
    mastered: bool,
    last_attempt_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> StruggleHistory {
    if mastered {
        return StruggleHistory {
            consecutive_struggles: 0,
            days_without_progress: 0,
            total_attempts,
        };
    }

    let prev = previous.map(|p| p.struggle_history).unwrap_or_default();
    let new_attempts_landed = total_attempts > prev.total_attempts;

    let consecutive_struggles = if total_attempts >= 4 {
        prev.consecutive_struggles + 1
    } else {
        prev.consecutive_struggles
    };

    let days_without_progress = if new_attempts_landed {
        0
    } else {
        let elapsed = last_attempt_date
            .map(|last| (now - last).num_days().max(0) as u32)
            .unwrap_or(prev.days_without_progress);
        elapsed.max(prev.days_without_progress)
    };

    StruggleHistory {
        consecutive_struggles,
        days_without_progress,
        total_attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Difficulty;
    use std::collections::BTreeSet;

    fn problem(id: i64, tag: &str) -> Problem {
        Problem {
            leetcode_id: id,
            title: format!("Problem {id}"),
            slug: format!("problem-{id}"),
            difficulty: Difficulty::Medium,
            tags: BTreeSet::from([tag.to_string()]),
        }
    }

    fn user_problem(now: DateTime<Utc>, total: u32, successful: u32) -> UserProblem {
        let mut up = UserProblem::new_for_problem(1, now);
        up.attempt_stats.total = total;
        up.attempt_stats.successful = successful;
        up.attempt_stats.unsuccessful = total - successful;
        up.last_attempt_date = Some(now);
        up
    }

    #[test]
    fn base_threshold_requires_four_attempts_and_eighty_percent() {
        assert!(meets_mastery_threshold(4, 0.80, 0));
        assert!(!meets_mastery_threshold(3, 1.0, 0));
        assert!(!meets_mastery_threshold(4, 0.79, 0));
    }

    #[test]
    fn light_struggle_escape_hatch() {
        assert!(meets_mastery_threshold(10, 0.75, 0));
        assert!(!meets_mastery_threshold(9, 0.75, 0));
    }

    #[test]
    fn moderate_struggle_escape_hatch() {
        assert!(meets_mastery_threshold(20, 0.70, 0));
        assert!(!meets_mastery_threshold(19, 0.70, 0));
    }

    #[test]
    fn heavy_struggle_escape_hatch() {
        assert!(meets_mastery_threshold(1, 0.65, 6));
        assert!(!meets_mastery_threshold(1, 0.65, 5));
    }

    #[test]
    fn recompute_is_idempotent() {
        let now = Utc::now();
        let p = problem(1, "array");
        let up = user_problem(now, 5, 4);
        let input_a = TagMasteryInput {
            tag: "array",
            members: vec![(&up, &p)],
            previous: None,
            now,
        };
        let a = recompute_tag_mastery(input_a);
        let input_b = TagMasteryInput {
            tag: "array",
            members: vec![(&up, &p)],
            previous: None,
            now,
        };
        let b = recompute_tag_mastery(input_b);
        assert_eq!(a.total_attempts, b.total_attempts);
        assert_eq!(a.mastered, b.mastered);
        assert!((a.decay_score - b.decay_score).abs() < f64::EPSILON);
    }

    #[test]
    fn aggregates_across_member_problems() {
        let now = Utc::now();
        let p1 = problem(1, "array");
        let p2 = problem(2, "array");
        let up1 = user_problem(now, 3, 3);
        let up2 = user_problem(now, 2, 1);

        let result = recompute_tag_mastery(TagMasteryInput {
            tag: "array",
            members: vec![(&up1, &p1), (&up2, &p2)],
            previous: None,
            now,
        });

        assert_eq!(result.total_attempts, 5);
        assert_eq!(result.successful_attempts, 4);
    }

    #[test]
    fn mastery_resets_struggle_streak() {
        let now = Utc::now();
        let p = problem(1, "array");
        let up = user_problem(now, 10, 9);
        let previous = TagMastery {
            tag: "array".to_string(),
            total_attempts: 9,
            successful_attempts: 3,
            decay_score: 0.5,
            mastered: false,
            last_attempt_date: Some(now),
            struggle_history: StruggleHistory {
                consecutive_struggles: 2,
                days_without_progress: 3,
                total_attempts: 9,
            },
        };

        let result = recompute_tag_mastery(TagMasteryInput {
            tag: "array",
            members: vec![(&up, &p)],
            previous: Some(&previous),
            now,
        });

        assert!(result.mastered);
        assert_eq!(result.struggle_history.consecutive_struggles, 0);
    }

    #[test]
    fn non_mastery_with_enough_attempts_increments_struggle_streak() {
        let now = Utc::now();
        let p = problem(1, "array");
        let up = user_problem(now, 5, 1);
        let previous = TagMastery {
            tag: "array".to_string(),
            total_attempts: 4,
            successful_attempts: 1,
            decay_score: 0.5,
            mastered: false,
            last_attempt_date: Some(now),
            struggle_history: StruggleHistory {
                consecutive_struggles: 1,
                days_without_progress: 0,
                total_attempts: 4,
            },
        };

        let result = recompute_tag_mastery(TagMasteryInput {
            tag: "array",
            members: vec![(&up, &p)],
            previous: Some(&previous),
            now,
        });

        assert!(!result.mastered);
        assert_eq!(result.struggle_history.consecutive_struggles, 2);
    }
}
