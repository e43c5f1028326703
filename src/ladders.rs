//! Pattern Ladders (spec §4.H). A ladder is a small, size-bounded, ordered
//! set of catalog problems for one tag, used by the guard rail (§4.F) to
//! find softer-difficulty replacements and regenerated once every entry has
//! been attempted.

use crate::domain::{Difficulty, PatternLadder, PatternLadderEntry, Problem};

/// A problem's role with respect to the tag determines how large its
/// ladder is (spec §4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LadderRole {
    Focus,
    Tier,
    Other,
}

impl LadderRole {
    pub fn ladder_size(self) -> usize {
        match self {
            LadderRole::Focus => 12,
            LadderRole::Tier => 9,
            LadderRole::Other => 5,
        }
    }
}

/// Target Easy/Medium/Hard split a regenerated ladder aims for — the
/// "difficulty distribution proportional to the tag's target distribution"
/// from §4.H. The spec doesn't pin exact fractions; we weight toward Easy
/// so a ladder climbs rather than front-loads hard problems (DESIGN.md).
const TARGET_DISTRIBUTION: (f64, f64, f64) = (0.4, 0.4, 0.2);

/// A candidate already filtered by the caller to: carries `tag`,
/// unattempted, and every tag it carries falls within an allowed
/// classification (spec §4.H "filter-and-sort").
#[derive(Debug, Clone)]
pub struct LadderCandidate {
    pub problem: Problem,
    pub decay_score: f64,
    pub connections: Vec<i64>,
}

fn target_counts(ladder_size: usize) -> (usize, usize, usize) {
    let (e, m, _h) = TARGET_DISTRIBUTION;
    let easy = (ladder_size as f64 * e).round() as usize;
    let medium = (ladder_size as f64 * m).round() as usize;
    let hard = ladder_size.saturating_sub(easy + medium);
    (easy, medium, hard)
}

/// Regenerate a tag's ladder from pre-filtered candidates. Entries are
/// picked to match the target difficulty split (falling back to whatever
/// difficulty is available if one bucket runs dry) and ordered
/// Easy → Medium → Hard, climbing in difficulty as the spec's "ladder"
/// metaphor implies.
///
/// `ladder_size` is taken directly from the caller rather than re-derived
/// from a `LadderRole`, so regenerating an existing ladder preserves its
/// size (§4.H "regenerate ladders... preserving per-tag ladder size")
/// instead of snapping back to whatever role a fresh ladder of this kind
/// would normally get. Use `LadderRole::ladder_size()` only when creating a
/// ladder for a tag that has none yet.
pub fn regenerate_ladder(tag: &str, ladder_size: usize, candidates: &[LadderCandidate]) -> PatternLadder {
    let (target_easy, target_medium, target_hard) = target_counts(ladder_size);

    let mut by_difficulty = |difficulty: Difficulty| -> Vec<&LadderCandidate> {
        candidates.iter().filter(|c| c.problem.difficulty == difficulty).collect()
    };

    let mut easy_pool = by_difficulty(Difficulty::Easy);
    let mut medium_pool = by_difficulty(Difficulty::Medium);
    let mut hard_pool = by_difficulty(Difficulty::Hard);
    for pool in [&mut easy_pool, &mut medium_pool, &mut hard_pool] {
        pool.sort_by_key(|c| c.problem.leetcode_id);
    }

    let mut selected: Vec<&LadderCandidate> = Vec::with_capacity(ladder_size);
    selected.extend(easy_pool.iter().take(target_easy));
    selected.extend(medium_pool.iter().take(target_medium));
    selected.extend(hard_pool.iter().take(target_hard));

    if selected.len() < ladder_size {
        let already: std::collections::BTreeSet<i64> = selected.iter().map(|c| c.problem.leetcode_id).collect();
        let mut leftovers: Vec<&LadderCandidate> = candidates
            .iter()
            .filter(|c| !already.contains(&c.problem.leetcode_id))
            .collect();
        leftovers.sort_by_key(|c| c.problem.leetcode_id);
        selected.extend(leftovers.into_iter().take(ladder_size - selected.len()));
    }

    let problems = selected
        .into_iter()
        .map(|c| PatternLadderEntry {
            leetcode_id: c.problem.leetcode_id,
            difficulty: c.problem.difficulty,
            decay_score: c.decay_score,
            connections: c.connections.clone(),
            attempted: false,
        })
        .collect();

    PatternLadder {
        tag: tag.to_string(),
        problems,
        ladder_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn candidate(id: i64, difficulty: Difficulty) -> LadderCandidate {
        LadderCandidate {
            problem: Problem {
                leetcode_id: id,
                title: format!("P{id}"),
                slug: format!("p{id}"),
                difficulty,
                tags: BTreeSet::from(["array".to_string()]),
            },
            decay_score: 0.5,
            connections: Vec::new(),
        }
    }

    #[test]
    fn ladder_size_by_role() {
        assert_eq!(LadderRole::Focus.ladder_size(), 12);
        assert_eq!(LadderRole::Tier.ladder_size(), 9);
        assert_eq!(LadderRole::Other.ladder_size(), 5);
    }

    #[test]
    fn regenerates_to_target_size_when_candidates_plentiful() {
        let mut candidates = Vec::new();
        for i in 0..20 {
            let difficulty = match i % 3 {
                0 => Difficulty::Easy,
                1 => Difficulty::Medium,
                _ => Difficulty::Hard,
            };
            candidates.push(candidate(i, difficulty));
        }

        let ladder = regenerate_ladder("array", LadderRole::Other.ladder_size(), &candidates);
        assert_eq!(ladder.problems.len(), 5);
        assert!(!ladder.all_attempted());
    }

    #[test]
    fn falls_back_when_a_difficulty_bucket_is_empty() {
        let candidates: Vec<LadderCandidate> = (0..5).map(|i| candidate(i, Difficulty::Easy)).collect();
        let ladder = regenerate_ladder("array", LadderRole::Other.ladder_size(), &candidates);
        assert_eq!(ladder.problems.len(), 5);
    }

    #[test]
    fn orders_easy_before_medium_before_hard() {
        let candidates = vec![
            candidate(1, Difficulty::Hard),
            candidate(2, Difficulty::Easy),
            candidate(3, Difficulty::Medium),
        ];
        let ladder = regenerate_ladder("array", LadderRole::Other.ladder_size(), &candidates);
        let difficulties: Vec<Difficulty> = ladder.problems.iter().map(|p| p.difficulty).collect();
        let mut sorted = difficulties.clone();
        sorted.sort();
        assert_eq!(difficulties, sorted);
    }
}
