//! Session Assembler (spec §4.F) — the priority-ordered pipeline that
//! builds a session: triggered bridge reviews, then learning reviews, then
//! new problems, then passive mastered reviews, then a last-resort
//! fallback, each absorbing its own store errors except Priority 3 (§7).
//! A post-assembly guard rail can still rewrite the tail if recent
//! accuracy is poor and too many Hard problems slipped in.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use crate::config::EngineConfig;
use crate::decay;
use crate::domain::{Difficulty, Problem, SelectionReason, SessionProblem, SessionState, TagMastery};
use crate::ports::{AttemptLog, PatternLadderStore, ProblemCatalog, TagRelationshipStore, UserProblemStore};
use crate::scheduler;

pub struct Assembler<'a> {
    pub catalog: &'a dyn ProblemCatalog,
    pub user_problems: &'a dyn UserProblemStore,
    pub attempt_log: &'a dyn AttemptLog,
    pub tag_relationships: &'a dyn TagRelationshipStore,
    pub ladders: &'a dyn PatternLadderStore,
    pub config: &'a EngineConfig,
}

const TRIGGERED_REVIEW_LIMIT: usize = 2;
const RECENT_ATTEMPTS_WINDOW: usize = 100;
const RECENT_SESSIONS_FOR_TRIGGERS: usize = 2;

impl Assembler<'_> {
    /// Build at most `session_state.session_length` problems, deduplicated
    /// by `leetcode_id`, honoring the strict priority order. Never raises:
    /// a total failure degrades to an empty `Vec` (§7).
    #[instrument(skip(self, tag_mastery), fields(user_id, onboarding = session_state.is_onboarding()))]
    pub async fn build(&self, user_id: &str, session_state: &SessionState, tag_mastery: &[TagMastery], now: DateTime<Utc>) -> Vec<SessionProblem> {
        let mut session: Vec<SessionProblem> = Vec::new();
        let mut seen: BTreeSet<i64> = BTreeSet::new();
        let target = session_state.session_length;
        let onboarding = session_state.is_onboarding();

        if !onboarding {
            for sp in self.triggered_reviews(user_id, &seen, now).await {
                seen.insert(sp.problem.leetcode_id);
                session.push(sp);
            }
        }

        if !onboarding && session.len() < target {
            let remaining = target - session.len();
            let slots = ((remaining as f64) * 0.3).ceil() as usize;
            for sp in self.learning_reviews(user_id, &seen, slots, now).await {
                if session.len() >= target {
                    break;
                }
                seen.insert(sp.problem.leetcode_id);
                session.push(sp);
            }
        }

        if session.len() < target {
            let needed = target - session.len();
            for sp in self.new_problems(user_id, session_state, tag_mastery, &seen, needed, onboarding).await {
                if session.len() >= target {
                    break;
                }
                seen.insert(sp.problem.leetcode_id);
                session.push(sp);
            }
        }

        if session.len() < target {
            let remaining = target - session.len();
            for sp in self.passive_mastered(user_id, &seen, remaining, now).await {
                if session.len() >= target {
                    break;
                }
                seen.insert(sp.problem.leetcode_id);
                session.push(sp);
            }
        }

        if session.len() < target {
            let remaining = target - session.len();
            for sp in self.fallback(user_id, &seen, remaining, now).await {
                if session.len() >= target {
                    break;
                }
                seen.insert(sp.problem.leetcode_id);
                session.push(sp);
            }
        }

        if session.is_empty() {
            debug!("assembler produced an empty session");
        }

        self.apply_guard_rail(user_id, session, session_state, now).await
    }

    /// Priority 1 (§4.F): mastered problems strongly related to a recent
    /// failure. Errors degrade to zero contributions.
    async fn triggered_reviews(&self, user_id: &str, seen: &BTreeSet<i64>, _now: DateTime<Utc>) -> Vec<SessionProblem> {
        let attempts = match self.attempt_log.list_by_recency(user_id, RECENT_ATTEMPTS_WINDOW).await {
            Ok(a) => a,
            Err(err) => {
                warn!(error = %err, "priority 1: attempt log unavailable, contributing zero triggered reviews");
                return Vec::new();
            }
        };

        let mut session_order: Vec<uuid::Uuid> = Vec::new();
        for a in &attempts {
            if let Some(sid) = a.session_id {
                if !session_order.contains(&sid) {
                    session_order.push(sid);
                }
            }
            if session_order.len() >= RECENT_SESSIONS_FOR_TRIGGERS {
                break;
            }
        }
        let recent_sessions: BTreeSet<uuid::Uuid> = session_order.into_iter().collect();

        let mut failed_ids: Vec<i64> = Vec::new();
        for a in &attempts {
            let in_window = a.session_id.map(|sid| recent_sessions.contains(&sid)).unwrap_or(false);
            if in_window && !a.success {
                match self.user_problems.get_by_problem_id(user_id, a.problem_id).await {
                    Ok(Some(up)) => failed_ids.push(up.leetcode_id),
                    Ok(None) => {}
                    Err(err) => warn!(error = %err, "priority 1: could not resolve failed problem"),
                }
            }
        }
        failed_ids.dedup();

        // (summed weight, strongest single contributor, that contributor's weight)
        let mut aggregate: std::collections::HashMap<i64, (f64, i64, f64)> = std::collections::HashMap::new();
        for &failed_id in &failed_ids {
            let edges = match self.catalog.related_problems(failed_id).await {
                Ok(e) => e,
                Err(err) => {
                    warn!(error = %err, "priority 1: relationship graph unavailable for one failure");
                    continue;
                }
            };
            for (candidate_id, weight) in edges {
                if seen.contains(&candidate_id) {
                    continue;
                }
                let entry = aggregate.entry(candidate_id).or_insert((0.0, failed_id, 0.0));
                entry.0 += weight;
                if weight > entry.2 {
                    entry.1 = failed_id;
                    entry.2 = weight;
                }
            }
        }

        let mut candidates: Vec<(i64, f64, i64)> = Vec::new();
        for (candidate_id, (strength, triggered_by, _)) in aggregate {
            if strength <= self.config.triggered_review_threshold {
                continue;
            }
            match self.user_problems.get(user_id, candidate_id).await {
                Ok(Some(up)) if up.is_mastered() => candidates.push((candidate_id, strength, triggered_by)),
                Ok(_) => {}
                Err(err) => warn!(error = %err, "priority 1: could not check candidate mastery"),
            }
        }
        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        candidates.truncate(TRIGGERED_REVIEW_LIMIT);

        let mut out = Vec::new();
        for (candidate_id, strength, triggered_by) in candidates {
            match self.catalog.get_by_id(candidate_id).await {
                Ok(Some(problem)) => out.push(SessionProblem {
                    problem,
                    selection_reason: SelectionReason::triggered("bridge review for recent failure", triggered_by, strength),
                }),
                Ok(None) => {}
                Err(err) => warn!(error = %err, "priority 1: candidate problem lookup failed"),
            }
        }
        out
    }

    /// Priority 2 (§4.F): due learning-box reviews, ≈30% of remaining
    /// slots. Errors degrade to zero contributions.
    async fn learning_reviews(&self, user_id: &str, seen: &BTreeSet<i64>, slots: usize, now: DateTime<Utc>) -> Vec<SessionProblem> {
        if slots == 0 {
            return Vec::new();
        }
        let rows = match self.user_problems.list(user_id).await {
            Ok(r) => r,
            Err(err) => {
                warn!(error = %err, "priority 2: user-problem store unavailable, contributing zero learning reviews");
                return Vec::new();
            }
        };
        let due = scheduler::due_schedule(&rows, now);
        let learning = scheduler::learning_due(&due);

        let mut out = Vec::new();
        for review in learning {
            if out.len() >= slots {
                break;
            }
            let leetcode_id = review.user_problem.leetcode_id;
            if seen.contains(&leetcode_id) {
                continue;
            }
            match self.catalog.get_by_id(leetcode_id).await {
                Ok(Some(problem)) => out.push(SessionProblem {
                    problem,
                    selection_reason: SelectionReason::new(
                        crate::domain::SelectionReasonType::LearningReview,
                        format!("due in box {}", review.user_problem.box_level),
                    ),
                }),
                Ok(None) => {}
                Err(err) => warn!(error = %err, "priority 2: catalog lookup failed"),
            }
        }
        out
    }

    /// Priority 3 (§4.F): new problems, scored by the optimal-path
    /// function (§9 Open Question) for non-onboarding sessions, taken in
    /// catalog order during onboarding. The only priority allowed to
    /// degrade assembly to a partial session rather than just contributing
    /// zero (§7) — a catalog failure here simply yields no candidates.
    async fn new_problems(
        &self,
        user_id: &str,
        session_state: &SessionState,
        tag_mastery: &[TagMastery],
        seen: &BTreeSet<i64>,
        needed: usize,
        onboarding: bool,
    ) -> Vec<SessionProblem> {
        if needed == 0 {
            return Vec::new();
        }

        let attempted = match self.user_problems.list(user_id).await {
            Ok(rows) => rows.into_iter().map(|r| r.leetcode_id).collect::<Vec<_>>(),
            Err(_) => Vec::new(),
        };
        let mut exclude: Vec<i64> = attempted;
        exclude.extend(seen.iter().copied());

        let limit = (needed * 3).min(50);
        let candidates = match self
            .catalog
            .list_with_filter(&session_state.current_allowed_tags, session_state.current_difficulty_cap, &exclude, limit)
            .await
        {
            Ok(c) => c,
            Err(err) => {
                warn!(error = %err, "priority 3: catalog fetch failed, returning partially assembled session");
                return Vec::new();
            }
        };

        let ordered: Vec<Problem> = if onboarding {
            candidates
        } else {
            self.score_and_rank(candidates, session_state, tag_mastery)
        };

        ordered
            .into_iter()
            .take(needed)
            .map(|problem| SessionProblem {
                problem,
                selection_reason: SelectionReason::new(crate::domain::SelectionReasonType::New, "new problem on the learning path"),
            })
            .collect()
    }

    fn score_and_rank(&self, candidates: Vec<Problem>, session_state: &SessionState, tag_mastery: &[TagMastery]) -> Vec<Problem> {
        let weights = self.config.optimal_path_weights;
        let mastery_by_tag: std::collections::HashMap<&str, &TagMastery> =
            tag_mastery.iter().map(|m| (m.tag.as_str(), m)).collect();
        let focus_tags: BTreeSet<&str> = session_state.current_allowed_tags.iter().map(|t| t.as_str()).collect();

        let mut scored: Vec<(Problem, f64)> = candidates
            .into_iter()
            .map(|problem| {
                let mastery_need: f64 = problem
                    .tags
                    .iter()
                    .map(|t| 1.0 - mastery_by_tag.get(t.as_str()).map(|m| m.success_rate()).unwrap_or(0.0))
                    .sum::<f64>()
                    .max(0.0);
                let focus_overlap = problem.tags.iter().filter(|t| focus_tags.contains(t.as_str())).count();
                let relationship_strength = focus_overlap as f64;
                let focus_bonus = if focus_overlap > 0 { 1.0 } else { 0.0 };

                let score = weights.mastery_need * mastery_need
                    + weights.relationship_strength * relationship_strength
                    + weights.focus_bonus * focus_bonus;
                (problem, score)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.leetcode_id.cmp(&b.0.leetcode_id))
        });
        scored.into_iter().map(|(p, _)| p).collect()
    }

    /// Priority 4 (§4.F): passive mastered reviews, only if the session is
    /// still under-length after new problems. Errors degrade to zero.
    async fn passive_mastered(&self, user_id: &str, seen: &BTreeSet<i64>, remaining: usize, now: DateTime<Utc>) -> Vec<SessionProblem> {
        if remaining == 0 {
            return Vec::new();
        }
        let rows = match self.user_problems.list(user_id).await {
            Ok(r) => r,
            Err(err) => {
                warn!(error = %err, "priority 4: user-problem store unavailable, contributing zero passive reviews");
                return Vec::new();
            }
        };
        let due = scheduler::due_schedule(&rows, now);
        let mastered = scheduler::mastered_due(&due);

        let mut out = Vec::new();
        for review in mastered {
            if out.len() >= remaining {
                break;
            }
            let leetcode_id = review.user_problem.leetcode_id;
            if seen.contains(&leetcode_id) {
                continue;
            }
            match self.catalog.get_by_id(leetcode_id).await {
                Ok(Some(problem)) => out.push(SessionProblem {
                    problem,
                    selection_reason: SelectionReason::new(crate::domain::SelectionReasonType::PassiveMastered, "mastered review to fill the session"),
                }),
                Ok(None) => {}
                Err(err) => warn!(error = %err, "priority 4: catalog lookup failed"),
            }
        }
        out
    }

    /// Fallback (§4.F): any already-attempted problem not yet in the
    /// session, oldest-due and stalest first. Errors degrade to zero.
    async fn fallback(&self, user_id: &str, seen: &BTreeSet<i64>, remaining: usize, now: DateTime<Utc>) -> Vec<SessionProblem> {
        if remaining == 0 {
            return Vec::new();
        }
        let rows = match self.user_problems.list(user_id).await {
            Ok(r) => r,
            Err(err) => {
                warn!(error = %err, "fallback: user-problem store unavailable, contributing zero fallback reviews");
                return Vec::new();
            }
        };

        let mut candidates: Vec<_> = rows
            .into_iter()
            .filter(|up| !seen.contains(&up.leetcode_id))
            .map(|up| {
                let decay = decay::decay_score(now, up.last_attempt_date, up.success_rate(), up.stability);
                (up, decay)
            })
            .collect();
        candidates.sort_by(|a, b| {
            a.0.review_schedule
                .cmp(&b.0.review_schedule)
                .then(a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        });

        let mut out = Vec::new();
        for (up, _) in candidates {
            if out.len() >= remaining {
                break;
            }
            match self.catalog.get_by_id(up.leetcode_id).await {
                Ok(Some(problem)) => out.push(SessionProblem {
                    problem,
                    selection_reason: SelectionReason::new(crate::domain::SelectionReasonType::Fallback, "no other priority had slots left"),
                }),
                Ok(None) => {}
                Err(err) => warn!(error = %err, "fallback: catalog lookup failed"),
            }
        }
        out
    }

    /// Post-assembly guard rail (§4.F, §9): if recent accuracy is poor and
    /// too many Hard problems slipped through, trim the excess from the
    /// tail and backfill with softer problems from related-tag ladders.
    async fn apply_guard_rail(&self, user_id: &str, mut session: Vec<SessionProblem>, session_state: &SessionState, _now: DateTime<Utc>) -> Vec<SessionProblem> {
        if session_state.last_performance.accuracy > self.config.guard_rail_accuracy_threshold {
            return session;
        }

        let max_hard = ((session.len() as f64) * self.config.guard_rail_hard_fraction).floor() as usize;
        let hard_count = session.iter().filter(|sp| sp.problem.difficulty == Difficulty::Hard).count();
        if hard_count <= max_hard {
            return session;
        }

        let mut excess = hard_count - max_hard;
        let mut removed_at = Vec::new();
        for idx in (0..session.len()).rev() {
            if excess == 0 {
                break;
            }
            if session[idx].problem.difficulty == Difficulty::Hard {
                removed_at.push(idx);
                excess -= 1;
            }
        }

        let session_tags: BTreeSet<String> = session.iter().flat_map(|sp| sp.problem.tags.iter().cloned()).collect();
        let related_tags = self.related_tags_by_weight(&session_tags).await;
        let seen: BTreeSet<i64> = session.iter().map(|sp| sp.problem.leetcode_id).collect();

        let mut replacements = Vec::new();
        for &target_difficulty in &[Difficulty::Medium, Difficulty::Easy] {
            if replacements.len() >= removed_at.len() {
                break;
            }
            for tag in &related_tags {
                if replacements.len() >= removed_at.len() {
                    break;
                }
                if let Ok(Some(ladder)) = self.ladders.get(user_id, tag).await {
                    for entry in &ladder.problems {
                        if replacements.len() >= removed_at.len() {
                            break;
                        }
                        if entry.attempted || entry.difficulty != target_difficulty || seen.contains(&entry.leetcode_id) {
                            continue;
                        }
                        if let Ok(Some(problem)) = self.catalog.get_by_id(entry.leetcode_id).await {
                            replacements.push(SessionProblem {
                                problem,
                                selection_reason: SelectionReason::new(
                                    crate::domain::SelectionReasonType::New,
                                    "guard rail replacement for a trimmed hard problem",
                                ),
                            });
                        }
                    }
                }
            }
        }

        for (slot, idx) in removed_at.into_iter().enumerate() {
            if let Some(replacement) = replacements.get(slot).cloned() {
                session[idx] = replacement;
            } else {
                session.remove(idx);
            }
        }

        session
    }

    async fn related_tags_by_weight(&self, session_tags: &BTreeSet<String>) -> Vec<String> {
        let mut weighted: std::collections::HashMap<String, f64> = std::collections::HashMap::new();
        for tag in session_tags {
            if let Ok(Some(rel)) = self.tag_relationships.get(tag).await {
                for (related_tag, weight) in rel.related {
                    if !session_tags.contains(&related_tag) {
                        *weighted.entry(related_tag).or_insert(0.0) += weight;
                    }
                }
            }
        }
        let mut ranked: Vec<(String, f64)> = weighted.into_iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.into_iter().map(|(t, _)| t).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_slot_rounding_matches_spec_example() {
        let remaining = 7usize;
        let slots = ((remaining as f64) * 0.3).ceil() as usize;
        assert_eq!(slots, 3);
    }
}
