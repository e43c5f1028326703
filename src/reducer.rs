//! Post-Session Reducer (spec §4.G). Folds a completed session's attempts
//! into per-problem box transitions, recomputes mastery for every touched
//! tag, derives the session's analytics record, advances `SessionState`,
//! and marks pattern-ladder entries attempted. Unlike the Assembler, a
//! store failure here propagates rather than degrades — reducing a session
//! is a write path, and a partial reduce would corrupt the user's state
//! (see DESIGN.md).

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};
use tracing::instrument;

use crate::decay;
use crate::domain::{
    Difficulty, EngineError, EngineResult, LastPerformance, MasteryDelta, PatternLadder, Problem, Session,
    SessionAnalytics, SessionState, TagMastery, UserProblem,
};
use crate::ladders::{self, LadderCandidate};
use crate::mastery::{self, TagMasteryInput};
use crate::ports::{PatternLadderStore, ProblemCatalog, TagMasteryStore, TagRelationshipStore, UserProblemStore};
use crate::tier;

const FAILURE_COOLDOWN_HOURS: i64 = 4;
const MAX_STABILITY_DAYS: f64 = 365.0;
const WEAK_TAG_SUCCESS_RATE: f64 = 0.5;
const EFFICIENCY_BASELINE_SECONDS: f64 = 300.0;

pub struct Reducer<'a> {
    pub catalog: &'a dyn ProblemCatalog,
    pub user_problems: &'a dyn UserProblemStore,
    pub tag_mastery_store: &'a dyn TagMasteryStore,
    pub tag_relationships: &'a dyn TagRelationshipStore,
    pub ladders: &'a dyn PatternLadderStore,
}

/// Everything the reducer computed, left for the caller (the engine) to
/// persist inside one logical write — the reducer itself never calls a
/// `put`.
pub struct ReducerOutcome {
    pub updated_user_problems: Vec<UserProblem>,
    pub updated_tag_mastery: Vec<TagMastery>,
    pub mastery_deltas: Vec<MasteryDelta>,
    pub analytics: SessionAnalytics,
    pub next_session_state: SessionState,
    pub updated_ladders: Vec<PatternLadder>,
}

impl Reducer<'_> {
    #[instrument(skip(self, session, session_state), fields(session_id = %session.session_id))]
    pub async fn reduce(
        &self,
        user_id: &str,
        session: &Session,
        session_state: &SessionState,
        now: DateTime<Utc>,
    ) -> EngineResult<ReducerOutcome> {
        let problem_by_leetcode_id = self.load_problems_for_session(session).await?;

        let (updated_user_problems, leetcode_id_by_problem_id) =
            self.apply_box_transitions(user_id, session, now).await?;

        let touched_tags = self.touched_tags(session, &problem_by_leetcode_id, &leetcode_id_by_problem_id);

        let (updated_tag_mastery, mastery_deltas) = self
            .recompute_touched_tags(user_id, &touched_tags, &updated_user_problems, now)
            .await?;

        let analytics = self.compute_analytics(session, &updated_tag_mastery, &touched_tags, now);

        let next_session_state = self
            .advance_session_state(user_id, session_state, &analytics, &updated_tag_mastery, now)
            .await?;

        let updated_ladders = self
            .update_ladders(user_id, &touched_tags, &leetcode_id_by_problem_id, session, now)
            .await?;

        Ok(ReducerOutcome {
            updated_user_problems,
            updated_tag_mastery,
            mastery_deltas,
            analytics,
            next_session_state,
            updated_ladders,
        })
    }

    async fn load_problems_for_session(&self, session: &Session) -> EngineResult<HashMap<i64, Problem>> {
        let mut problems = HashMap::new();
        for sp in &session.problems {
            let leetcode_id = sp.problem.leetcode_id;
            if !problems.contains_key(&leetcode_id) {
                problems.insert(leetcode_id, sp.problem.clone());
            }
        }
        Ok(problems)
    }

    /// Step 1 (§4.G): fold every attempt into its `UserProblem` row, in
    /// recorded order, so repeated attempts on the same problem within one
    /// session chain through successive box transitions correctly.
    async fn apply_box_transitions(
        &self,
        user_id: &str,
        session: &Session,
        now: DateTime<Utc>,
    ) -> EngineResult<(Vec<UserProblem>, HashMap<uuid::Uuid, i64>)> {
        let mut rows: HashMap<uuid::Uuid, UserProblem> = HashMap::new();
        let mut leetcode_id_by_problem_id: HashMap<uuid::Uuid, i64> = HashMap::new();

        for attempt in &session.attempts {
            let up = match rows.get(&attempt.problem_id) {
                Some(up) => up.clone(),
                None => self
                    .user_problems
                    .get_by_problem_id(user_id, attempt.problem_id)
                    .await?
                    .ok_or_else(|| EngineError::InternalInvariant(format!("no user_problem row for attempt {}", attempt.attempt_id)))?,
            };
            leetcode_id_by_problem_id.insert(attempt.problem_id, up.leetcode_id);

            let updated = self.fold_attempt(up, attempt.success, attempt.perceived_difficulty, attempt.attempt_date, now);
            rows.insert(attempt.problem_id, updated);
        }

        Ok((rows.into_values().collect(), leetcode_id_by_problem_id))
    }

    fn fold_attempt(&self, mut up: UserProblem, success: bool, perceived_difficulty: f64, attempt_date: DateTime<Utc>, now: DateTime<Utc>) -> UserProblem {
        up.attempt_stats.record(success);

        let transition = decay::box_transition(up.box_level, success, up.consecutive_failures);
        up.box_level = transition.new_box;
        up.consecutive_failures = transition.consecutive_failures;
        up.last_attempt_date = Some(attempt_date);
        up.perceived_difficulty = (up.perceived_difficulty + perceived_difficulty) / 2.0;

        up.stability = if success {
            (up.stability * 1.2).min(MAX_STABILITY_DAYS)
        } else {
            (up.stability * 0.5).max(decay::DEFAULT_STABILITY / 2.0)
        };

        if transition.force_immediate_review {
            up.review_schedule = now;
            up.cooldown_until = None;
        } else if success {
            up.review_schedule = decay::next_review(now, up.box_level, up.last_attempt_date);
            up.cooldown_until = None;
        } else {
            up.review_schedule = decay::next_review(now, up.box_level, up.last_attempt_date);
            up.cooldown_until = Some(now + Duration::hours(FAILURE_COOLDOWN_HOURS));
        }

        up
    }

    fn touched_tags(
        &self,
        session: &Session,
        problem_by_leetcode_id: &HashMap<i64, Problem>,
        leetcode_id_by_problem_id: &HashMap<uuid::Uuid, i64>,
    ) -> BTreeSet<String> {
        let mut tags = BTreeSet::new();
        for attempt in &session.attempts {
            if let Some(&leetcode_id) = leetcode_id_by_problem_id.get(&attempt.problem_id) {
                if let Some(problem) = problem_by_leetcode_id.get(&leetcode_id) {
                    tags.extend(problem.tags.iter().cloned());
                }
            }
        }
        tags
    }

    /// Step 2 (§4.G): full recompute per touched tag, never an incremental
    /// patch — a tag's mastery always reflects every attempted problem it
    /// carries, not just this session's.
    async fn recompute_touched_tags(
        &self,
        user_id: &str,
        touched_tags: &BTreeSet<String>,
        updated_user_problems: &[UserProblem],
        now: DateTime<Utc>,
    ) -> EngineResult<(Vec<TagMastery>, Vec<MasteryDelta>)> {
        if touched_tags.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        let mut all_rows = self.user_problems.list(user_id).await?;
        for updated in updated_user_problems {
            if let Some(existing) = all_rows.iter_mut().find(|r| r.problem_id == updated.problem_id) {
                *existing = updated.clone();
            } else {
                all_rows.push(updated.clone());
            }
        }

        let mut problem_cache: HashMap<i64, Option<Problem>> = HashMap::new();
        let mut results = Vec::new();
        let mut deltas = Vec::new();

        for tag in touched_tags {
            let mut members = Vec::new();
            for up in &all_rows {
                if !problem_cache.contains_key(&up.leetcode_id) {
                    let fetched = self.catalog.get_by_id(up.leetcode_id).await?;
                    problem_cache.insert(up.leetcode_id, fetched);
                }
            }
            for up in &all_rows {
                if let Some(Some(problem)) = problem_cache.get(&up.leetcode_id) {
                    if problem.tags.contains(tag) {
                        members.push((up, problem));
                    }
                }
            }

            let previous = self.tag_mastery_store.get(user_id, tag).await?;
            let recomputed = mastery::recompute_tag_mastery(TagMasteryInput {
                tag,
                members,
                previous: previous.as_ref(),
                now,
            });

            let delta = MasteryDelta {
                tag: tag.clone(),
                pre_mastered: previous.as_ref().map(|p| p.mastered).unwrap_or(false),
                post_mastered: recomputed.mastered,
                strength_delta: recomputed.total_attempts as i64 - previous.as_ref().map(|p| p.total_attempts as i64).unwrap_or(0),
                decay_delta: recomputed.decay_score - previous.as_ref().map(|p| p.decay_score).unwrap_or(0.0),
            };
            if !delta.is_no_op() {
                deltas.push(delta);
            }
            results.push(recomputed);
        }

        Ok((results, deltas))
    }

    /// Step 3 (§4.G): the session's analytics record.
    fn compute_analytics(&self, session: &Session, updated_tag_mastery: &[TagMastery], touched_tags: &BTreeSet<String>, now: DateTime<Utc>) -> SessionAnalytics {
        let total = session.attempts.len();
        let successes = session.attempts.iter().filter(|a| a.success).count();
        let accuracy = if total == 0 { 0.0 } else { successes as f64 / total as f64 };
        let avg_time_seconds = if total == 0 {
            0.0
        } else {
            session.attempts.iter().map(|a| a.time_spent_seconds as f64).sum::<f64>() / total as f64
        };

        let mastery_by_tag: HashMap<&str, &TagMastery> = updated_tag_mastery.iter().map(|m| (m.tag.as_str(), m)).collect();
        let mut strong_tags: Vec<String> = Vec::new();
        let mut weak_tags: Vec<String> = Vec::new();
        for tag in touched_tags {
            match mastery_by_tag.get(tag.as_str()) {
                Some(m) if m.mastered => strong_tags.push(tag.clone()),
                Some(m) if m.success_rate() < WEAK_TAG_SUCCESS_RATE => weak_tags.push(tag.clone()),
                _ => {}
            }
        }

        let mut difficulty_counts: HashMap<Difficulty, usize> = HashMap::new();
        for sp in &session.problems {
            *difficulty_counts.entry(sp.problem.difficulty).or_insert(0) += 1;
        }
        let predominant_difficulty = difficulty_counts
            .into_iter()
            .max_by_key(|(_, count)| *count)
            .map(|(d, _)| d)
            .unwrap_or(Difficulty::Easy);

        SessionAnalytics {
            session_id: session.session_id,
            completed_at: now,
            accuracy,
            avg_time_seconds,
            strong_tags,
            weak_tags,
            predominant_difficulty,
        }
    }

    /// Step 5 (§4.G): record this session's outcome into `SessionState` and
    /// advance the tier-progression engine (§4.C) — components A/B/C's
    /// share of the session-end data flow (§2: "attempt log → G → (A, B, C
    /// updates) → next E call sees new state"). The Adaptive Session
    /// Settings state machine (§4.E) itself is *not* run here: it needs the
    /// real elapsed time since the user's most recent attempt, which is
    /// only meaningful at the next `start_session` call, not at the instant
    /// this session's last attempt was just recorded (that gap is always
    /// zero). `Engine::start_session` runs §4.E against the session state
    /// this step produces.
    async fn advance_session_state(
        &self,
        user_id: &str,
        session_state: &SessionState,
        analytics: &SessionAnalytics,
        updated_tag_mastery: &[TagMastery],
        now: DateTime<Utc>,
    ) -> EngineResult<SessionState> {
        let efficiency_score = (1.0 - (analytics.avg_time_seconds / EFFICIENCY_BASELINE_SECONDS).min(1.0)).max(0.0);

        let relationships = self.tag_relationships.list().await?;
        let mastery = self.merged_mastery(user_id, updated_tag_mastery).await?;
        let tier_snapshot = tier::evaluate_tier(&relationships, &mastery, session_state.tier_started_at, now);

        let mut next = session_state.clone();
        next.num_sessions_completed += 1;
        next.last_performance = LastPerformance {
            accuracy: analytics.accuracy,
            efficiency_score,
        };
        next.current_tier = tier_snapshot.current_tier;
        next.tier_started_at = if tier_snapshot.advanced_by_time_escape {
            now
        } else {
            session_state.tier_started_at
        };

        Ok(next)
    }

    /// The persisted `TagMastery` rows, overlaid with this reduce pass's
    /// not-yet-persisted recomputations — so the tier engine sees this
    /// session's mastery changes immediately rather than the state before
    /// this reduce began.
    async fn merged_mastery(&self, user_id: &str, updated: &[TagMastery]) -> EngineResult<Vec<TagMastery>> {
        let mut rows = self.tag_mastery_store.list(user_id).await?;
        for tag_mastery in updated {
            if let Some(existing) = rows.iter_mut().find(|r| r.tag == tag_mastery.tag) {
                *existing = tag_mastery.clone();
            } else {
                rows.push(tag_mastery.clone());
            }
        }
        Ok(rows)
    }

    /// Step 6 (§4.G): mark attempted ladder entries, regenerating a ladder
    /// once every entry in it has been attempted (§4.H).
    async fn update_ladders(
        &self,
        user_id: &str,
        touched_tags: &BTreeSet<String>,
        leetcode_id_by_problem_id: &HashMap<uuid::Uuid, i64>,
        session: &Session,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<PatternLadder>> {
        let attempted_ids: BTreeSet<i64> = leetcode_id_by_problem_id.values().copied().collect();
        let mut updated = Vec::new();

        for tag in touched_tags {
            let Some(mut ladder) = self.ladders.get(user_id, tag).await? else {
                continue;
            };
            for &leetcode_id in &attempted_ids {
                ladder.mark_attempted(leetcode_id);
            }

            if ladder.all_attempted() {
                ladder = self.regenerate_ladder_for_tag(tag, &ladder, session, now).await?;
            }

            updated.push(ladder);
        }

        Ok(updated)
    }

    async fn regenerate_ladder_for_tag(&self, tag: &str, previous: &PatternLadder, _session: &Session, now: DateTime<Utc>) -> EngineResult<PatternLadder> {
        let exclude: Vec<i64> = previous.problems.iter().map(|p| p.leetcode_id).collect();
        let candidates = self
            .catalog
            .list_with_filter(&[tag.to_string()], Difficulty::Hard, &exclude, 64)
            .await?;

        let ladder_candidates: Vec<LadderCandidate> = candidates
            .into_iter()
            .map(|problem| {
                let decay_score = decay::decay_score(now, None, 0.0, decay::DEFAULT_STABILITY);
                LadderCandidate {
                    problem,
                    decay_score,
                    connections: Vec::new(),
                }
            })
            .collect();

        Ok(ladders::regenerate_ladder(tag, previous.ladder_size, &ladder_candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn efficiency_score_rewards_speed() {
        let fast = (1.0 - (60.0_f64 / EFFICIENCY_BASELINE_SECONDS).min(1.0)).max(0.0);
        let slow = (1.0 - (600.0_f64 / EFFICIENCY_BASELINE_SECONDS).min(1.0)).max(0.0);
        assert!(fast > slow);
        assert_eq!(slow, 0.0);
    }
}
