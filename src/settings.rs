//! Adaptive Session Settings state machine (spec §4.E). Computes the next
//! session's configuration from the previous `SessionState`, the
//! performance just recorded, and how long it's been since the user last
//! practiced. The output *is* the new `SessionState` once the caller
//! persists it — there is no separate "settings record" type.

use chrono::{DateTime, Utc};

use crate::domain::{Difficulty, PromotionType, SessionState};

const ONBOARDING_SESSIONS: u32 = 3;
const PROMOTION_ACCURACY: f64 = 0.85;
const PROMOTION_EFFICIENCY: f64 = 0.7;
const PROMOTION_RECENCY_DAYS: i64 = 3;
const DEMOTION_ACCURACY: f64 = 0.5;
const DEMOTION_RECENCY_DAYS: i64 = 5;
const MAX_SESSION_LENGTH: usize = 10;
const MAX_NEW_PROBLEMS: usize = 7;
const DEMOTED_SESSION_LENGTH: usize = 5;

const TAG_WIDTH_EXPANSION_MIN_SESSIONS: u32 = 3;
const TAG_WIDTH_EXPANSION_ACCURACY: f64 = 0.7;
const TAG_WIDTH_EXPANSION_EFFICIENCY: f64 = 0.6;
const TAG_WIDTH_STAGNATION_SESSIONS: u32 = 5;

const DIFFICULTY_STAGNATION_SESSIONS: u32 = 10;

fn days_since(now: DateTime<Utc>, last: Option<DateTime<Utc>>) -> i64 {
    last.map(|d| (now - d).num_days()).unwrap_or(i64::MAX)
}

/// `current` is treated as malformed (and discarded in favor of onboarding
/// defaults) only when it's internally inconsistent in a way a valid prior
/// call could never produce — the spec's "never crash" guarantee, not a
/// license to reinterpret legitimate low values.
fn is_malformed(current: &SessionState) -> bool {
    current.session_length == 0 || current.new_problem_count == 0
}

/// Compute the next `SessionState` (spec §4.E). `focus_tags` is the
/// current tier's focus-tag ordering (§4.C `TierSnapshot::focus_tags`);
/// `last_attempt_date` is the timestamp of the user's most recent attempt
/// across all problems, as seen at the moment a new session is about to
/// start — the Post-Session Reducer (§4.G) already incremented
/// `num_sessions_completed` and recorded `last_performance` when the prior
/// session completed, so this function only derives the settings that
/// depend on it, never the counter itself.
pub fn compute_settings(
    current: &SessionState,
    focus_tags: &[String],
    now: DateTime<Utc>,
    last_attempt_date: Option<DateTime<Utc>>,
) -> SessionState {
    if is_malformed(current) {
        return onboarding_with_tags(now, focus_tags);
    }

    let days_since_last = days_since(now, last_attempt_date);

    let (session_length, new_problem_count, difficulty_cap, promoted) = if current.is_onboarding() {
        (4, 4, Difficulty::Easy, false)
    } else if current.last_performance.accuracy >= PROMOTION_ACCURACY
        && current.last_performance.efficiency_score >= PROMOTION_EFFICIENCY
        && days_since_last <= PROMOTION_RECENCY_DAYS
    {
        (
            (current.session_length + 1).min(MAX_SESSION_LENGTH),
            (current.new_problem_count + 1).min(MAX_NEW_PROBLEMS),
            current.current_difficulty_cap.promote(),
            true,
        )
    } else if current.last_performance.accuracy <= DEMOTION_ACCURACY && days_since_last >= DEMOTION_RECENCY_DAYS {
        (
            DEMOTED_SESSION_LENGTH.min(current.session_length),
            1,
            Difficulty::Easy,
            false,
        )
    } else {
        (current.session_length, current.new_problem_count, current.current_difficulty_cap, false)
    };

    let (difficulty_cap, escape_hatches_difficulty, promotion_type) = apply_difficulty_escape_hatch(
        current,
        difficulty_cap,
        promoted,
    );

    let (tag_index, sessions_at_current_tag_count) = next_tag_window(current, focus_tags.len());
    let current_allowed_tags = focus_tags.iter().take(tag_index + 1).cloned().collect();

    SessionState {
        num_sessions_completed: current.num_sessions_completed,
        current_difficulty_cap: difficulty_cap,
        tag_index,
        session_length,
        new_problem_count,
        current_allowed_tags,
        last_performance: current.last_performance,
        escape_hatches: crate::domain::EscapeHatches {
            sessions_at_current_difficulty: escape_hatches_difficulty,
            sessions_without_promotion: if promotion_type.is_some() {
                0
            } else {
                current.escape_hatches.sessions_without_promotion
            },
            activated: current.escape_hatches.activated.clone(),
            current_promotion_type: promotion_type,
        },
        sessions_at_current_tag_count,
        current_tier: current.current_tier,
        tier_started_at: current.tier_started_at,
    }
}

/// Session-based escape hatch (§4.E): 10 sessions stuck at the same
/// difficulty forces a promotion attempt even if the normal accuracy/
/// efficiency gate didn't fire. Resets the stagnation counter whenever a
/// promotion actually lands (normally or via the hatch).
fn apply_difficulty_escape_hatch(
    current: &SessionState,
    computed_cap: Difficulty,
    already_promoted: bool,
) -> (Difficulty, u32, Option<PromotionType>) {
    let hatch_forces_promotion =
        !already_promoted && current.escape_hatches.sessions_at_current_difficulty >= DIFFICULTY_STAGNATION_SESSIONS;

    let (cap, promoted) = if hatch_forces_promotion {
        (current.current_difficulty_cap.promote(), true)
    } else {
        (computed_cap, already_promoted)
    };

    let changed = cap != current.current_difficulty_cap;
    let counter = if changed {
        0
    } else {
        current.escape_hatches.sessions_at_current_difficulty + 1
    };
    let promotion_type = if promoted || changed { Some(PromotionType::Difficulty) } else { None };

    (cap, counter, promotion_type)
}

/// Tag-width progression (§4.E): expand after 3+ sessions at the current
/// width if accuracy *or* efficiency cleared their bar (OR-based), or
/// force-expand unconditionally at 5 sessions of stagnation.
fn next_tag_window(current: &SessionState, focus_tag_count: usize) -> (usize, u32) {
    let max_index = focus_tag_count.saturating_sub(1);
    if max_index == 0 {
        return (0, current.sessions_at_current_tag_count + 1);
    }

    let stagnating = current.sessions_at_current_tag_count >= TAG_WIDTH_STAGNATION_SESSIONS;
    let performance_cleared = current.sessions_at_current_tag_count >= TAG_WIDTH_EXPANSION_MIN_SESSIONS
        && (current.last_performance.accuracy >= TAG_WIDTH_EXPANSION_ACCURACY
            || current.last_performance.efficiency_score >= TAG_WIDTH_EXPANSION_EFFICIENCY);

    if stagnating || performance_cleared {
        let next_index = (current.tag_index + 1).min(max_index);
        let changed = next_index != current.tag_index;
        (next_index, if changed { 0 } else { current.sessions_at_current_tag_count + 1 })
    } else {
        (current.tag_index, current.sessions_at_current_tag_count + 1)
    }
}

fn onboarding_with_tags(now: DateTime<Utc>, focus_tags: &[String]) -> SessionState {
    let mut defaults = SessionState::onboarding_defaults(now);
    defaults.current_allowed_tags = focus_tags.iter().take(1).cloned().collect();
    defaults
}
