//! Decay & Box model (spec §4.A) — pure functions only. None of these
//! suspend (§5): every timestamp they need is passed in explicitly rather
//! than read from a clock port, which is what makes them safe to call from
//! both the orchestration layer and property tests without a `Clock`.

use chrono::{DateTime, Duration, Utc};

/// Default stability used when a problem has none recorded yet.
pub const DEFAULT_STABILITY: f64 = 6.0;

/// Review interval, in days, per box level (spec §4.A).
const BOX_INTERVAL_DAYS: [i64; 8] = [1, 2, 4, 7, 14, 30, 60, 120];

fn interval_days(box_level: u8) -> i64 {
    let idx = box_level.clamp(1, 8) as usize - 1;
    BOX_INTERVAL_DAYS[idx]
}

/// Forgetting-curve retention score in `[0, 1]`.
///
/// Monotonically decreasing in elapsed days, increasing in `success_rate`
/// and `stability`. `exp(-Δdays / (stability * (0.5 + success_rate)))`,
/// clamped to `[0, 1]`. A problem never attempted (`last_attempt_date ==
/// None`) is fully retained by convention — there's nothing yet to forget.
pub fn decay_score(
    now: DateTime<Utc>,
    last_attempt_date: Option<DateTime<Utc>>,
    success_rate: f64,
    stability: f64,
) -> f64 {
    let Some(last) = last_attempt_date else {
        return 1.0;
    };

    let elapsed_days = (now - last).num_milliseconds() as f64 / 86_400_000.0;
    let elapsed_days = elapsed_days.max(0.0);
    let success_rate = success_rate.clamp(0.0, 1.0);
    let denom = stability.max(f64::EPSILON) * (0.5 + success_rate);

    (-elapsed_days / denom).exp().clamp(0.0, 1.0)
}

/// Next review timestamp for `box_level`, anchored at `last_attempt_date`.
/// A box-1 problem with no attempt history yet is due `now` — it's new.
pub fn next_review(
    now: DateTime<Utc>,
    box_level: u8,
    last_attempt_date: Option<DateTime<Utc>>,
) -> DateTime<Utc> {
    match last_attempt_date {
        Some(last) => last + Duration::days(interval_days(box_level)),
        None => now,
    }
}

/// Outcome of applying an attempt's result to a box level (spec §4.A).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxTransition {
    pub new_box: u8,
    pub consecutive_failures: u32,
    /// Set when three consecutive failures force the box back to 1 and
    /// demand an immediate review, overriding the normal interval table.
    pub force_immediate_review: bool,
}

/// A success increments the box (capped at 8) and clears the failure
/// streak. A failure resets the box to `max(1, current - 2)`, increments
/// the failure streak, and on the third consecutive failure forces the box
/// to 1 with an immediate review regardless of where the reset would
/// otherwise have landed.
pub fn box_transition(current_box: u8, success: bool, consecutive_failures: u32) -> BoxTransition {
    if success {
        return BoxTransition {
            new_box: (current_box + 1).min(8),
            consecutive_failures: 0,
            force_immediate_review: false,
        };
    }

    let consecutive_failures = consecutive_failures + 1;
    if consecutive_failures >= 3 {
        BoxTransition {
            new_box: 1,
            consecutive_failures,
            force_immediate_review: true,
        }
    } else {
        BoxTransition {
            new_box: current_box.saturating_sub(2).max(1),
            consecutive_failures,
            force_immediate_review: false,
        }
    }
}
