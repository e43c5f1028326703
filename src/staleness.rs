//! Stale-session classifier (spec §6, bit-exact table). A session that's
//! been sitting in `in_progress` needs a verdict on what to do with it
//! before `start_session()` can decide whether to resume it, expire it, or
//! hand back a fresh one.

use chrono::{DateTime, Utc};

use crate::domain::{Session, SessionStatus, StalenessClass, StalenessClassification};

const INTERVIEW_FRESH_HOURS: i64 = 3;
const STANDARD_FRESH_HOURS: i64 = 6;
const GENERATOR_ABANDONED_HOURS: i64 = 24;
const GENERATOR_AUTO_COMPLETE_HOURS: i64 = 12;
const GENERATOR_STALLED_HOURS: i64 = 48;
const GENERATOR_TRACKING_ONLY_HOURS: i64 = 12;
const AUTO_COMPLETE_PROGRESS: f64 = 0.75;

fn hours_stale(session: &Session, now: DateTime<Utc>) -> i64 {
    (now - session.last_activity_time).num_minutes() / 60
}

fn progress_ratio(session: &Session) -> f64 {
    if session.problems.is_empty() {
        0.0
    } else {
        session.attempts.len() as f64 / session.problems.len() as f64
    }
}

/// `has_outside_session_activity` reports whether the user has recorded
/// attempts elsewhere while this session sat idle — the classifier can't
/// see that from the `Session` alone, so the caller (which has `AttemptLog`
/// access) supplies it.
pub fn classify_staleness(session: &Session, now: DateTime<Utc>, has_outside_session_activity: bool) -> StalenessClassification {
    if session.status == SessionStatus::Completed {
        return StalenessClassification::new(StalenessClass::Active);
    }

    let stale = hours_stale(session, now);
    let attempts = session.attempts.len();

    let class = if session.session_type.is_interview_like() {
        classify_interview(stale, attempts)
    } else if session.session_type.is_tracking() {
        classify_tracking(stale)
    } else {
        classify_generator(stale, attempts, progress_ratio(session), has_outside_session_activity)
    };

    StalenessClassification::new(class)
}

fn classify_interview(stale: i64, attempts: usize) -> StalenessClass {
    if stale <= INTERVIEW_FRESH_HOURS {
        StalenessClass::InterviewActive
    } else if stale <= STANDARD_FRESH_HOURS {
        StalenessClass::InterviewStale
    } else if attempts == 0 {
        StalenessClass::InterviewAbandoned
    } else {
        StalenessClass::InterviewStale
    }
}

fn classify_tracking(stale: i64) -> StalenessClass {
    if stale <= STANDARD_FRESH_HOURS {
        StalenessClass::TrackingActive
    } else {
        StalenessClass::TrackingStale
    }
}

fn classify_generator(stale: i64, attempts: usize, progress: f64, has_outside_session_activity: bool) -> StalenessClass {
    if stale <= STANDARD_FRESH_HOURS {
        return StalenessClass::Active;
    }
    if stale > GENERATOR_ABANDONED_HOURS && attempts == 0 {
        return StalenessClass::AbandonedAtStart;
    }
    if stale > GENERATOR_AUTO_COMPLETE_HOURS && progress >= AUTO_COMPLETE_PROGRESS {
        return StalenessClass::AutoCompleteCandidate;
    }
    if stale > GENERATOR_STALLED_HOURS && attempts > 0 {
        return StalenessClass::StalledWithProgress;
    }
    if stale > GENERATOR_TRACKING_ONLY_HOURS && attempts == 0 && has_outside_session_activity {
        return StalenessClass::TrackingOnlyUser;
    }
    StalenessClass::Unclear
}
