//! Daily review Scheduler (spec §4.D). Produces the set of problems due
//! "today" for a user, annotated with their current decay score so the
//! Assembler (§4.F) and the guard rail can reason about staleness without
//! recomputing it.

use chrono::{DateTime, Utc};

use crate::decay;
use crate::domain::UserProblem;

#[derive(Debug, Clone, PartialEq)]
pub struct DueReview {
    pub user_problem: UserProblem,
    pub decay_score: f64,
}

/// A problem is due iff `review_schedule <= now` *and* `cooldown_until <=
/// now` (or absent). Output is sorted by `review_schedule` ascending, then
/// `decay_score` ascending (staler first), then `total_attempts` ascending
/// — the same ordering the Assembler's fallback tier reuses directly.
pub fn due_schedule(user_problems: &[UserProblem], now: DateTime<Utc>) -> Vec<DueReview> {
    let mut due: Vec<DueReview> = user_problems
        .iter()
        .filter(|up| up.is_due(now))
        .map(|up| {
            let decay_score = decay::decay_score(now, up.last_attempt_date, up.success_rate(), up.stability);
            DueReview {
                user_problem: up.clone(),
                decay_score,
            }
        })
        .collect();

    due.sort_by(|a, b| {
        a.user_problem
            .review_schedule
            .cmp(&b.user_problem.review_schedule)
            .then_with(|| a.decay_score.partial_cmp(&b.decay_score).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.user_problem.attempt_stats.total.cmp(&b.user_problem.attempt_stats.total))
    });

    due
}

/// The learning-review partition of a due schedule (box 1–5).
pub fn learning_due(schedule: &[DueReview]) -> Vec<&DueReview> {
    schedule.iter().filter(|r| r.user_problem.is_learning()).collect()
}

/// The passive-mastered-review partition of a due schedule (box 6–8).
pub fn mastered_due(schedule: &[DueReview]) -> Vec<&DueReview> {
    schedule.iter().filter(|r| r.user_problem.is_mastered()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn up(box_level: u8, review_schedule: DateTime<Utc>, cooldown_until: Option<DateTime<Utc>>) -> UserProblem {
        let mut p = UserProblem::new_for_problem(1, review_schedule);
        p.box_level = box_level;
        p.review_schedule = review_schedule;
        p.cooldown_until = cooldown_until;
        p
    }

    #[test]
    fn due_requires_review_schedule_and_cooldown_both_elapsed() {
        let now = Utc::now();
        let due = up(1, now - Duration::days(1), None);
        let not_due_yet = up(1, now + Duration::days(1), None);
        let cooling_down = up(1, now - Duration::days(1), Some(now + Duration::hours(1)));

        let schedule = due_schedule(&[due.clone(), not_due_yet, cooling_down], now);
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule[0].user_problem.problem_id, due.problem_id);
    }

    #[test]
    fn partitions_learning_and_mastered() {
        let now = Utc::now();
        let learning = up(3, now - Duration::days(1), None);
        let mastered = up(7, now - Duration::days(1), None);
        let schedule = due_schedule(&[learning, mastered], now);

        assert_eq!(learning_due(&schedule).len(), 1);
        assert_eq!(mastered_due(&schedule).len(), 1);
    }

    #[test]
    fn sorted_by_review_schedule_then_decay_then_attempts() {
        let now = Utc::now();
        let mut earlier = up(1, now - Duration::days(5), None);
        earlier.attempt_stats.total = 3;
        let mut later = up(1, now - Duration::days(1), None);
        later.attempt_stats.total = 1;

        let schedule = due_schedule(&[later.clone(), earlier.clone()], now);
        assert_eq!(schedule[0].user_problem.problem_id, earlier.problem_id);
        assert_eq!(schedule[1].user_problem.problem_id, later.problem_id);
    }
}
