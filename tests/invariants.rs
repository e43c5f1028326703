//! Cross-cutting properties the Session Assembler must hold regardless of
//! which priority contributed a problem (spec §3 testable properties):
//! no duplicate problems, the session never exceeds its target length,
//! and assembly is deterministic for identical state and clock.

mod common;

use std::sync::Arc;

use chrono::Utc;

use common::{build_engine, seed_catalog, seed_tag_relationships, FixedClock};

#[tokio::test]
async fn session_has_no_duplicate_problems() {
    let clock = Arc::new(FixedClock::new(Utc::now()));
    let engine = build_engine(seed_catalog(), seed_tag_relationships(), clock);

    let session = engine.start_session("dedup-user").await.unwrap();

    let mut ids: Vec<i64> = session.problems.iter().map(|sp| sp.problem.leetcode_id).collect();
    let before = ids.len();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), before, "session problems must be deduplicated by leetcode_id");
}

#[tokio::test]
async fn session_never_exceeds_configured_length() {
    let clock = Arc::new(FixedClock::new(Utc::now()));
    let engine = build_engine(seed_catalog(), seed_tag_relationships(), clock);

    let session = engine.start_session("bounded-user").await.unwrap();
    let state = engine.session_state_store.get("bounded-user").await.unwrap().unwrap();

    assert!(
        session.problems.len() <= state.session_length,
        "session has {} problems but session_length is {}",
        session.problems.len(),
        state.session_length
    );
}

#[tokio::test]
async fn assembly_is_deterministic_for_identical_state_and_clock() {
    let now = Utc::now();

    let engine_a = build_engine(seed_catalog(), seed_tag_relationships(), Arc::new(FixedClock::new(now)));
    let engine_b = build_engine(seed_catalog(), seed_tag_relationships(), Arc::new(FixedClock::new(now)));

    let session_a = engine_a.start_session("determinism-user").await.unwrap();
    let session_b = engine_b.start_session("determinism-user").await.unwrap();

    assert_eq!(session_a.leetcode_ids(), session_b.leetcode_ids());
    let reasons_a: Vec<_> = session_a.problems.iter().map(|sp| sp.selection_reason.kind).collect();
    let reasons_b: Vec<_> = session_b.problems.iter().map(|sp| sp.selection_reason.kind).collect();
    assert_eq!(reasons_a, reasons_b);
}

#[tokio::test]
async fn completing_a_session_leaves_consistent_attempt_stats_for_every_problem() {
    let clock = Arc::new(FixedClock::new(Utc::now()));
    let engine = build_engine(seed_catalog(), seed_tag_relationships(), clock);
    let user_id = "stats-user";

    let session = engine.start_session(user_id).await.unwrap();
    let ids: Vec<i64> = session.problems.iter().map(|sp| sp.problem.leetcode_id).collect();
    for (i, id) in ids.iter().enumerate() {
        common::attempt_on(&engine, user_id, &session, *id, i % 2 == 0).await;
    }
    engine.complete_session(user_id, session.session_id).await.unwrap();

    for id in ids {
        let row = engine.user_problems.get(user_id, id).await.unwrap().expect("row created when the session was assembled");
        assert!(row.attempt_stats.is_consistent());
        assert_eq!(row.attempt_stats.total, 1);
    }
}

#[tokio::test]
async fn skip_problem_removes_only_unattempted_problems() {
    let clock = Arc::new(FixedClock::new(Utc::now()));
    let engine = build_engine(seed_catalog(), seed_tag_relationships(), clock);
    let user_id = "skip-user";

    let session = engine.start_session(user_id).await.unwrap();
    assert!(session.problems.len() >= 2, "fixture catalog should seed at least two problems");
    let attempted_id = session.problems[0].problem.leetcode_id;
    let skipped_id = session.problems[1].problem.leetcode_id;

    common::attempt_on(&engine, user_id, &session, attempted_id, true).await;
    let after_skip = engine.skip_problem(user_id, session.session_id, skipped_id).await.unwrap();

    let remaining: Vec<i64> = after_skip.problems.iter().map(|sp| sp.problem.leetcode_id).collect();
    assert!(!remaining.contains(&skipped_id), "skipped problem should be removed from the remaining list");
    assert!(remaining.contains(&attempted_id), "already-attempted problems are untouched by skip_problem");
}

#[tokio::test]
async fn skip_problem_is_a_no_op_once_a_problem_was_attempted() {
    let clock = Arc::new(FixedClock::new(Utc::now()));
    let engine = build_engine(seed_catalog(), seed_tag_relationships(), clock);
    let user_id = "skip-attempted-user";

    let session = engine.start_session(user_id).await.unwrap();
    let attempted_id = session.problems[0].problem.leetcode_id;

    common::attempt_on(&engine, user_id, &session, attempted_id, true).await;
    let after_skip = engine.skip_problem(user_id, session.session_id, attempted_id).await.unwrap();

    let remaining: Vec<i64> = after_skip.problems.iter().map(|sp| sp.problem.leetcode_id).collect();
    assert!(remaining.contains(&attempted_id), "skip_problem must not remove a problem that was already attempted");
}
