//! The `Engine` — the crate's single public entry point (spec §6 Inbound
//! API). Owns every port, serializes user-state mutations behind a
//! per-user lock (§5 Scheduling model), and wires the pure components
//! (decay, mastery, tier, settings, scheduler, Assembler, Reducer,
//! staleness classifier) into the five operations callers actually invoke.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::assembler::Assembler;
use crate::config::EngineConfig;
use crate::domain::{
    Attempt, EngineError, EngineResult, RecommendedAction, Session, SessionAnalytics, SessionOrigin, SessionProblem,
    SessionState, SessionStatus, SessionType, StalenessClassification, TagMastery, UserProblem,
};
use crate::lock::UserLocks;
use crate::ports::{
    AttemptLog, Clock, PatternLadderStore, ProblemCatalog, SessionAnalyticsStore, SessionStateStore, SessionStore,
    TagMasteryStore, TagRelationshipStore, UserProblemStore,
};
use crate::reducer::Reducer;
use crate::retry::{self, Priority};
use crate::settings;
use crate::staleness;
use crate::tier;

const OUTSIDE_ACTIVITY_WINDOW: usize = 50;

pub struct Engine {
    pub catalog: Arc<dyn ProblemCatalog>,
    pub user_problems: Arc<dyn UserProblemStore>,
    pub attempt_log: Arc<dyn AttemptLog>,
    pub session_store: Arc<dyn SessionStore>,
    pub tag_mastery_store: Arc<dyn TagMasteryStore>,
    pub tag_relationships: Arc<dyn TagRelationshipStore>,
    pub ladders: Arc<dyn PatternLadderStore>,
    pub session_analytics_store: Arc<dyn SessionAnalyticsStore>,
    pub session_state_store: Arc<dyn SessionStateStore>,
    pub clock: Arc<dyn Clock>,
    pub config: EngineConfig,
    locks: UserLocks,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Arc<dyn ProblemCatalog>,
        user_problems: Arc<dyn UserProblemStore>,
        attempt_log: Arc<dyn AttemptLog>,
        session_store: Arc<dyn SessionStore>,
        tag_mastery_store: Arc<dyn TagMasteryStore>,
        tag_relationships: Arc<dyn TagRelationshipStore>,
        ladders: Arc<dyn PatternLadderStore>,
        session_analytics_store: Arc<dyn SessionAnalyticsStore>,
        session_state_store: Arc<dyn SessionStateStore>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            catalog,
            user_problems,
            attempt_log,
            session_store,
            tag_mastery_store,
            tag_relationships,
            ladders,
            session_analytics_store,
            session_state_store,
            clock,
            config,
            locks: UserLocks::new(),
        })
    }

    fn assembler(&self) -> Assembler<'_> {
        Assembler {
            catalog: self.catalog.as_ref(),
            user_problems: self.user_problems.as_ref(),
            attempt_log: self.attempt_log.as_ref(),
            tag_relationships: self.tag_relationships.as_ref(),
            ladders: self.ladders.as_ref(),
            config: &self.config,
        }
    }

    fn reducer(&self) -> Reducer<'_> {
        Reducer {
            catalog: self.catalog.as_ref(),
            user_problems: self.user_problems.as_ref(),
            tag_mastery_store: self.tag_mastery_store.as_ref(),
            tag_relationships: self.tag_relationships.as_ref(),
            ladders: self.ladders.as_ref(),
        }
    }

    /// Resumes the user's in-progress session (after expiring it if the
    /// staleness classifier says to) or assembles a fresh one (§4.E + §4.F).
    /// Idempotent for a fixed clock (spec §8 property 1).
    #[instrument(skip(self), fields(user_id))]
    pub async fn start_session(&self, user_id: &str) -> EngineResult<Session> {
        let _guard = self.locks.lock(user_id).await;
        let now = self.clock.now();

        if let Some(existing) = self.fetch_in_progress(user_id, now).await? {
            return Ok(existing);
        }

        let tag_mastery = retry::retry(&self.config.retry, Priority::Normal, || self.tag_mastery_store.list(user_id)).await?;
        let session_state = self.compute_session_settings(user_id, &tag_mastery, now).await?;

        let problems = self.assemble_with_deadline(user_id, &session_state, &tag_mastery, now).await;
        if problems.is_empty() {
            warn!(user_id, "insufficient catalog: assembler produced zero problems");
        }
        self.ensure_user_problem_rows(user_id, &problems, now).await?;

        let session = Session {
            session_id: Uuid::new_v4(),
            date: now,
            status: SessionStatus::InProgress,
            problems,
            attempts: Vec::new(),
            session_type: SessionType::Standard,
            origin: SessionOrigin::Generator,
            last_activity_time: now,
        };

        self.session_store.put(user_id, &session).await?;
        Ok(session)
    }

    /// Runs the Adaptive Session Settings state machine (§4.E) at session
    /// start, as §2's data flow requires ("E → (F uses D,H,B,C) →
    /// session") — not at the previous session's end, where the elapsed
    /// time since the user's last attempt is trivially zero. Uses the
    /// tier-progression engine's (§4.C) current focus-tag window and the
    /// real timestamp of the user's most recent attempt (which may be
    /// days old if they took a break) to compute this session's length,
    /// new-problem count, difficulty cap, and allowed-tag window, then
    /// persists the result as the new `SessionState` before it's used to
    /// assemble anything (§4.E: "the output ... also becomes the new
    /// SessionState after persistence").
    async fn compute_session_settings(&self, user_id: &str, tag_mastery: &[TagMastery], now: DateTime<Utc>) -> EngineResult<SessionState> {
        let stored = self.load_or_seed_session_state(user_id, now).await?;

        let relationships = retry::retry(&self.config.retry, Priority::Normal, || self.tag_relationships.list()).await?;
        let tier_snapshot = tier::evaluate_tier(&relationships, tag_mastery, stored.tier_started_at, now);

        let last_attempt_date = self.most_recent_attempt_date(user_id).await?;
        let computed = settings::compute_settings(&stored, &tier_snapshot.focus_tags, now, last_attempt_date);

        self.session_state_store.put(user_id, &computed).await?;
        Ok(computed)
    }

    /// The timestamp of the user's most recent attempt across every
    /// problem, or `None` if they've never attempted anything — the
    /// "recency-of-practice" input §4.E needs (distinct from `now`, which
    /// is just when this call happens).
    async fn most_recent_attempt_date(&self, user_id: &str) -> EngineResult<Option<DateTime<Utc>>> {
        let recent = self.attempt_log.list_by_recency(user_id, 1).await?;
        Ok(recent.first().map(|a| a.attempt_date))
    }

    /// Guarantees a `UserProblem` row exists for every problem entering the
    /// session, so the `problem_id` callers need to construct `Attempt`
    /// (via `user_problems.get`) is available the moment the session is
    /// handed back — the session payload itself only carries `leetcode_id`.
    async fn ensure_user_problem_rows(&self, user_id: &str, problems: &[SessionProblem], now: DateTime<Utc>) -> EngineResult<()> {
        for sp in problems {
            if self.user_problems.get(user_id, sp.problem.leetcode_id).await?.is_none() {
                let row = UserProblem::new_for_problem(sp.problem.leetcode_id, now);
                self.user_problems.put(user_id, &row).await?;
            }
        }
        Ok(())
    }

    async fn fetch_in_progress(&self, user_id: &str, now: DateTime<Utc>) -> EngineResult<Option<Session>> {
        let Some(mut session) = retry::retry(&self.config.retry, Priority::Normal, || self.session_store.get_in_progress(user_id)).await? else {
            return Ok(None);
        };

        let has_outside_activity = self.has_outside_session_activity(user_id, &session, now).await?;
        let classification = staleness::classify_staleness(&session, now, has_outside_activity);

        match classification.action {
            RecommendedAction::Expire => {
                session.status = SessionStatus::Expired;
                self.session_store.put(user_id, &session).await?;
                Ok(None)
            }
            _ => Ok(Some(session)),
        }
    }

    async fn load_or_seed_session_state(&self, user_id: &str, now: DateTime<Utc>) -> EngineResult<SessionState> {
        match self.session_state_store.get(user_id).await? {
            Some(state) => Ok(state),
            None => {
                let defaults = SessionState::onboarding_defaults(now);
                self.session_state_store.put(user_id, &defaults).await?;
                Ok(defaults)
            }
        }
    }

    /// Races assembly against `config.assembly_deadline` (§5 Cancellation /
    /// timeouts). A timed-out assembly is discarded; the caller gets an
    /// empty problem list rather than a partial one.
    async fn assemble_with_deadline(
        &self,
        user_id: &str,
        session_state: &SessionState,
        tag_mastery: &[TagMastery],
        now: DateTime<Utc>,
    ) -> Vec<SessionProblem> {
        let assembler = self.assembler();
        match tokio::time::timeout(self.config.assembly_deadline, assembler.build(user_id, session_state, tag_mastery, now)).await {
            Ok(problems) => problems,
            Err(_) => {
                warn!(user_id, "session assembly exceeded its deadline, discarding partial session");
                Vec::new()
            }
        }
    }

    /// Races assembly against an external `CancellationToken` in addition to
    /// the deadline. Cancellation observed before assembly starts aborts
    /// with no side effects (§5).
    pub async fn start_session_cancellable(&self, user_id: &str, cancellation: CancellationToken) -> EngineResult<Session> {
        if cancellation.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        tokio::select! {
            result = self.start_session(user_id) => result,
            _ = cancellation.cancelled() => Err(EngineError::Cancelled),
        }
    }

    /// Appends `attempt` to the session and, if it completes the session
    /// (every problem has at least one attempt), runs the Post-Session
    /// Reducer (§4.G) before returning.
    #[instrument(skip(self, attempt), fields(user_id, session_id = %session_id))]
    pub async fn record_attempt(&self, user_id: &str, session_id: Uuid, attempt: Attempt) -> EngineResult<Session> {
        let _guard = self.locks.lock(user_id).await;
        let now = self.clock.now();

        let mut session = self
            .session_store
            .get(session_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("session {session_id}")))?;

        if session.status == SessionStatus::Completed {
            return Ok(session);
        }

        session.attempts.push(attempt.clone());
        session.last_activity_time = now;
        self.attempt_log.append(user_id, &attempt).await?;

        let problems_by_id = self.resolve_problem_ids(user_id, &session).await?;
        if session.all_problems_attempted(&problems_by_id) {
            self.complete_locked(user_id, &mut session, now).await?;
        } else {
            self.session_store.put(user_id, &session).await?;
        }

        Ok(session)
    }

    async fn resolve_problem_ids(&self, user_id: &str, session: &Session) -> EngineResult<std::collections::HashMap<Uuid, i64>> {
        let mut map = std::collections::HashMap::new();
        for attempt in &session.attempts {
            if map.contains_key(&attempt.problem_id) {
                continue;
            }
            if let Some(up) = self.user_problems.get_by_problem_id(user_id, attempt.problem_id).await? {
                map.insert(attempt.problem_id, up.leetcode_id);
            }
        }
        Ok(map)
    }

    /// Forces completion; safe to call twice (spec §6) — a session already
    /// `Completed` just returns its existing analytics record.
    #[instrument(skip(self), fields(user_id, session_id = %session_id))]
    pub async fn complete_session(&self, user_id: &str, session_id: Uuid) -> EngineResult<SessionAnalytics> {
        let _guard = self.locks.lock(user_id).await;
        let now = self.clock.now();

        let mut session = self
            .session_store
            .get(session_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("session {session_id}")))?;

        if session.status == SessionStatus::Completed {
            return self
                .session_analytics_store
                .get(session_id)
                .await?
                .ok_or_else(|| EngineError::InternalInvariant(format!("completed session {session_id} has no analytics record")));
        }

        self.complete_locked(user_id, &mut session, now).await
    }

    async fn complete_locked(&self, user_id: &str, session: &mut Session, now: DateTime<Utc>) -> EngineResult<SessionAnalytics> {
        let session_state = self.load_or_seed_session_state(user_id, now).await?;
        let outcome = self.reducer().reduce(user_id, session, &session_state, now).await?;

        for up in &outcome.updated_user_problems {
            self.user_problems.put(user_id, up).await?;
        }
        for tag_mastery in &outcome.updated_tag_mastery {
            if tag_mastery.mastered {
                info!(user_id, tag = %tag_mastery.tag, "tag mastered");
            }
            self.tag_mastery_store.put(user_id, tag_mastery).await?;
        }
        for delta in &outcome.mastery_deltas {
            if delta.pre_mastered && !delta.post_mastered {
                info!(user_id, tag = %delta.tag, "tag demoted from mastered");
            }
        }
        for ladder in &outcome.updated_ladders {
            self.ladders.put(user_id, ladder).await?;
        }
        self.session_analytics_store.append(user_id, &outcome.analytics).await?;
        self.session_state_store.put(user_id, &outcome.next_session_state).await?;

        session.status = SessionStatus::Completed;
        session.last_activity_time = now;
        self.session_store.put(user_id, session).await?;

        Ok(outcome.analytics)
    }

    /// Removes `leetcode_id` from the session's remaining (unattempted)
    /// problems (spec §6).
    #[instrument(skip(self), fields(user_id, session_id = %session_id))]
    pub async fn skip_problem(&self, user_id: &str, session_id: Uuid, leetcode_id: i64) -> EngineResult<Session> {
        let _guard = self.locks.lock(user_id).await;
        let now = self.clock.now();

        let mut session = self
            .session_store
            .get(session_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("session {session_id}")))?;

        let problems_by_id = self.resolve_problem_ids(user_id, &session).await?;
        let attempted: std::collections::BTreeSet<i64> = session.attempted_leetcode_ids(&problems_by_id);
        if !attempted.contains(&leetcode_id) {
            session.problems.retain(|sp| sp.problem.leetcode_id != leetcode_id);
        }
        session.last_activity_time = now;

        self.session_store.put(user_id, &session).await?;
        Ok(session)
    }

    /// Read-only staleness classification (spec §6). Runs without the
    /// per-user lock — read paths may observe slightly stale state but
    /// never torn state (§5).
    #[instrument(skip(self, session), fields(user_id, session_id = %session.session_id))]
    pub async fn classify_stale_session(&self, user_id: &str, session: &Session) -> EngineResult<StalenessClassification> {
        let now = self.clock.now();
        let has_outside_activity = self.has_outside_session_activity(user_id, session, now).await?;
        Ok(staleness::classify_staleness(session, now, has_outside_activity))
    }

    /// Whether the user recorded attempts outside this session while it
    /// sat idle — needed by the `tracking_only_user` branch of the
    /// staleness table (§6), which the `Session` object alone can't answer.
    async fn has_outside_session_activity(&self, user_id: &str, session: &Session, _now: DateTime<Utc>) -> EngineResult<bool> {
        let recent = self.attempt_log.list_by_recency(user_id, OUTSIDE_ACTIVITY_WINDOW).await?;
        Ok(recent
            .iter()
            .any(|a| a.session_id != Some(session.session_id) && a.attempt_date > session.last_activity_time))
    }
}

/// Convenience for callers wiring a production engine with system defaults.
pub fn assembly_deadline_from_config(config: &EngineConfig) -> StdDuration {
    config.assembly_deadline
}
