// tests/common/mod.rs
//! Shared in-memory port implementations for end-to-end `Engine` tests.
//! Mirrors `demos/trace_demo.rs`'s fakes rather than reaching for mockall —
//! these scenarios drive the whole session lifecycle, not a single port
//! call, so a real (if in-memory) store is less brittle to wire up.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use practice_engine::domain::Problem;
use practice_engine::{
    Attempt, AttemptLog, Clock, Difficulty, Engine, EngineConfig, EngineResult, PatternLadder, PatternLadderStore,
    ProblemCatalog, Session, SessionAnalytics, SessionAnalyticsStore, SessionState, SessionStateStore, SessionStatus,
    SessionStore, SessionType, TagClassification, TagMastery, TagMasteryStore, TagRelationship,
    TagRelationshipStore, UserProblemStore, UserProblem,
};

#[derive(Default)]
pub struct InMemoryCatalog {
    pub problems: Vec<Problem>,
    pub edges: HashMap<i64, Vec<(i64, f64)>>,
}

#[async_trait]
impl ProblemCatalog for InMemoryCatalog {
    async fn get_by_slug(&self, slug: &str) -> EngineResult<Option<Problem>> {
        Ok(self.problems.iter().find(|p| p.slug == slug).cloned())
    }

    async fn get_by_id(&self, leetcode_id: i64) -> EngineResult<Option<Problem>> {
        Ok(self.problems.iter().find(|p| p.leetcode_id == leetcode_id).cloned())
    }

    async fn list_with_filter(
        &self,
        tags: &[String],
        difficulty_cap: Difficulty,
        exclude_ids: &[i64],
        limit: usize,
    ) -> EngineResult<Vec<Problem>> {
        let mut matches: Vec<Problem> = self
            .problems
            .iter()
            .filter(|p| tags.is_empty() || p.tags.iter().any(|t| tags.contains(t)))
            .filter(|p| p.difficulty <= difficulty_cap)
            .filter(|p| !exclude_ids.contains(&p.leetcode_id))
            .cloned()
            .collect();
        matches.sort_by_key(|p| p.leetcode_id);
        matches.truncate(limit);
        Ok(matches)
    }

    async fn related_problems(&self, leetcode_id: i64) -> EngineResult<Vec<(i64, f64)>> {
        Ok(self.edges.get(&leetcode_id).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryUserProblems {
    rows: Mutex<HashMap<(String, i64), UserProblem>>,
}

#[async_trait]
impl UserProblemStore for InMemoryUserProblems {
    async fn get(&self, user_id: &str, leetcode_id: i64) -> EngineResult<Option<UserProblem>> {
        Ok(self.rows.lock().await.get(&(user_id.to_string(), leetcode_id)).cloned())
    }

    async fn get_by_problem_id(&self, user_id: &str, problem_id: Uuid) -> EngineResult<Option<UserProblem>> {
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .find(|((u, _), row)| u == user_id && row.problem_id == problem_id)
            .map(|(_, row)| row.clone()))
    }

    async fn put(&self, user_id: &str, row: &UserProblem) -> EngineResult<()> {
        self.rows.lock().await.insert((user_id.to_string(), row.leetcode_id), row.clone());
        Ok(())
    }

    async fn list(&self, user_id: &str) -> EngineResult<Vec<UserProblem>> {
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .filter(|((u, _), _)| u == user_id)
            .map(|(_, row)| row.clone())
            .collect())
    }

    async fn list_due_before(
        &self,
        user_id: &str,
        due_before: DateTime<Utc>,
        box_levels: std::ops::RangeInclusive<u8>,
    ) -> EngineResult<Vec<UserProblem>> {
        Ok(self
            .list(user_id)
            .await?
            .into_iter()
            .filter(|row| row.review_schedule <= due_before && box_levels.contains(&row.box_level))
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryAttemptLog {
    entries: Mutex<HashMap<String, Vec<Attempt>>>,
}

#[async_trait]
impl AttemptLog for InMemoryAttemptLog {
    async fn append(&self, user_id: &str, attempt: &Attempt) -> EngineResult<()> {
        self.entries.lock().await.entry(user_id.to_string()).or_default().push(attempt.clone());
        Ok(())
    }

    async fn list_by_recency(&self, user_id: &str, limit: usize) -> EngineResult<Vec<Attempt>> {
        let entries = self.entries.lock().await;
        let mut rows = entries.get(user_id).cloned().unwrap_or_default();
        rows.sort_by_key(|a| std::cmp::Reverse(a.attempt_date));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn list_by_session(&self, user_id: &str, session_id: Uuid) -> EngineResult<Vec<Attempt>> {
        let entries = self.entries.lock().await;
        Ok(entries
            .get(user_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|a| a.session_id == Some(session_id))
            .collect())
    }
}

#[derive(Default)]
pub struct InMemorySessions {
    rows: Mutex<HashMap<Uuid, Session>>,
}

#[async_trait]
impl SessionStore for InMemorySessions {
    async fn get(&self, session_id: Uuid) -> EngineResult<Option<Session>> {
        Ok(self.rows.lock().await.get(&session_id).cloned())
    }

    async fn put(&self, _user_id: &str, session: &Session) -> EngineResult<()> {
        self.rows.lock().await.insert(session.session_id, session.clone());
        Ok(())
    }

    async fn get_latest(&self, _user_id: &str) -> EngineResult<Option<Session>> {
        Ok(self.rows.lock().await.values().max_by_key(|s| s.date).cloned())
    }

    async fn by_type(&self, _user_id: &str, session_type: SessionType) -> EngineResult<Vec<Session>> {
        Ok(self.rows.lock().await.values().filter(|s| s.session_type == session_type).cloned().collect())
    }

    async fn get_in_progress(&self, _user_id: &str) -> EngineResult<Option<Session>> {
        Ok(self.rows.lock().await.values().find(|s| s.status == SessionStatus::InProgress).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryTagMastery {
    rows: Mutex<HashMap<(String, String), TagMastery>>,
}

#[async_trait]
impl TagMasteryStore for InMemoryTagMastery {
    async fn get(&self, user_id: &str, tag: &str) -> EngineResult<Option<TagMastery>> {
        Ok(self.rows.lock().await.get(&(user_id.to_string(), tag.to_string())).cloned())
    }

    async fn list(&self, user_id: &str) -> EngineResult<Vec<TagMastery>> {
        Ok(self.rows.lock().await.iter().filter(|((u, _), _)| u == user_id).map(|(_, row)| row.clone()).collect())
    }

    async fn put(&self, user_id: &str, row: &TagMastery) -> EngineResult<()> {
        self.rows.lock().await.insert((user_id.to_string(), row.tag.clone()), row.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryTagRelationships {
    pub rows: Vec<TagRelationship>,
}

#[async_trait]
impl TagRelationshipStore for InMemoryTagRelationships {
    async fn get(&self, tag: &str) -> EngineResult<Option<TagRelationship>> {
        Ok(self.rows.iter().find(|r| r.tag == tag).cloned())
    }

    async fn list(&self) -> EngineResult<Vec<TagRelationship>> {
        Ok(self.rows.clone())
    }

    async fn list_by_classification(&self, classification: TagClassification) -> EngineResult<Vec<TagRelationship>> {
        Ok(self.rows.iter().filter(|r| r.classification == classification).cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryLadders {
    rows: Mutex<HashMap<(String, String), PatternLadder>>,
}

#[async_trait]
impl PatternLadderStore for InMemoryLadders {
    async fn get(&self, user_id: &str, tag: &str) -> EngineResult<Option<PatternLadder>> {
        Ok(self.rows.lock().await.get(&(user_id.to_string(), tag.to_string())).cloned())
    }

    async fn put(&self, user_id: &str, ladder: &PatternLadder) -> EngineResult<()> {
        self.rows.lock().await.insert((user_id.to_string(), ladder.tag.clone()), ladder.clone());
        Ok(())
    }

    async fn list(&self, user_id: &str) -> EngineResult<Vec<PatternLadder>> {
        Ok(self.rows.lock().await.iter().filter(|((u, _), _)| u == user_id).map(|(_, row)| row.clone()).collect())
    }
}

#[derive(Default)]
pub struct InMemoryAnalytics {
    rows: Mutex<HashMap<Uuid, SessionAnalytics>>,
}

#[async_trait]
impl SessionAnalyticsStore for InMemoryAnalytics {
    async fn append(&self, _user_id: &str, record: &SessionAnalytics) -> EngineResult<()> {
        self.rows.lock().await.insert(record.session_id, record.clone());
        Ok(())
    }

    async fn get(&self, session_id: Uuid) -> EngineResult<Option<SessionAnalytics>> {
        Ok(self.rows.lock().await.get(&session_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemorySessionState {
    rows: Mutex<HashMap<String, SessionState>>,
}

#[async_trait]
impl SessionStateStore for InMemorySessionState {
    async fn get(&self, user_id: &str) -> EngineResult<Option<SessionState>> {
        Ok(self.rows.lock().await.get(user_id).cloned())
    }

    async fn put(&self, user_id: &str, state: &SessionState) -> EngineResult<()> {
        self.rows.lock().await.insert(user_id.to_string(), state.clone());
        Ok(())
    }
}

/// A clock callers can pin to a fixed instant and move forward, so staleness
/// and scheduling scenarios don't race the real wall clock.
pub struct FixedClock {
    millis: std::sync::atomic::AtomicI64,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            millis: std::sync::atomic::AtomicI64::new(now.timestamp_millis()),
        }
    }

    pub fn advance(&self, delta: chrono::Duration) {
        self.millis.fetch_add(delta.num_milliseconds(), std::sync::atomic::Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(std::sync::atomic::Ordering::SeqCst)).expect("valid timestamp")
    }
}

/// A small but tag-diverse catalog spanning all three difficulties, enough
/// to exercise onboarding, triggered reviews, and guard-rail replacement.
pub fn seed_catalog() -> InMemoryCatalog {
    fn tags(names: &[&str]) -> std::collections::BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    let problems = vec![
        Problem {
            leetcode_id: 1,
            title: "Two Sum".to_string(),
            slug: "two-sum".to_string(),
            difficulty: Difficulty::Easy,
            tags: tags(&["array", "hash-table"]),
        },
        Problem {
            leetcode_id: 217,
            title: "Contains Duplicate".to_string(),
            slug: "contains-duplicate".to_string(),
            difficulty: Difficulty::Easy,
            tags: tags(&["array", "hash-table"]),
        },
        Problem {
            leetcode_id: 15,
            title: "3Sum".to_string(),
            slug: "3sum".to_string(),
            difficulty: Difficulty::Medium,
            tags: tags(&["array", "two-pointers"]),
        },
        Problem {
            leetcode_id: 11,
            title: "Container With Most Water".to_string(),
            slug: "container-with-most-water".to_string(),
            difficulty: Difficulty::Medium,
            tags: tags(&["array", "two-pointers"]),
        },
        Problem {
            leetcode_id: 42,
            title: "Trapping Rain Water".to_string(),
            slug: "trapping-rain-water".to_string(),
            difficulty: Difficulty::Hard,
            tags: tags(&["array", "two-pointers", "dynamic-programming"]),
        },
        Problem {
            leetcode_id: 72,
            title: "Edit Distance".to_string(),
            slug: "edit-distance".to_string(),
            difficulty: Difficulty::Hard,
            tags: tags(&["string", "dynamic-programming"]),
        },
        Problem {
            leetcode_id: 300,
            title: "Longest Increasing Subsequence".to_string(),
            slug: "longest-increasing-subsequence".to_string(),
            difficulty: Difficulty::Hard,
            tags: tags(&["array", "dynamic-programming"]),
        },
        Problem {
            leetcode_id: 121,
            title: "Best Time to Buy and Sell Stock".to_string(),
            slug: "best-time-to-buy-and-sell-stock".to_string(),
            difficulty: Difficulty::Easy,
            tags: tags(&["array", "dynamic-programming"]),
        },
    ];

    let mut edges = HashMap::new();
    edges.insert(1, vec![(217, 0.9)]);

    InMemoryCatalog { problems, edges }
}

pub fn seed_tag_relationships() -> InMemoryTagRelationships {
    InMemoryTagRelationships {
        rows: vec![
            TagRelationship {
                tag: "array".to_string(),
                classification: TagClassification::CoreConcept,
                related: [("hash-table".to_string(), 0.6), ("two-pointers".to_string(), 0.7)]
                    .into_iter()
                    .collect(),
            },
            TagRelationship {
                tag: "hash-table".to_string(),
                classification: TagClassification::CoreConcept,
                related: [("array".to_string(), 0.6)].into_iter().collect(),
            },
            TagRelationship {
                tag: "two-pointers".to_string(),
                classification: TagClassification::FundamentalTechnique,
                related: [("array".to_string(), 0.7)].into_iter().collect(),
            },
            TagRelationship {
                tag: "dynamic-programming".to_string(),
                classification: TagClassification::AdvancedTechnique,
                related: [("two-pointers".to_string(), 0.5)].into_iter().collect(),
            },
            TagRelationship {
                tag: "string".to_string(),
                classification: TagClassification::AdvancedTechnique,
                related: Default::default(),
            },
        ],
    }
}

/// Wires a fresh `Engine` over empty in-memory stores, backed by `clock`.
pub fn build_engine(catalog: InMemoryCatalog, relationships: InMemoryTagRelationships, clock: Arc<FixedClock>) -> Engine {
    Engine::new(
        Arc::new(catalog),
        Arc::new(InMemoryUserProblems::default()),
        Arc::new(InMemoryAttemptLog::default()),
        Arc::new(InMemorySessions::default()),
        Arc::new(InMemoryTagMastery::default()),
        Arc::new(relationships),
        Arc::new(InMemoryLadders::default()),
        Arc::new(InMemoryAnalytics::default()),
        Arc::new(InMemorySessionState::default()),
        clock,
        EngineConfig::default(),
    )
    .expect("default config validates")
}

/// Records a successful or failing attempt against `leetcode_id` inside
/// `session`, mirroring what a real client does between `start_session` and
/// `complete_session`.
pub async fn attempt_on(engine: &Engine, user_id: &str, session: &Session, leetcode_id: i64, success: bool) {
    let up = engine
        .user_problems
        .get(user_id, leetcode_id)
        .await
        .unwrap()
        .unwrap_or_else(|| UserProblem::new_for_problem(leetcode_id, engine.clock.now()));
    let attempt = Attempt {
        attempt_id: Uuid::new_v4(),
        problem_id: up.problem_id,
        attempt_date: engine.clock.now(),
        success,
        time_spent_seconds: 120,
        perceived_difficulty: 5.0,
        session_id: Some(session.session_id),
    };
    engine.record_attempt(user_id, session.session_id, attempt).await.unwrap();
}
