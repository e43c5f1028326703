//! Runs a handful of sessions against simple in-memory port
//! implementations and prints the resulting `tracing` spans, so the
//! `#[instrument]` wiring on `Engine` can be eyeballed without standing up
//! a real store.
//!
//! `cargo run --bin trace-demo`

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use practice_engine::{
    AttemptLog, Clock, Difficulty, Engine, EngineConfig, EngineResult, Problem, ProblemCatalog, Session,
    SessionAnalyticsStore, SessionState, SessionStateStore, SessionStore, SessionType, SystemClock, TagClassification,
    TagMastery, TagMasteryStore, TagRelationship, TagRelationshipStore, UserProblem, UserProblemStore,
};
use practice_engine::domain::{Attempt, PatternLadder, SessionAnalytics};
use practice_engine::ports::PatternLadderStore;

#[derive(Default)]
struct InMemoryCatalog {
    problems: Vec<Problem>,
    edges: HashMap<i64, Vec<(i64, f64)>>,
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
struct InMemoryUserProblems {
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
struct InMemoryAttemptLog {
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
struct InMemorySessions {
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
        use practice_engine::domain::SessionStatus;
        Ok(self.rows.lock().await.values().find(|s| s.status == SessionStatus::InProgress).cloned())
    }
}

#[derive(Default)]
struct InMemoryTagMastery {
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

struct InMemoryTagRelationships {
    rows: Vec<TagRelationship>,
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
struct InMemoryLadders {
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
struct InMemoryAnalytics {
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
struct InMemorySessionState {
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

fn seed_catalog() -> InMemoryCatalog {
    let problems = vec![
        Problem {
            leetcode_id: 1,
            title: "Two Sum".to_string(),
            slug: "two-sum".to_string(),
            difficulty: Difficulty::Easy,
            tags: ["array", "hash-table"].into_iter().map(String::from).collect(),
        },
        Problem {
            leetcode_id: 15,
            title: "3Sum".to_string(),
            slug: "3sum".to_string(),
            difficulty: Difficulty::Medium,
            tags: ["array", "two-pointers"].into_iter().map(String::from).collect(),
        },
        Problem {
            leetcode_id: 121,
            title: "Best Time to Buy and Sell Stock".to_string(),
            slug: "best-time-to-buy-and-sell-stock".to_string(),
            difficulty: Difficulty::Easy,
            tags: ["array", "dynamic-programming"].into_iter().map(String::from).collect(),
        },
    ];
    let mut edges = HashMap::new();
    edges.insert(1, vec![(15, 0.6)]);
    InMemoryCatalog { problems, edges }
}

fn seed_tag_relationships() -> InMemoryTagRelationships {
    InMemoryTagRelationships {
        rows: vec![
            TagRelationship {
                tag: "array".to_string(),
                classification: TagClassification::CoreConcept,
                related: [("hash-table".to_string(), 0.5)].into_iter().collect(),
            },
            TagRelationship {
                tag: "hash-table".to_string(),
                classification: TagClassification::CoreConcept,
                related: Default::default(),
            },
            TagRelationship {
                tag: "two-pointers".to_string(),
                classification: TagClassification::FundamentalTechnique,
                related: Default::default(),
            },
            TagRelationship {
                tag: "dynamic-programming".to_string(),
                classification: TagClassification::AdvancedTechnique,
                related: Default::default(),
            },
        ],
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .compact()
        .init();

    let engine = Engine::new(
        Arc::new(seed_catalog()),
        Arc::new(InMemoryUserProblems::default()),
        Arc::new(InMemoryAttemptLog::default()),
        Arc::new(InMemorySessions::default()),
        Arc::new(InMemoryTagMastery::default()),
        Arc::new(seed_tag_relationships()),
        Arc::new(InMemoryLadders::default()),
        Arc::new(InMemoryAnalytics::default()),
        Arc::new(InMemorySessionState::default()),
        Arc::new(SystemClock),
        EngineConfig::default(),
    )?;

    let user_id = "demo-user";
    let session = engine.start_session(user_id).await?;
    tracing::info!(problem_count = session.problems.len(), "assembled session");

    for sp in &session.problems {
        if let Some(up) = engine.user_problems.get(user_id, sp.problem.leetcode_id).await? {
            let attempt = Attempt {
                attempt_id: Uuid::new_v4(),
                problem_id: up.problem_id,
                attempt_date: SystemClock.now(),
                success: true,
                time_spent_seconds: 180,
                perceived_difficulty: 2.0,
                session_id: Some(session.session_id),
            };
            engine.record_attempt(user_id, session.session_id, attempt).await?;
        }
    }

    let analytics = engine.complete_session(user_id, session.session_id).await?;
    tracing::info!(accuracy = analytics.accuracy, "session complete");

    Ok(())
}
