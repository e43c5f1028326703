use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// DIFFICULTY
// ============================================================================

/// Problem/cap difficulty. Declared in ascending order so derived `Ord`
/// gives `Easy < Medium < Hard`, which is what difficulty-cap comparisons
/// and the promotion/demotion helpers below rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// One step up the difficulty ladder, capped at `Hard`.
    pub fn promote(self) -> Self {
        match self {
            Difficulty::Easy => Difficulty::Medium,
            Difficulty::Medium => Difficulty::Hard,
            Difficulty::Hard => Difficulty::Hard,
        }
    }

    /// One step down the difficulty ladder, floored at `Easy`.
    pub fn demote(self) -> Self {
        match self {
            Difficulty::Easy => Difficulty::Easy,
            Difficulty::Medium => Difficulty::Easy,
            Difficulty::Hard => Difficulty::Medium,
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        };
        write!(f, "{s}")
    }
}

// ============================================================================
// PROBLEM (read-only catalog entry)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub leetcode_id: i64,
    pub title: String,
    pub slug: String,
    pub difficulty: Difficulty,
    /// Lowercase tag names.
    pub tags: BTreeSet<String>,
}

// ============================================================================
// USER PROBLEM (per-user, per-problem spaced-repetition state)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct AttemptStats {
    pub total: u32,
    pub successful: u32,
    pub unsuccessful: u32,
}

impl AttemptStats {
    pub fn record(&mut self, success: bool) {
        self.total += 1;
        if success {
            self.successful += 1;
        } else {
            self.unsuccessful += 1;
        }
    }

    /// `successful / total`, or `0.0` for a problem never attempted.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.successful as f64 / self.total as f64
        }
    }

    /// Invariant checked by the reducer and by tests: `successful +
    /// unsuccessful == total` (spec §3, testable property 7).
    pub fn is_consistent(&self) -> bool {
        self.successful + self.unsuccessful == self.total
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProblem {
    pub problem_id: Uuid,
    pub leetcode_id: i64,
    /// 1..=8. Levels 1–5 are "learning", 6–8 are "mastered".
    pub box_level: u8,
    pub stability: f64,
    pub review_schedule: DateTime<Utc>,
    pub last_attempt_date: Option<DateTime<Utc>>,
    pub attempt_stats: AttemptStats,
    pub perceived_difficulty: f64,
    pub consecutive_failures: u32,
    pub cooldown_until: Option<DateTime<Utc>>,
}

impl UserProblem {
    pub const LEARNING_BOXES: std::ops::RangeInclusive<u8> = 1..=5;
    pub const MASTERED_BOXES: std::ops::RangeInclusive<u8> = 6..=8;

    pub fn is_mastered(&self) -> bool {
        Self::MASTERED_BOXES.contains(&self.box_level)
    }

    pub fn is_learning(&self) -> bool {
        Self::LEARNING_BOXES.contains(&self.box_level)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        let review_due = self.review_schedule <= now;
        let off_cooldown = self.cooldown_until.map(|c| c <= now).unwrap_or(true);
        review_due && off_cooldown
    }

    pub fn success_rate(&self) -> f64 {
        self.attempt_stats.success_rate()
    }

    pub fn new_for_problem(leetcode_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            problem_id: Uuid::new_v4(),
            leetcode_id,
            box_level: 1,
            stability: 6.0,
            review_schedule: now,
            last_attempt_date: None,
            attempt_stats: AttemptStats::default(),
            perceived_difficulty: 5.0,
            consecutive_failures: 0,
            cooldown_until: None,
        }
    }
}

// ============================================================================
// ATTEMPT (append-only)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub attempt_id: Uuid,
    pub problem_id: Uuid,
    pub attempt_date: DateTime<Utc>,
    pub success: bool,
    pub time_spent_seconds: u32,
    pub perceived_difficulty: f64,
    pub session_id: Option<Uuid>,
}

// ============================================================================
// TAG MASTERY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct StruggleHistory {
    pub consecutive_struggles: u32,
    pub days_without_progress: u32,
    pub total_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagMastery {
    pub tag: String,
    pub total_attempts: u32,
    pub successful_attempts: u32,
    pub decay_score: f64,
    pub mastered: bool,
    pub last_attempt_date: Option<DateTime<Utc>>,
    pub struggle_history: StruggleHistory,
}

impl TagMastery {
    pub fn success_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            0.0
        } else {
            self.successful_attempts as f64 / self.total_attempts as f64
        }
    }
}

// ============================================================================
// TAG RELATIONSHIP (read-only catalog)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagClassification {
    CoreConcept,
    FundamentalTechnique,
    AdvancedTechnique,
}

impl TagClassification {
    pub fn next(self) -> Option<Self> {
        match self {
            TagClassification::CoreConcept => Some(TagClassification::FundamentalTechnique),
            TagClassification::FundamentalTechnique => Some(TagClassification::AdvancedTechnique),
            TagClassification::AdvancedTechnique => None,
        }
    }

    pub fn all() -> &'static [TagClassification] {
        &[
            TagClassification::CoreConcept,
            TagClassification::FundamentalTechnique,
            TagClassification::AdvancedTechnique,
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagRelationship {
    pub tag: String,
    pub classification: TagClassification,
    pub related: BTreeMap<String, f64>,
}

// ============================================================================
// SESSION STATE (singleton per user)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LastPerformance {
    pub accuracy: f64,
    pub efficiency_score: f64,
}

impl Default for LastPerformance {
    fn default() -> Self {
        Self {
            accuracy: 0.0,
            efficiency_score: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionType {
    Difficulty,
    TagWidth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscapeHatches {
    pub sessions_at_current_difficulty: u32,
    pub sessions_without_promotion: u32,
    pub activated: BTreeSet<String>,
    pub current_promotion_type: Option<PromotionType>,
}

impl Default for EscapeHatches {
    fn default() -> Self {
        Self {
            sessions_at_current_difficulty: 0,
            sessions_without_promotion: 0,
            activated: BTreeSet::new(),
            current_promotion_type: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub num_sessions_completed: u32,
    pub current_difficulty_cap: Difficulty,
    pub tag_index: usize,
    pub session_length: usize,
    pub new_problem_count: usize,
    pub current_allowed_tags: Vec<String>,
    pub last_performance: LastPerformance,
    pub escape_hatches: EscapeHatches,
    pub sessions_at_current_tag_count: u32,
    /// Current tier (Core Concept / Fundamental / Advanced), tracked so the
    /// tier-progression engine's time-based escape (§4.C: 30+ days at a tier)
    /// has a start date to measure against. Not named explicitly in §3's
    /// data model, but required to implement the behavior §4.C states;
    /// recorded here as the natural home (SessionState is the only
    /// per-user singleton owned by the progression machinery).
    pub current_tier: TagClassification,
    pub tier_started_at: DateTime<Utc>,
}

impl SessionState {
    /// The defaults applied on a brand-new user, and whenever inputs are
    /// malformed (spec §4.E: "must yield the onboarding defaults, never
    /// crash").
    pub fn onboarding_defaults(now: DateTime<Utc>) -> Self {
        Self {
            num_sessions_completed: 0,
            current_difficulty_cap: Difficulty::Easy,
            tag_index: 0,
            session_length: 4,
            new_problem_count: 4,
            current_allowed_tags: Vec::new(),
            last_performance: LastPerformance::default(),
            escape_hatches: EscapeHatches::default(),
            sessions_at_current_tag_count: 0,
            current_tier: TagClassification::CoreConcept,
            tier_started_at: now,
        }
    }

    pub fn is_onboarding(&self) -> bool {
        self.num_sessions_completed < 3
    }
}

// ============================================================================
// SESSION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Draft,
    InProgress,
    Completed,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Standard,
    InterviewLike,
    FullInterview,
    Tracking,
}

impl SessionType {
    pub fn is_interview_like(self) -> bool {
        matches!(self, SessionType::InterviewLike | SessionType::FullInterview)
    }

    pub fn is_tracking(self) -> bool {
        matches!(self, SessionType::Tracking)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOrigin {
    Generator,
    Tracking,
    Interview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReasonType {
    TriggeredReview,
    LearningReview,
    New,
    PassiveMastered,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionReason {
    #[serde(rename = "type")]
    pub kind: SelectionReasonType,
    pub reason: String,
    pub triggered_by: Option<i64>,
    pub aggregate_strength: Option<f64>,
}

impl SelectionReason {
    pub fn new(kind: SelectionReasonType, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
            triggered_by: None,
            aggregate_strength: None,
        }
    }

    pub fn triggered(reason: impl Into<String>, triggered_by: i64, aggregate_strength: f64) -> Self {
        Self {
            kind: SelectionReasonType::TriggeredReview,
            reason: reason.into(),
            triggered_by: Some(triggered_by),
            aggregate_strength: Some(aggregate_strength),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionProblem {
    pub problem: Problem,
    pub selection_reason: SelectionReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub date: DateTime<Utc>,
    pub status: SessionStatus,
    pub problems: Vec<SessionProblem>,
    pub attempts: Vec<Attempt>,
    pub session_type: SessionType,
    pub origin: SessionOrigin,
    pub last_activity_time: DateTime<Utc>,
}

impl Session {
    pub fn leetcode_ids(&self) -> BTreeSet<i64> {
        self.problems.iter().map(|p| p.problem.leetcode_id).collect()
    }

    pub fn attempted_leetcode_ids(&self, problems_by_id: &HashMap<Uuid, i64>) -> BTreeSet<i64> {
        self.attempts
            .iter()
            .filter_map(|a| problems_by_id.get(&a.problem_id).copied())
            .collect()
    }

    /// Every session problem has at least one recorded attempt.
    pub fn all_problems_attempted(&self, problems_by_id: &HashMap<Uuid, i64>) -> bool {
        if self.problems.is_empty() {
            return false;
        }
        let attempted = self.attempted_leetcode_ids(problems_by_id);
        self.problems
            .iter()
            .all(|p| attempted.contains(&p.problem.leetcode_id))
    }
}

// ============================================================================
// PATTERN LADDER
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternLadderEntry {
    pub leetcode_id: i64,
    pub difficulty: Difficulty,
    pub decay_score: f64,
    pub connections: Vec<i64>,
    pub attempted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternLadder {
    pub tag: String,
    pub problems: Vec<PatternLadderEntry>,
    pub ladder_size: usize,
}

impl PatternLadder {
    pub fn all_attempted(&self) -> bool {
        !self.problems.is_empty() && self.problems.iter().all(|p| p.attempted)
    }

    pub fn mark_attempted(&mut self, leetcode_id: i64) {
        for entry in &mut self.problems {
            if entry.leetcode_id == leetcode_id {
                entry.attempted = true;
            }
        }
    }
}

// ============================================================================
// SESSION ANALYTICS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionAnalytics {
    pub session_id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub accuracy: f64,
    pub avg_time_seconds: f64,
    pub strong_tags: Vec<String>,
    pub weak_tags: Vec<String>,
    pub predominant_difficulty: Difficulty,
}

// ============================================================================
// MASTERY DELTA
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasteryDelta {
    pub tag: String,
    pub pre_mastered: bool,
    pub post_mastered: bool,
    pub strength_delta: i64,
    pub decay_delta: f64,
}

impl MasteryDelta {
    pub fn is_no_op(&self) -> bool {
        self.pre_mastered == self.post_mastered
            && self.strength_delta == 0
            && self.decay_delta.abs() < f64::EPSILON
    }
}

// ============================================================================
// STALENESS CLASSIFICATION (§6)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalenessClass {
    Active,
    InterviewActive,
    InterviewStale,
    InterviewAbandoned,
    TrackingActive,
    TrackingStale,
    AbandonedAtStart,
    AutoCompleteCandidate,
    StalledWithProgress,
    TrackingOnlyUser,
    Unclear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    NoAction,
    Expire,
    AutoComplete,
    CreateNewTracking,
    RefreshGuidedSession,
    FlagForUserChoice,
}

impl StalenessClass {
    /// Recommended-action mapping, bit-exact per §6.
    pub fn recommended_action(self) -> RecommendedAction {
        match self {
            StalenessClass::AbandonedAtStart | StalenessClass::InterviewAbandoned => {
                RecommendedAction::Expire
            }
            StalenessClass::AutoCompleteCandidate => RecommendedAction::AutoComplete,
            StalenessClass::TrackingStale => RecommendedAction::CreateNewTracking,
            StalenessClass::TrackingOnlyUser => RecommendedAction::RefreshGuidedSession,
            StalenessClass::StalledWithProgress | StalenessClass::InterviewStale => {
                RecommendedAction::FlagForUserChoice
            }
            StalenessClass::Active | StalenessClass::Unclear => RecommendedAction::NoAction,
            StalenessClass::InterviewActive
            | StalenessClass::TrackingActive => RecommendedAction::NoAction,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StalenessClassification {
    pub class: StalenessClass,
    pub action: RecommendedAction,
}

impl StalenessClassification {
    pub fn new(class: StalenessClass) -> Self {
        Self {
            class,
            action: class.recommended_action(),
        }
    }
}
