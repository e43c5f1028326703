pub mod assembler;
pub mod cache;
pub mod config;
pub mod decay;
pub mod domain;
pub mod engine;
pub mod ladders;
pub mod lock;
pub mod mastery;
pub mod ports;
pub mod reducer;
pub mod retry;
pub mod scheduler;
pub mod settings;
pub mod staleness;
pub mod tier;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use domain::{
    Attempt, AttemptStats, Difficulty, EngineError, EngineResult, EscapeHatches, LastPerformance, MasteryDelta,
    PatternLadder, PatternLadderEntry, PromotionType, RecommendedAction, SelectionReason, SelectionReasonType,
    Session, SessionAnalytics, SessionOrigin, SessionProblem, SessionState, SessionStatus, SessionType,
    StalenessClass, StalenessClassification, StruggleHistory, TagClassification, TagMastery, TagRelationship,
    UserProblem,
};

pub use ports::{
    AttemptLog, Clock, PatternLadderStore, ProblemCatalog, SessionAnalyticsStore, SessionStateStore, SessionStore,
    SystemClock, TagMasteryStore, TagRelationshipStore, UserProblemStore,
};

pub use config::{EngineConfig, OptimalPathWeights, RetryConfig};

pub use engine::Engine;

pub use assembler::Assembler;
pub use reducer::{Reducer, ReducerOutcome};
