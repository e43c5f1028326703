pub mod attempt_log;
pub mod catalog;
pub mod clock;
pub mod ladder_store;
pub mod session_analytics_store;
pub mod session_state_store;
pub mod session_store;
pub mod tag_mastery_store;
pub mod tag_relationship_store;
pub mod user_problem_store;

pub use attempt_log::AttemptLog;
pub use catalog::ProblemCatalog;
pub use clock::{Clock, SystemClock};
pub use ladder_store::PatternLadderStore;
pub use session_analytics_store::SessionAnalyticsStore;
pub use session_state_store::SessionStateStore;
pub use session_store::SessionStore;
pub use tag_mastery_store::TagMasteryStore;
pub use tag_relationship_store::TagRelationshipStore;
pub use user_problem_store::UserProblemStore;

#[cfg(any(test, feature = "testing"))]
pub use attempt_log::MockAttemptLog;
#[cfg(any(test, feature = "testing"))]
pub use catalog::MockProblemCatalog;
#[cfg(any(test, feature = "testing"))]
pub use ladder_store::MockPatternLadderStore;
#[cfg(any(test, feature = "testing"))]
pub use session_analytics_store::MockSessionAnalyticsStore;
#[cfg(any(test, feature = "testing"))]
pub use session_state_store::MockSessionStateStore;
#[cfg(any(test, feature = "testing"))]
pub use session_store::MockSessionStore;
#[cfg(any(test, feature = "testing"))]
pub use tag_mastery_store::MockTagMasteryStore;
#[cfg(any(test, feature = "testing"))]
pub use tag_relationship_store::MockTagRelationshipStore;
#[cfg(any(test, feature = "testing"))]
pub use user_problem_store::MockUserProblemStore;
