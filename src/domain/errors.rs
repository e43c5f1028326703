use thiserror::Error;

/// Error kinds the engine can surface, per the error-handling design (spec §7).
///
/// Pure-function kinds (`InvalidInput`, `InternalInvariant`) signal a
/// programmer bug and are never retried. I/O kinds (`StoreUnavailable`,
/// `Timeout`, `StaleTransaction`) are candidates for the bounded-backoff
/// retry layer in [`crate::retry`]. `Cancelled` always propagates
/// immediately. `ConstraintViolation` reports a failed append (e.g. a
/// duplicate session id) without corrupting unrelated entities.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("stale transaction: {0}")]
    StaleTransaction(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

impl EngineError {
    /// Whether this error kind is eligible for the bounded-backoff retry
    /// layer (§5 Retries / §7 Propagation).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::StoreUnavailable(_) | EngineError::Timeout(_) | EngineError::StaleTransaction(_)
        )
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
