use chrono::{DateTime, Utc};

/// Abstracts wall-clock access so the engine's orchestration layer (not the
/// pure functions, which always take `now` explicitly) can be driven by a
/// fake clock in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Start of the user's current day, for "days since" accounting that
    /// should not be sensitive to time-of-day.
    fn day_boundary(&self) -> DateTime<Utc> {
        self.now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is a valid time")
            .and_utc()
    }
}

/// `Clock` implementation backed by the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
