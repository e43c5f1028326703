//! Engine configuration (spec §12 / SPEC_FULL §12). Every numeric knob the
//! spec leaves as "implementer's choice, expose as configuration" lives
//! here with its documented default, so callers can tune behavior without
//! forking the crate.

use std::time::Duration;

use crate::domain::{EngineError, EngineResult};

/// Weights for Priority 3's "optimal path" candidate scoring (§4.F, §9
/// Open Question). The spec names the three signals the score should
/// combine — tag-mastery need, relationship strength to the user's focus
/// tags, and a focus-tag bonus — without a closed-form weighting; these
/// defaults were chosen to keep mastery need dominant while still letting
/// a strongly-connected candidate outrank a weakly-connected one (see
/// DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimalPathWeights {
    /// Weight on `1 - tag_mastery` (how much the candidate's tags still
    /// need practice).
    pub mastery_need: f64,
    /// Weight on summed relationship strength to the user's current focus
    /// tags.
    pub relationship_strength: f64,
    /// Flat bonus added when the candidate carries a focus tag directly.
    pub focus_bonus: f64,
}

impl Default for OptimalPathWeights {
    fn default() -> Self {
        Self {
            mastery_need: 1.0,
            relationship_strength: 0.5,
            focus_bonus: 0.25,
        }
    }
}

/// Retry policy for I/O error kinds (§5 Retries / §7 Propagation).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Minimum aggregate relationship weight for a bridge problem to
    /// qualify as a triggered review (§4.F Priority 1). Default `0.5`.
    pub triggered_review_threshold: f64,
    /// The "≈40%" Hard-problem ceiling the guard rail enforces (§4.F, §9).
    /// Default `0.4`.
    pub guard_rail_hard_fraction: f64,
    /// Recent-accuracy threshold at or below which the guard rail is
    /// eligible to fire (§4.F Safety guard rails / S5). Default `0.4`.
    pub guard_rail_accuracy_threshold: f64,
    pub optimal_path_weights: OptimalPathWeights,
    /// Bounded read-cache capacity (§5 Caching). Default `50`.
    pub cache_capacity: usize,
    /// Bounded read-cache TTL (§5 Caching). Default 5 minutes.
    pub cache_ttl: Duration,
    pub retry: RetryConfig,
    /// Deadline for a single session-assembly call (§5 Cancellation /
    /// timeouts). Default 20s.
    pub assembly_deadline: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            triggered_review_threshold: 0.5,
            guard_rail_hard_fraction: 0.4,
            guard_rail_accuracy_threshold: 0.4,
            optimal_path_weights: OptimalPathWeights::default(),
            cache_capacity: 50,
            cache_ttl: Duration::from_secs(5 * 60),
            retry: RetryConfig::default(),
            assembly_deadline: Duration::from_secs(20),
        }
    }
}

impl EngineConfig {
    /// Rejects malformed configuration (negative fractions, zero
    /// capacities, …) with `InvalidInput` rather than letting a bad value
    /// panic deep inside the pipeline later.
    pub fn validate(&self) -> EngineResult<()> {
        let unit_fractions = [
            ("triggered_review_threshold", self.triggered_review_threshold),
            ("guard_rail_hard_fraction", self.guard_rail_hard_fraction),
            ("guard_rail_accuracy_threshold", self.guard_rail_accuracy_threshold),
        ];
        for (name, value) in unit_fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::InvalidInput(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        if self.cache_capacity == 0 {
            return Err(EngineError::InvalidInput("cache_capacity must be positive".into()));
        }

        if self.retry.max_attempts == 0 {
            return Err(EngineError::InvalidInput("retry.max_attempts must be positive".into()));
        }

        if self.retry.base_delay > self.retry.max_delay {
            return Err(EngineError::InvalidInput(
                "retry.base_delay must not exceed retry.max_delay".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn negative_fraction_is_rejected() {
        let mut config = EngineConfig::default();
        config.guard_rail_hard_fraction = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_cache_capacity_is_rejected() {
        let mut config = EngineConfig::default();
        config.cache_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn base_delay_exceeding_max_delay_is_rejected() {
        let mut config = EngineConfig::default();
        config.retry.base_delay = Duration::from_secs(10);
        config.retry.max_delay = Duration::from_secs(1);
        assert!(config.validate().is_err());
    }
}
