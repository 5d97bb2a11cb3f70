use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationSeconds, serde_as};

use crate::{
    error::ConfigError,
    policy::RunMode,
    session::personality::PersonalityPreset,
};

/// Every tunable knob of the negotiation engine.
///
/// Constructed once per engine; validation is fail-fast and an invalid
/// configuration never reaches a session.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Absolute cap on negotiation rounds per session.
    pub max_rounds: u32,

    /// Buyer acceptance threshold on composite utility, in [0, 1].
    pub min_acceptable_utility: f64,

    /// Annual discount rate for TCO present-valuing.
    pub discount_rate_annual: f64,

    /// Whether hard violations terminate sessions or are only recorded.
    pub run_mode: RunMode,

    /// Per-round deadline for collaborator work (rationale, events).
    #[serde_as(as = "DurationSeconds<u64>")]
    pub round_timeout: Duration,

    /// Concurrent session cap; excess sessions queue FIFO.
    pub max_concurrent_sessions: usize,

    /// Personality preset applied to sessions that do not override it.
    pub personality_preset: PersonalityPreset,

    /// Seed for all session-local randomness. Two runs with the same seed
    /// and inputs produce byte-identical round memories.
    pub random_seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rounds: 8,
            min_acceptable_utility: 0.7,
            discount_rate_annual: 0.05,
            run_mode: RunMode::Simulation,
            round_timeout: Duration::from_secs(30),
            max_concurrent_sessions: 8,
            personality_preset: PersonalityPreset::Cooperative,
            random_seed: 0,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rounds == 0 {
            return Err(ConfigError::OutOfRange {
                knob: "max_rounds",
                value: 0.0,
            });
        }
        if !(0.0..=1.0).contains(&self.min_acceptable_utility) {
            return Err(ConfigError::OutOfRange {
                knob: "min_acceptable_utility",
                value: self.min_acceptable_utility,
            });
        }
        if !(0.0..1.0).contains(&self.discount_rate_annual) {
            return Err(ConfigError::OutOfRange {
                knob: "discount_rate_annual",
                value: self.discount_rate_annual,
            });
        }
        if self.max_concurrent_sessions == 0 {
            return Err(ConfigError::OutOfRange {
                knob: "max_concurrent_sessions",
                value: 0.0,
            });
        }
        if self.round_timeout.is_zero() {
            return Err(ConfigError::OutOfRange {
                knob: "round_timeout",
                value: 0.0,
            });
        }
        Ok(())
    }

    pub fn with_max_rounds(self, max_rounds: u32) -> Self {
        Self { max_rounds, ..self }
    }

    pub fn with_run_mode(self, run_mode: RunMode) -> Self {
        Self { run_mode, ..self }
    }

    pub fn with_random_seed(self, random_seed: u64) -> Self {
        Self {
            random_seed,
            ..self
        }
    }

    pub fn with_round_timeout(self, round_timeout: Duration) -> Self {
        Self {
            round_timeout,
            ..self
        }
    }

    pub fn with_max_concurrent_sessions(self, max_concurrent_sessions: usize) -> Self {
        Self {
            max_concurrent_sessions,
            ..self
        }
    }

    pub fn with_personality_preset(self, personality_preset: PersonalityPreset) -> Self {
        Self {
            personality_preset,
            ..self
        }
    }
}
