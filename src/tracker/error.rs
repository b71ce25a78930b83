//! Error types for the particle filter.
//!
//! Every variant is a fatal precondition failure: the filter is a deterministic
//! numerical simulation and there is no recovery path once one of these fires.

use thiserror::Error;

use crate::tracker::target::TargetId;

/// Errors raised while configuring or running the particle filter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    /// A configuration field is outside its admissible range.
    #[error("invalid configuration `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// Elapsed time between timesteps does not match the nominal interval.
    #[error("time step mismatch at t={time}: dt={dt}, expected {expected}")]
    TimeStepMismatch { time: f64, dt: f64, expected: f64 },

    /// Timestamps must be strictly increasing.
    #[error("timestamp {time} does not follow previous timestamp {previous}")]
    NonIncreasingTime { time: f64, previous: f64 },

    /// Kalman predict/update called against a history that is not at the expected time.
    #[error("target {target}: history is at t={found}, expected t={expected}")]
    StaleHistory {
        target: TargetId,
        expected: f64,
        found: f64,
    },

    /// A distribution that must sum to one does not.
    #[error("{context}: probabilities sum to {sum}")]
    ProbabilityMass { context: &'static str, sum: f64 },

    /// A probability lies outside its admissible range.
    #[error("{context}: value {value} at index {index} is out of range")]
    InvalidProbability {
        context: &'static str,
        index: usize,
        value: f64,
    },

    /// Importance weights can no longer be normalized.
    #[error("importance weights are degenerate (sum = {sum})")]
    DegenerateWeights { sum: f64 },

    /// A particle's weight after resampling is not exactly 1/N.
    #[error("particle {index} has weight {weight} after resampling, expected {expected}")]
    ResampleInvariant {
        index: usize,
        weight: f64,
        expected: f64,
    },

    /// Living target bookkeeping is out of sync.
    #[error("living count {living_count} does not match {living} living targets")]
    LivingCountMismatch { living_count: usize, living: usize },

    /// An association names a living index past the end of the living set.
    #[error("association names living target {index} but only {living} are alive")]
    UnknownTarget { index: usize, living: usize },

    /// A statistical distribution rejected its parameters.
    #[error("distribution error: {0}")]
    Distribution(String),

    /// Error raised while processing one particle at one timestep.
    #[error("particle {particle} at t={time}: {source}")]
    InParticle {
        time: f64,
        particle: usize,
        #[source]
        source: Box<FilterError>,
    },
}

impl FilterError {
    /// Attach the timestep and particle index to an error raised inside a particle.
    pub fn in_particle(self, time: f64, particle: usize) -> Self {
        FilterError::InParticle {
            time,
            particle,
            source: Box::new(self),
        }
    }

    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        FilterError::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = FilterError> = std::result::Result<T, E>;
