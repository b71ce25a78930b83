//! A single tracked target within one particle's hypothesis.

use std::fmt;

use serde::Serialize;

use crate::tracker::error::{FilterError, Result};
use crate::tracker::kalman_filter::{KalmanFilter, StateCovariance, StateVector};
use crate::tracker::lifetime::LifetimeModel;
use crate::tracker::target_state::TargetState;

/// Permanent target identifier, assigned in creation order within a `TargetSet`.
///
/// Unlike a living index, an id never changes when other targets die.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TargetId(pub u64);

impl TargetId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Estimated state of a target at one timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub time: f64,
    pub position: f64,
    pub velocity: f64,
}

impl StateSnapshot {
    fn new(time: f64, mean: &StateVector) -> Self {
        Self {
            time,
            position: mean[0],
            velocity: mean[1],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Target {
    /// Permanent identifier
    pub id: TargetId,
    /// Lifecycle state
    pub state: TargetState,
    /// Time the target was born
    pub birth_time: f64,
    /// Time of the most recent measurement association
    pub last_association: f64,
    mean: StateVector,
    covariance: StateCovariance,
    /// One entry per timestep the target was alive, oldest first
    history: Vec<StateSnapshot>,
    /// Death probability for the current timestep; `None` until the first
    /// timestep after birth
    death_probability: Option<f64>,
}

impl Target {
    /// Create a target from the measurement that gave birth to it.
    pub fn new(id: TargetId, kalman_filter: &KalmanFilter, measurement: f64, time: f64) -> Self {
        let (mean, covariance) = kalman_filter.initiate(measurement);
        Self {
            id,
            state: TargetState::Alive,
            birth_time: time,
            last_association: time,
            mean,
            covariance,
            history: vec![StateSnapshot::new(time, &mean)],
            death_probability: None,
        }
    }

    pub fn mean(&self) -> &StateVector {
        &self.mean
    }

    pub fn covariance(&self) -> &StateCovariance {
        &self.covariance
    }

    pub fn position(&self) -> f64 {
        self.mean[0]
    }

    pub fn velocity(&self) -> f64 {
        self.mean[1]
    }

    pub fn history(&self) -> &[StateSnapshot] {
        &self.history
    }

    pub fn is_alive(&self) -> bool {
        self.state == TargetState::Alive
    }

    pub fn age(&self, time: f64) -> f64 {
        time - self.birth_time
    }

    pub fn death_probability(&self) -> Option<f64> {
        self.death_probability
    }

    /// Snapshot recorded at exactly `time`, if the target existed then.
    pub fn state_at(&self, time: f64) -> Option<&StateSnapshot> {
        let idx = self.history.partition_point(|s| s.time < time);
        self.history.get(idx).filter(|s| s.time == time)
    }

    fn last_time(&self) -> f64 {
        self.history.last().map_or(self.birth_time, |s| s.time)
    }

    /// Recompute the death probability for the step `(previous_time, time]`.
    pub fn refresh_death_probability(
        &mut self,
        lifetime: &LifetimeModel,
        time: f64,
        previous_time: f64,
    ) {
        self.death_probability =
            Some(lifetime.death_probability(self.last_association, time, previous_time));
    }

    /// Run the Kalman prediction to `time` and append it to the history.
    ///
    /// The target must currently be at `time - dt`.
    pub fn predict(&mut self, kalman_filter: &KalmanFilter, time: f64, dt: f64) -> Result<()> {
        let found = self.last_time();
        if (found - (time - dt)).abs() > kalman_filter.time_tolerance() {
            return Err(FilterError::StaleHistory {
                target: self.id,
                expected: time - dt,
                found,
            });
        }

        let (mean, covariance) = kalman_filter.predict(&self.mean, &self.covariance, time, dt)?;
        self.mean = mean;
        self.covariance = covariance;
        self.history.push(StateSnapshot::new(time, &self.mean));
        Ok(())
    }

    /// Fold a measurement taken at `time` into the current estimate.
    ///
    /// Prediction must already have run for `time`; the latest history entry is
    /// replaced rather than appended.
    pub fn update(
        &mut self,
        kalman_filter: &KalmanFilter,
        measurement: f64,
        time: f64,
    ) -> Result<()> {
        let found = self.last_time();
        if (found - time).abs() > kalman_filter.time_tolerance() {
            return Err(FilterError::StaleHistory {
                target: self.id,
                expected: time,
                found,
            });
        }

        let (mean, covariance) = kalman_filter.update(&self.mean, &self.covariance, measurement);
        self.mean = mean;
        self.covariance = covariance;
        if let Some(last) = self.history.last_mut() {
            *last = StateSnapshot::new(time, &self.mean);
        }
        self.last_association = time;
        Ok(())
    }

    pub fn mark_dead(&mut self) {
        self.state = TargetState::Dead;
        self.death_probability = None;
    }
}
