//! One weighted hypothesis of the particle filter.

use rand::Rng;
use tracing::trace;

use crate::tracker::association::{Association, AssociationSampler, DeathSampling};
use crate::tracker::error::{FilterError, Result};
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::lifetime::LifetimeModel;
use crate::tracker::target::TargetId;
use crate::tracker::target_set::TargetSet;

/// What one particle decided for one measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementOutcome {
    pub association: Association,
    /// Target that took the measurement (existing or newly born)
    pub target: Option<TargetId>,
    /// Targets archived while processing the measurement
    pub killed: Vec<TargetId>,
    /// Factor the importance weight was multiplied by
    pub weight_factor: f64,
}

impl MeasurementOutcome {
    pub fn is_birth(&self) -> bool {
        self.association == Association::Birth
    }
}

/// A full hypothesis: its targets and importance weight.
///
/// `Clone` is a deep copy; resampled particles share no state.
#[derive(Debug, Clone)]
pub struct Particle {
    targets: TargetSet,
    /// Targets that took a measurement during the current timestep
    data_associations: Vec<TargetId>,
    pub weight: f64,
}

impl Particle {
    pub fn new(weight: f64) -> Self {
        Self {
            targets: TargetSet::new(),
            data_associations: Vec::new(),
            weight,
        }
    }

    pub fn targets(&self) -> &TargetSet {
        &self.targets
    }

    pub fn data_associations(&self) -> &[TargetId] {
        &self.data_associations
    }

    /// Forget the previous timestep's associations.
    pub fn clear_data_associations(&mut self) {
        self.data_associations.clear();
    }

    /// Bring every living target to `time`: refresh death probabilities for
    /// `(previous_time, time]` and run the Kalman prediction.
    pub fn advance(
        &mut self,
        kalman_filter: &KalmanFilter,
        lifetime: &LifetimeModel,
        time: f64,
        previous_time: f64,
    ) -> Result<()> {
        self.targets.refresh_death_probabilities(lifetime, time, previous_time);
        self.targets.predict(kalman_filter, time, time - previous_time)
    }

    /// Sample an explanation for `measurement` and apply it.
    pub fn update_with_measurement<R: Rng + ?Sized>(
        &mut self,
        sampler: &AssociationSampler,
        kalman_filter: &KalmanFilter,
        measurement: f64,
        time: f64,
        rng: &mut R,
    ) -> Result<MeasurementOutcome> {
        let mut killed = Vec::new();

        let sampled = match sampler.death_sampling {
            DeathSampling::Joint => {
                let table = sampler.joint_events(kalman_filter, &self.targets, measurement)?;
                sampler.sample(&table, rng)?
            }
            DeathSampling::Independent => {
                let deaths = sampler.sample_deaths(&self.targets, rng)?;
                for &index in deaths.iter().rev() {
                    killed.extend(self.targets.kill_target(index));
                }
                let table =
                    sampler.association_events(kalman_filter, &self.targets, measurement)?;
                sampler.sample(&table, rng)?
            }
        };

        self.weight *= sampled.normalization;

        let target = self.apply_association(sampled.association, kalman_filter, measurement, time)?;
        self.data_associations.extend(target);

        // Births are appended, so the sampled living index is still valid here.
        if let Some(index) = sampled.death {
            killed.extend(self.targets.kill_target(index));
        }

        trace!(
            association = ?sampled.association,
            ?target,
            ?killed,
            weight_factor = sampled.normalization,
            "measurement processed"
        );

        Ok(MeasurementOutcome {
            association: sampled.association,
            target,
            killed,
            weight_factor: sampled.normalization,
        })
    }

    /// Give `measurement` to the associated target, founding one on a birth.
    fn apply_association(
        &mut self,
        association: Association,
        kalman_filter: &KalmanFilter,
        measurement: f64,
        time: f64,
    ) -> Result<Option<TargetId>> {
        match association {
            Association::Clutter => Ok(None),
            Association::Birth => {
                Ok(Some(self.targets.create_target(kalman_filter, measurement, time)))
            }
            Association::Target(index) => {
                let living = self.targets.living_count();
                let target = self
                    .targets
                    .living_mut(index)
                    .ok_or(FilterError::UnknownTarget { index, living })?;
                target.update(kalman_filter, measurement, time)?;
                Ok(Some(target.id))
            }
        }
    }
}
