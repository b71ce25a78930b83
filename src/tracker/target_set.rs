//! Collection of all targets belonging to one hypothesis.

use crate::tracker::error::{FilterError, Result};
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::lifetime::LifetimeModel;
use crate::tracker::target::{Target, TargetId};

/// Living and archived targets of one particle.
///
/// Every target ever created lives in the archive, indexed by its id. The living
/// sequence holds ids; a target's position in it (its "living index") shifts as
/// other targets die.
#[derive(Debug, Clone, Default)]
pub struct TargetSet {
    archive: Vec<Target>,
    living: Vec<TargetId>,
}

impl TargetSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn living_count(&self) -> usize {
        self.living.len()
    }

    pub fn total_count(&self) -> usize {
        self.archive.len()
    }

    /// All targets ever created, alive and dead, in creation order.
    pub fn archive(&self) -> &[Target] {
        &self.archive
    }

    pub fn get(&self, id: TargetId) -> Option<&Target> {
        self.archive.get(id.index())
    }

    /// Target at a living index.
    pub fn living(&self, living_index: usize) -> Option<&Target> {
        self.living.get(living_index).map(|id| &self.archive[id.index()])
    }

    pub fn living_mut(&mut self, living_index: usize) -> Option<&mut Target> {
        let id = *self.living.get(living_index)?;
        self.archive.get_mut(id.index())
    }

    pub fn living_ids(&self) -> &[TargetId] {
        &self.living
    }

    pub fn iter_living(&self) -> impl Iterator<Item = &Target> + '_ {
        self.living.iter().map(|id| &self.archive[id.index()])
    }

    /// Create a target from a measurement and append it to both sequences.
    pub fn create_target(
        &mut self,
        kalman_filter: &KalmanFilter,
        measurement: f64,
        time: f64,
    ) -> TargetId {
        let id = TargetId(self.archive.len() as u64);
        self.archive.push(Target::new(id, kalman_filter, measurement, time));
        self.living.push(id);
        id
    }

    /// Archive the target at `living_index`.
    ///
    /// When killing several targets in one pass, remove indices highest first.
    pub fn kill_target(&mut self, living_index: usize) -> Option<TargetId> {
        if living_index >= self.living.len() {
            return None;
        }
        let id = self.living.remove(living_index);
        self.archive[id.index()].mark_dead();
        Some(id)
    }

    pub fn refresh_death_probabilities(
        &mut self,
        lifetime: &LifetimeModel,
        time: f64,
        previous_time: f64,
    ) {
        for id in &self.living {
            self.archive[id.index()].refresh_death_probability(lifetime, time, previous_time);
        }
    }

    pub fn predict(&mut self, kalman_filter: &KalmanFilter, time: f64, dt: f64) -> Result<()> {
        for id in &self.living {
            self.archive[id.index()].predict(kalman_filter, time, dt)?;
        }
        Ok(())
    }

    /// Check that the living sequence agrees with the archive.
    pub fn check_consistency(&self) -> Result<()> {
        let alive = self.archive.iter().filter(|t| t.is_alive()).count();
        if alive != self.living.len() {
            return Err(FilterError::LivingCountMismatch {
                living_count: self.living.len(),
                living: alive,
            });
        }
        Ok(())
    }
}
