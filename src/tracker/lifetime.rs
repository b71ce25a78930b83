//! Target lifetime model.
//!
//! The time since a target was last associated with a measurement is modelled as
//! Gamma distributed. The per-timestep death probability is the hazard over
//! `(previous, current]` conditioned on survival up to `previous`.

use statrs::distribution::{ContinuousCDF, Gamma};

use crate::tracker::error::{FilterError, Result};

#[derive(Debug, Clone)]
pub struct LifetimeModel {
    gamma: Gamma,
    rate: f64,
}

impl LifetimeModel {
    pub fn new(shape: f64, rate: f64) -> Result<Self> {
        let gamma = Gamma::new(shape, rate).map_err(|e| FilterError::Distribution(e.to_string()))?;
        Ok(Self { gamma, rate })
    }

    /// Probability of surviving `age` time units without an association.
    pub fn survival(&self, age: f64) -> f64 {
        if age <= 0.0 { 1.0 } else { self.gamma.sf(age) }
    }

    /// Probability that a target last associated at `last_association` dies in
    /// `(previous_time, current_time]`, given it was alive at `previous_time`.
    ///
    /// This is the death probability the target would have if it were the only
    /// one; the association sampler spreads it across joint events.
    pub fn death_probability(
        &self,
        last_association: f64,
        current_time: f64,
        previous_time: f64,
    ) -> f64 {
        let survived = self.survival(previous_time - last_association);
        let still_alive = self.survival(current_time - last_association);
        if survived < f64::MIN_POSITIVE || still_alive < f64::MIN_POSITIVE {
            return self.tail_hazard(current_time - previous_time);
        }
        (survived - still_alive) / survived
    }

    /// Death probability over `dt` once the Gamma hazard has settled at its rate.
    ///
    /// Deep in the tail the survival function underflows, so the ratio of
    /// survivals is replaced by its limit.
    fn tail_hazard(&self, dt: f64) -> f64 {
        -(-self.rate * dt).exp_m1()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_survival_at_zero_age() {
        let model = LifetimeModel::new(2.0, 1.0).unwrap();
        assert_eq!(model.survival(0.0), 1.0);
    }

    #[test]
    fn test_death_probability_matches_closed_form() {
        // Gamma(2, 1) survival is e^-x (1 + x).
        let model = LifetimeModel::new(2.0, 1.0).unwrap();
        let sf = |x: f64| (-x).exp() * (1.0 + x);
        let p = model.death_probability(0.0, 0.51, 0.5);
        assert_relative_eq!(p, (sf(0.5) - sf(0.51)) / sf(0.5), epsilon = 1e-10);
        assert!(p > 0.0 && p < 1.0);
    }

    #[test]
    fn test_death_probability_grows_with_age() {
        let model = LifetimeModel::new(2.0, 1.0).unwrap();
        let young = model.death_probability(0.0, 0.02, 0.01);
        let old = model.death_probability(0.0, 2.01, 2.0);
        assert!(old > young);
    }

    #[test]
    fn test_long_silence_stays_finite() {
        let model = LifetimeModel::new(2.0, 1.0).unwrap();
        let p = model.death_probability(0.0, 800.01, 800.0);
        assert!(p.is_finite());
        assert!(p > 0.0 && p < 1.0);
        assert_relative_eq!(p, 1.0 - (-0.01f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn test_tail_hazard_continuous_before_underflow() {
        // Survival is still representable at age 600, and the exact hazard is
        // already close to its limit there.
        let model = LifetimeModel::new(2.0, 1.0).unwrap();
        let exact = model.death_probability(0.0, 600.01, 600.0);
        let limit = model.death_probability(0.0, 800.01, 800.0);
        assert_relative_eq!(exact, limit, max_relative = 1e-2);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(LifetimeModel::new(-1.0, 1.0).is_err());
        assert!(LifetimeModel::new(2.0, 0.0).is_err());
    }
}
