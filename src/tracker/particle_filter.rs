//! Rao-Blackwellized particle filter over target association hypotheses.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::tracker::association::{Association, AssociationSampler, DeathSampling};
use crate::tracker::error::{FilterError, Result};
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::lifetime::LifetimeModel;
use crate::tracker::particle::Particle;
use crate::tracker::sampling::{effective_sample_size, stratified_resample};

/// Configuration for the particle filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub num_particles: usize,
    /// Resample when the effective particle count drops below `num_particles / resample_ratio`
    pub resample_ratio: f64,
    /// Nominal interval between timesteps
    pub time_step: f64,
    pub time_step_tolerance: f64,
    pub measurement_sigma: f64,
    /// Velocity variance of a newborn target
    pub initial_velocity_variance: f64,
    pub process_noise_spectral_density: f64,
    pub p_clutter_prior: f64,
    pub p_clutter_likelihood: f64,
    pub p_birth_prior: f64,
    pub p_birth_likelihood: f64,
    /// Shape of the Gamma distributed time between associations
    pub death_shape: f64,
    /// Rate of the Gamma distributed time between associations
    pub death_rate: f64,
    pub death_sampling: DeathSampling,
    /// Renormalize joint event priors even when targets are alive
    pub normalize_event_priors: bool,
    pub probability_tolerance: f64,
    /// Targets younger than this are left out of mature target counts
    pub min_target_age: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            num_particles: 10,
            resample_ratio: 1.0001,
            time_step: 0.01,
            time_step_tolerance: 1e-8,
            measurement_sigma: 0.2,
            initial_velocity_variance: 1.0,
            process_noise_spectral_density: 0.1,
            p_clutter_prior: 0.01,
            p_clutter_likelihood: 0.1,
            p_birth_prior: 0.0025,
            p_birth_likelihood: 0.1,
            death_shape: 2.0,
            death_rate: 1.0,
            death_sampling: DeathSampling::Joint,
            normalize_event_priors: false,
            probability_tolerance: 1e-6,
            min_target_age: 0.2,
        }
    }
}

impl FilterConfig {
    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| FilterError::config("json", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        fn positive(field: &'static str, value: f64) -> Result<()> {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(FilterError::config(field, format!("must be positive, got {value}")))
            }
        }
        fn probability(field: &'static str, value: f64) -> Result<()> {
            if (0.0..1.0).contains(&value) {
                Ok(())
            } else {
                Err(FilterError::config(field, format!("must lie in [0, 1), got {value}")))
            }
        }
        fn non_negative(field: &'static str, value: f64) -> Result<()> {
            if value >= 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(FilterError::config(field, format!("must be non-negative, got {value}")))
            }
        }

        if self.num_particles == 0 {
            return Err(FilterError::config("num_particles", "must be at least 1"));
        }
        if !(self.resample_ratio >= 1.0) {
            return Err(FilterError::config(
                "resample_ratio",
                format!("must be at least 1, got {}", self.resample_ratio),
            ));
        }
        positive("time_step", self.time_step)?;
        positive("time_step_tolerance", self.time_step_tolerance)?;
        positive("measurement_sigma", self.measurement_sigma)?;
        positive("initial_velocity_variance", self.initial_velocity_variance)?;
        non_negative("process_noise_spectral_density", self.process_noise_spectral_density)?;
        probability("p_clutter_prior", self.p_clutter_prior)?;
        probability("p_birth_prior", self.p_birth_prior)?;
        if self.p_clutter_prior + self.p_birth_prior >= 1.0 {
            return Err(FilterError::config(
                "p_birth_prior",
                "clutter and birth priors must leave mass for target associations",
            ));
        }
        if self.p_clutter_prior + self.p_birth_prior == 0.0 {
            return Err(FilterError::config(
                "p_birth_prior",
                "clutter and birth priors cannot both be zero",
            ));
        }
        non_negative("p_clutter_likelihood", self.p_clutter_likelihood)?;
        non_negative("p_birth_likelihood", self.p_birth_likelihood)?;
        positive("death_shape", self.death_shape)?;
        positive("death_rate", self.death_rate)?;
        positive("probability_tolerance", self.probability_tolerance)?;
        non_negative("min_target_age", self.min_target_age)?;
        Ok(())
    }

    fn sampler(&self) -> AssociationSampler {
        AssociationSampler {
            p_clutter_prior: self.p_clutter_prior,
            p_clutter_likelihood: self.p_clutter_likelihood,
            p_birth_prior: self.p_birth_prior,
            p_birth_likelihood: self.p_birth_likelihood,
            normalize_event_priors: self.normalize_event_priors,
            tolerance: self.probability_tolerance,
            death_sampling: self.death_sampling,
        }
    }

    fn kalman_filter(&self) -> KalmanFilter {
        KalmanFilter::new(
            self.time_step,
            self.time_step_tolerance,
            self.process_noise_spectral_density,
            self.measurement_sigma,
            self.initial_velocity_variance,
        )
    }
}

/// Summary of one processed timestep.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub time: f64,
    /// Number of measurements in the scan
    pub measurements: usize,
    /// Sampled association per measurement, per particle: `associations[m][p]`
    pub associations: Vec<Vec<Association>>,
    pub births: usize,
    pub deaths: usize,
    /// Living targets per particle after the step (before resampling)
    pub living_counts: Vec<usize>,
    /// Effective particle count that drove the resampling decision
    pub effective_particles: f64,
    pub resampled: bool,
}

/// Target counts of one particle, for monitoring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetCount {
    pub living: usize,
    /// Living targets older than the requested minimum age
    pub mature: usize,
    pub weight: f64,
}

pub struct ParticleFilter<R = ChaCha8Rng> {
    config: FilterConfig,
    kalman_filter: KalmanFilter,
    lifetime: LifetimeModel,
    sampler: AssociationSampler,
    particles: Vec<Particle>,
    previous_time: Option<f64>,
    resample_count: usize,
    rng: R,
}

impl ParticleFilter<ChaCha8Rng> {
    pub fn new(config: FilterConfig) -> Result<Self> {
        Self::with_rng(config, ChaCha8Rng::from_entropy())
    }

    /// Filter with a fixed seed; identical inputs give identical runs.
    pub fn with_seed(config: FilterConfig, seed: u64) -> Result<Self> {
        Self::with_rng(config, ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: Rng> ParticleFilter<R> {
    pub fn with_rng(config: FilterConfig, rng: R) -> Result<Self> {
        config.validate()?;
        let lifetime = LifetimeModel::new(config.death_shape, config.death_rate)?;
        let weight = 1.0 / config.num_particles as f64;
        Ok(Self {
            kalman_filter: config.kalman_filter(),
            sampler: config.sampler(),
            lifetime,
            particles: (0..config.num_particles).map(|_| Particle::new(weight)).collect(),
            previous_time: None,
            resample_count: 0,
            config,
            rng,
        })
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn previous_time(&self) -> Option<f64> {
        self.previous_time
    }

    pub fn resample_count(&self) -> usize {
        self.resample_count
    }

    pub fn weights(&self) -> Vec<f64> {
        self.particles.iter().map(|p| p.weight).collect()
    }

    pub fn effective_particle_count(&self) -> f64 {
        effective_sample_size(&self.weights())
    }

    /// Particle with the largest importance weight; the first one on ties.
    pub fn best_particle(&self) -> &Particle {
        let mut best = &self.particles[0];
        for particle in &self.particles[1..] {
            if particle.weight > best.weight {
                best = particle;
            }
        }
        best
    }

    /// Per-particle target counts at the last processed timestamp; targets
    /// no older than `min_age` are not counted as mature.
    pub fn target_counts(&self, min_age: f64) -> Vec<TargetCount> {
        let time = self.previous_time.unwrap_or(f64::NEG_INFINITY);
        self.particles
            .iter()
            .map(|p| TargetCount {
                living: p.targets().living_count(),
                mature: p
                    .targets()
                    .iter_living()
                    .filter(|t| t.age(time) > min_age)
                    .count(),
                weight: p.weight,
            })
            .collect()
    }

    /// Process every measurement taken at `time`.
    pub fn step(&mut self, time: f64, measurements: &[f64]) -> Result<StepReport> {
        if let Some(previous) = self.previous_time {
            if !(time > previous) {
                return Err(FilterError::NonIncreasingTime { time, previous });
            }
            self.kalman_filter.check_time_step(time, time - previous)?;
        }

        for (i, particle) in self.particles.iter_mut().enumerate() {
            particle.clear_data_associations();
            if let Some(previous) = self.previous_time {
                particle
                    .advance(&self.kalman_filter, &self.lifetime, time, previous)
                    .map_err(|e| e.in_particle(time, i))?;
            }
        }

        let mut associations = Vec::with_capacity(measurements.len());
        let mut births = 0;
        let mut deaths = 0;
        for &measurement in measurements {
            let mut chosen = Vec::with_capacity(self.particles.len());
            for (i, particle) in self.particles.iter_mut().enumerate() {
                let outcome = particle
                    .update_with_measurement(
                        &self.sampler,
                        &self.kalman_filter,
                        measurement,
                        time,
                        &mut self.rng,
                    )
                    .map_err(|e| e.in_particle(time, i))?;
                births += usize::from(outcome.is_birth());
                deaths += outcome.killed.len();
                chosen.push(outcome.association);
            }
            self.normalize_weights()?;
            associations.push(chosen);
        }

        let living_counts = self.living_counts(time)?;
        let effective_particles = self.effective_particle_count();
        let threshold = self.config.num_particles as f64 / self.config.resample_ratio;
        let resampled = effective_particles < threshold;
        if resampled {
            self.resample()?;
            info!(
                time,
                effective_particles,
                resample_count = self.resample_count,
                "resampled particles"
            );
        }

        self.previous_time = Some(time);

        let mature: Vec<usize> = self
            .target_counts(self.config.min_target_age)
            .iter()
            .map(|c| c.mature)
            .collect();
        debug!(
            time,
            measurements = measurements.len(),
            births,
            deaths,
            ?living_counts,
            ?mature,
            effective_particles,
            "step complete"
        );

        Ok(StepReport {
            time,
            measurements: measurements.len(),
            associations,
            births,
            deaths,
            living_counts,
            effective_particles,
            resampled,
        })
    }

    /// Feed a time-ordered measurement stream through the filter.
    pub fn run<I, M>(&mut self, stream: I) -> Result<Vec<StepReport>>
    where
        I: IntoIterator<Item = (f64, M)>,
        M: AsRef<[f64]>,
    {
        stream
            .into_iter()
            .map(|(time, measurements)| self.step(time, measurements.as_ref()))
            .collect()
    }

    fn living_counts(&self, time: f64) -> Result<Vec<usize>> {
        self.particles
            .iter()
            .enumerate()
            .map(|(i, p)| {
                p.targets()
                    .check_consistency()
                    .map_err(|e| e.in_particle(time, i))?;
                Ok(p.targets().living_count())
            })
            .collect()
    }

    fn normalize_weights(&mut self) -> Result<()> {
        let sum: f64 = self.particles.iter().map(|p| p.weight).sum();
        if !(sum > 0.0) || !sum.is_finite() {
            return Err(FilterError::DegenerateWeights { sum });
        }
        for particle in &mut self.particles {
            particle.weight /= sum;
        }

        let total: f64 = self.particles.iter().map(|p| p.weight).sum();
        if (total - 1.0).abs() > self.config.probability_tolerance {
            return Err(FilterError::ProbabilityMass {
                context: "particle weights",
                sum: total,
            });
        }
        Ok(())
    }

    /// Replace the particle set by stratified draws from itself, with uniform weights.
    fn resample(&mut self) -> Result<()> {
        let indices = stratified_resample(
            &self.weights(),
            self.config.probability_tolerance,
            &mut self.rng,
        )?;
        let weight = 1.0 / self.particles.len() as f64;
        self.particles = indices
            .into_iter()
            .map(|i| {
                let mut particle = self.particles[i].clone();
                particle.weight = weight;
                particle
            })
            .collect();

        for (index, particle) in self.particles.iter().enumerate() {
            if particle.weight != weight {
                return Err(FilterError::ResampleInvariant {
                    index,
                    weight: particle.weight,
                    expected: weight,
                });
            }
        }

        self.resample_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp(steps: usize) -> Vec<(f64, Vec<f64>)> {
        (0..steps)
            .map(|i| (i as f64 * 0.01, vec![i as f64 * 0.1]))
            .collect()
    }

    #[test]
    fn test_default_config_is_valid() {
        FilterConfig::default().validate().unwrap();
    }

    #[test]
    fn test_config_validation() {
        let config = FilterConfig {
            num_particles: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(FilterError::InvalidConfig { field: "num_particles", .. })
        ));

        let config = FilterConfig {
            p_clutter_prior: 0.6,
            p_birth_prior: 0.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = FilterConfig {
            resample_ratio: 0.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        // Nothing could explain the first measurement.
        let config = FilterConfig {
            p_clutter_prior: 0.0,
            p_birth_prior: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_json_uses_defaults() {
        let json = r#"{"num_particles": 25, "death_sampling": "Independent"}"#;
        let config = FilterConfig::from_json(json).unwrap();
        assert_eq!(config.num_particles, 25);
        assert_eq!(config.death_sampling, DeathSampling::Independent);
        assert_eq!(config.time_step, 0.01);
    }

    #[test]
    fn test_initial_weights_uniform() {
        let filter = ParticleFilter::with_seed(FilterConfig::default(), 0).unwrap();
        assert_eq!(filter.particles().len(), 10);
        for p in filter.particles() {
            assert_eq!(p.weight, 0.1);
        }
    }

    #[test]
    fn test_weights_normalized_after_each_step() {
        let mut filter = ParticleFilter::with_seed(FilterConfig::default(), 1).unwrap();
        for (time, measurements) in ramp(20) {
            filter.step(time, &measurements).unwrap();
            let sum: f64 = filter.weights().iter().sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_rejects_off_nominal_spacing() {
        let mut filter = ParticleFilter::with_seed(FilterConfig::default(), 1).unwrap();
        filter.step(0.0, &[0.0]).unwrap();
        let err = filter.step(0.05, &[0.0]).unwrap_err();
        assert!(matches!(err, FilterError::TimeStepMismatch { .. }));
    }

    #[test]
    fn test_rejects_repeated_timestamp() {
        let mut filter = ParticleFilter::with_seed(FilterConfig::default(), 1).unwrap();
        filter.step(0.0, &[0.0]).unwrap();
        let err = filter.step(0.0, &[0.0]).unwrap_err();
        assert!(matches!(err, FilterError::NonIncreasingTime { .. }));
    }

    #[test]
    fn test_resample_restores_uniform_weights() {
        let mut filter = ParticleFilter::with_seed(FilterConfig::default(), 4).unwrap();
        filter.step(0.0, &[0.0]).unwrap();
        for (i, p) in filter.particles.iter_mut().enumerate() {
            p.weight = if i == 0 { 0.91 } else { 0.01 };
        }
        filter.resample().unwrap();
        assert_eq!(filter.particles().len(), 10);
        for p in filter.particles() {
            assert_eq!(p.weight, 1.0 / 10.0);
        }
        assert_eq!(filter.resample_count(), 1);
    }

    #[test]
    fn test_best_particle_first_on_ties() {
        let mut filter = ParticleFilter::with_seed(FilterConfig::default(), 4).unwrap();
        for (i, p) in filter.particles.iter_mut().enumerate() {
            p.weight = if i == 2 || i == 5 { 0.3 } else { 0.05 };
        }
        assert!(std::ptr::eq(filter.best_particle(), &filter.particles()[2]));
    }

    #[test]
    fn test_empty_scan_still_predicts() {
        // Without clutter the first measurement is a birth in every particle.
        let config = FilterConfig {
            p_clutter_prior: 0.0,
            ..Default::default()
        };
        let mut filter = ParticleFilter::with_seed(config, 2).unwrap();
        filter.step(0.0, &[1.0]).unwrap();
        let report = filter.step(0.01, &[]).unwrap();
        assert!(report.associations.is_empty());
        let best = filter.best_particle();
        let target = best.targets().iter_living().next().unwrap();
        assert_eq!(target.history().len(), 2);
    }

    #[test]
    fn test_target_counts() {
        let mut filter = ParticleFilter::with_seed(FilterConfig::default(), 3).unwrap();
        filter.step(0.0, &[1.0]).unwrap();
        let counts = filter.target_counts(0.0);
        assert_eq!(counts.len(), 10);
        for c in &counts {
            assert_eq!(c.mature, 0);
            assert!(c.living <= 1);
        }

        filter.step(0.01, &[1.0]).unwrap();
        for c in filter.target_counts(0.005) {
            // Anything alive since the first step is now old enough.
            assert!(c.mature <= c.living);
        }
    }
}
