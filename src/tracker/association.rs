//! Joint measurement association and target death sampling.
//!
//! For one measurement and one particle's living targets, every mutually
//! exclusive outcome (clutter, birth, or a living target; optionally combined
//! with the death of one living target) is enumerated with its prior and
//! likelihood. One outcome is drawn from the normalized product, and the sum of
//! the unnormalized products becomes the particle's importance weight factor.

use ndarray::Array1;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::tracker::error::{FilterError, Result};
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::sampling::Categorical;
use crate::tracker::target_set::TargetSet;

/// Where a measurement came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Association {
    /// False alarm, explained by no target
    Clutter,
    /// A target not tracked before
    Birth,
    /// The living target at this index
    Target(usize),
}

/// How target deaths are proposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeathSampling {
    /// Deaths sampled jointly with the association, at most one per measurement.
    #[default]
    Joint,
    /// Each target dies independently before the association is sampled.
    Independent,
}

/// One enumerated outcome of a measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssociationEvent {
    pub association: Association,
    /// Living index of the target that dies, if any
    pub death: Option<usize>,
}

/// Enumerated outcomes with their priors and likelihoods.
#[derive(Debug, Clone)]
pub struct EventTable {
    events: Vec<AssociationEvent>,
    priors: Array1<f64>,
    likelihoods: Array1<f64>,
}

impl EventTable {
    fn from_parts(events: Vec<AssociationEvent>, priors: Vec<f64>, likelihoods: Vec<f64>) -> Self {
        Self {
            events,
            priors: Array1::from_vec(priors),
            likelihoods: Array1::from_vec(likelihoods),
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[AssociationEvent] {
        &self.events
    }

    pub fn priors(&self) -> &Array1<f64> {
        &self.priors
    }

    pub fn likelihoods(&self) -> &Array1<f64> {
        &self.likelihoods
    }

    fn check_priors(&self) -> Result<()> {
        for (index, &p) in self.priors.iter().enumerate() {
            if !p.is_finite() || !(0.0..=1.0).contains(&p) {
                return Err(FilterError::InvalidProbability {
                    context: "event prior",
                    index,
                    value: p,
                });
            }
        }
        Ok(())
    }

    fn normalize_priors(&mut self, tolerance: f64) -> Result<()> {
        let total = self.priors.sum();
        if !(total > 0.0) {
            return Err(FilterError::ProbabilityMass {
                context: "event priors",
                sum: total,
            });
        }
        self.priors /= total;
        self.check_prior_mass(tolerance)
    }

    fn check_prior_mass(&self, tolerance: f64) -> Result<()> {
        let sum = self.priors.sum();
        if (sum - 1.0).abs() > tolerance {
            return Err(FilterError::ProbabilityMass {
                context: "event priors",
                sum,
            });
        }
        Ok(())
    }

    /// Normalized importance distribution and its normalizing constant.
    pub fn importance(&self) -> Result<(Array1<f64>, f64)> {
        let weights = &self.priors * &self.likelihoods;
        let normalization = weights.sum();
        if !(normalization > 0.0) || !normalization.is_finite() {
            return Err(FilterError::ProbabilityMass {
                context: "unnormalized importance distribution",
                sum: normalization,
            });
        }
        Ok((weights / normalization, normalization))
    }
}

/// The outcome drawn for one measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampledAssociation {
    pub association: Association,
    pub death: Option<usize>,
    /// Factor to multiply the particle's importance weight by
    pub normalization: f64,
}

/// Builds and samples the association distribution of a single measurement.
#[derive(Debug, Clone)]
pub struct AssociationSampler {
    pub p_clutter_prior: f64,
    pub p_clutter_likelihood: f64,
    pub p_birth_prior: f64,
    pub p_birth_likelihood: f64,
    pub normalize_event_priors: bool,
    pub tolerance: f64,
    pub death_sampling: DeathSampling,
}

impl AssociationSampler {
    fn p_target(&self) -> f64 {
        1.0 - self.p_clutter_prior - self.p_birth_prior
    }

    fn target_likelihoods(
        &self,
        kalman_filter: &KalmanFilter,
        targets: &TargetSet,
        measurement: f64,
    ) -> Result<Vec<f64>> {
        targets
            .iter_living()
            .map(|t| kalman_filter.likelihood(t.mean(), t.covariance(), measurement))
            .collect()
    }

    /// Death probability of every living target; targets born this timestep count as zero.
    fn death_probabilities(&self, targets: &TargetSet) -> Result<Vec<f64>> {
        targets
            .iter_living()
            .enumerate()
            .map(|(index, t)| match t.death_probability() {
                None => Ok(0.0),
                Some(d) if d > 0.0 && d < 1.0 => Ok(d),
                Some(d) => Err(FilterError::InvalidProbability {
                    context: "target death probability",
                    index,
                    value: d,
                }),
            })
            .collect()
    }

    /// Enumerate the joint association and death events: `2 + T` without a death,
    /// `2T` where a target dies and the measurement is clutter or a birth, and
    /// `T(T-1)` where one target dies and another takes the measurement.
    pub fn joint_events(
        &self,
        kalman_filter: &KalmanFilter,
        targets: &TargetSet,
        measurement: f64,
    ) -> Result<EventTable> {
        let n = targets.living_count();
        let deaths = self.death_probabilities(targets)?;
        let likelihoods = self.target_likelihoods(kalman_filter, targets, measurement)?;
        let none_die: f64 = deaths.iter().map(|d| 1.0 - d).product();
        let p_target = self.p_target();

        let capacity = 2 + 3 * n + n * n.saturating_sub(1);
        let mut events = Vec::with_capacity(capacity);
        let mut priors = Vec::with_capacity(capacity);
        let mut event_likelihoods = Vec::with_capacity(capacity);
        let mut push =
            |association: Association, death: Option<usize>, prior: f64, likelihood: f64| {
                events.push(AssociationEvent { association, death });
                priors.push(prior);
                event_likelihoods.push(likelihood);
            };

        // No deaths
        push(
            Association::Clutter,
            None,
            none_die * self.p_clutter_prior,
            self.p_clutter_likelihood,
        );
        push(
            Association::Birth,
            None,
            none_die * self.p_birth_prior,
            self.p_birth_likelihood,
        );
        for (i, &likelihood) in likelihoods.iter().enumerate() {
            push(Association::Target(i), None, none_die * p_target / n as f64, likelihood);
        }

        // Exactly one death
        let only_dies = |d: usize| none_die / (1.0 - deaths[d]) * deaths[d];
        for d in 0..n {
            push(
                Association::Clutter,
                Some(d),
                only_dies(d) * self.p_clutter_prior,
                self.p_clutter_likelihood,
            );
        }
        for d in 0..n {
            push(
                Association::Birth,
                Some(d),
                only_dies(d) * self.p_birth_prior,
                self.p_birth_likelihood,
            );
        }
        for d in 0..n {
            for (a, &likelihood) in likelihoods.iter().enumerate() {
                if a == d {
                    continue;
                }
                push(
                    Association::Target(a),
                    Some(d),
                    only_dies(d) * p_target / (n - 1) as f64,
                    likelihood,
                );
            }
        }

        let mut table = EventTable::from_parts(events, priors, event_likelihoods);
        debug_assert_eq!(table.len(), capacity);
        table.check_priors()?;
        if n == 0 || self.normalize_event_priors {
            table.normalize_priors(self.tolerance)?;
        }
        Ok(table)
    }

    /// Enumerate the `2 + T` association-only events, deaths having been sampled already.
    pub fn association_events(
        &self,
        kalman_filter: &KalmanFilter,
        targets: &TargetSet,
        measurement: f64,
    ) -> Result<EventTable> {
        let n = targets.living_count();
        let likelihoods = self.target_likelihoods(kalman_filter, targets, measurement)?;

        let mut events = vec![
            AssociationEvent {
                association: Association::Clutter,
                death: None,
            },
            AssociationEvent {
                association: Association::Birth,
                death: None,
            },
        ];
        let mut priors = vec![self.p_clutter_prior, self.p_birth_prior];
        let mut event_likelihoods = vec![self.p_clutter_likelihood, self.p_birth_likelihood];
        for (i, likelihood) in likelihoods.into_iter().enumerate() {
            events.push(AssociationEvent {
                association: Association::Target(i),
                death: None,
            });
            priors.push(self.p_target() / n as f64);
            event_likelihoods.push(likelihood);
        }

        let mut table = EventTable::from_parts(events, priors, event_likelihoods);
        table.check_priors()?;
        if n == 0 {
            table.normalize_priors(self.tolerance)?;
        } else {
            table.check_prior_mass(self.tolerance)?;
        }
        Ok(table)
    }

    /// Draw each living target's death independently; returns living indices, ascending.
    pub fn sample_deaths<R: Rng + ?Sized>(
        &self,
        targets: &TargetSet,
        rng: &mut R,
    ) -> Result<Vec<usize>> {
        let mut killed = Vec::new();
        for (index, target) in targets.iter_living().enumerate() {
            let Some(d) = target.death_probability() else {
                continue;
            };
            if !(d > 0.0 && d < 1.0) {
                return Err(FilterError::InvalidProbability {
                    context: "target death probability",
                    index,
                    value: d,
                });
            }
            if rng.r#gen::<f64>() < d {
                killed.push(index);
            }
        }
        Ok(killed)
    }

    /// Draw one event from the importance distribution of `table`.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        table: &EventTable,
        rng: &mut R,
    ) -> Result<SampledAssociation> {
        let (distribution, normalization) = table.importance()?;
        let categorical =
            Categorical::new(&distribution.to_vec(), self.tolerance, "importance distribution")?;
        let index = categorical.sample(rng);
        let event = table.events[index];

        Ok(SampledAssociation {
            association: event.association,
            death: event.death,
            normalization,
        })
    }
}
