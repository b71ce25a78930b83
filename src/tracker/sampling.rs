//! Categorical sampling over normalized weight sequences.
//!
//! Both the association sampler and stratified resampling map uniform draws to
//! indices through the same cumulative distribution.

use rand::Rng;

use crate::tracker::error::{FilterError, Result};

/// Cumulative form of a normalized weight sequence.
#[derive(Debug, Clone)]
pub struct Categorical {
    cumulative: Vec<f64>,
}

impl Categorical {
    /// Build from weights that must be non-negative and sum to one within `tolerance`.
    pub fn new(weights: &[f64], tolerance: f64, context: &'static str) -> Result<Self> {
        let mut cumulative = Vec::with_capacity(weights.len());
        let mut total = 0.0;
        for (index, &w) in weights.iter().enumerate() {
            if !w.is_finite() || w < 0.0 {
                return Err(FilterError::InvalidProbability {
                    context,
                    index,
                    value: w,
                });
            }
            total += w;
            cumulative.push(total);
        }
        if weights.is_empty() || (total - 1.0).abs() > tolerance {
            return Err(FilterError::ProbabilityMass {
                context,
                sum: total,
            });
        }
        // Rounding must not leave a gap at the top of [0, 1), nor hand that gap
        // to trailing zero-weight entries.
        if let Some(last_positive) = weights.iter().rposition(|&w| w > 0.0) {
            cumulative[last_positive..].fill(1.0);
        }
        Ok(Self { cumulative })
    }

    pub fn len(&self) -> usize {
        self.cumulative.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cumulative.is_empty()
    }

    /// Index whose cumulative interval contains `u` in `[0, 1)`.
    ///
    /// Zero-weight entries are never returned.
    pub fn index_of(&self, u: f64) -> usize {
        let idx = self.cumulative.partition_point(|&c| c <= u);
        idx.min(self.cumulative.len() - 1)
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        self.index_of(rng.r#gen::<f64>())
    }
}

/// Stratified resampling: one uniform draw in each of `n` equal strata of `[0, 1)`.
pub fn stratified_resample<R: Rng + ?Sized>(
    weights: &[f64],
    tolerance: f64,
    rng: &mut R,
) -> Result<Vec<usize>> {
    let distribution = Categorical::new(weights, tolerance, "resampling weights")?;
    let n = weights.len();
    Ok((0..n)
        .map(|i| {
            let u = (i as f64 + rng.r#gen::<f64>()) / n as f64;
            distribution.index_of(u)
        })
        .collect())
}

/// Effective sample size `1 / sum(w^2)` of normalized weights.
pub fn effective_sample_size(weights: &[f64]) -> f64 {
    1.0 / weights.iter().map(|w| w * w).sum::<f64>()
}
