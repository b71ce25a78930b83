//! TrackerPipeline for combining a measurement source with the particle filter.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::debug;

use crate::tracker::{FilterConfig, FilterError, ParticleFilter, StepReport};

use super::{ClearMotSummary, DenseRow, MeasurementSource, TrackEvaluator, TrackTable};

/// Failure of either half of the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError<E> {
    #[error("measurement source failed")]
    Source(#[source] E),
    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Bundles a `MeasurementSource` with a `ParticleFilter`.
///
/// Scans are pulled from the source and stepped through the filter in order;
/// the estimate is read from the highest-weight particle.
pub struct TrackerPipeline<S: MeasurementSource, R = ChaCha8Rng> {
    source: S,
    filter: ParticleFilter<R>,
    times: Vec<f64>,
}

impl<S: MeasurementSource> TrackerPipeline<S> {
    /// Create a new tracking pipeline with the given source and filter config.
    pub fn new(source: S, config: FilterConfig) -> Result<Self, FilterError> {
        Ok(Self::with_filter(source, ParticleFilter::new(config)?))
    }

    /// Create a new tracking pipeline with default filter configuration.
    pub fn with_default_config(source: S) -> Result<Self, FilterError> {
        Self::new(source, FilterConfig::default())
    }
}

impl<S: MeasurementSource, R: Rng> TrackerPipeline<S, R> {
    /// Use an already constructed filter, e.g. one with a fixed seed.
    pub fn with_filter(source: S, filter: ParticleFilter<R>) -> Self {
        Self {
            source,
            filter,
            times: Vec::new(),
        }
    }

    /// Pull one scan and step the filter with it.
    ///
    /// Returns `Ok(None)` once the source is exhausted.
    pub fn process_scan(&mut self) -> Result<Option<StepReport>, PipelineError<S::Error>> {
        let Some(scan) = self.source.next_scan().map_err(PipelineError::Source)? else {
            return Ok(None);
        };
        let report = self.filter.step(scan.time, &scan.measurements)?;
        self.times.push(scan.time);
        Ok(Some(report))
    }

    /// Drain the source and return the final estimate.
    pub fn run(&mut self) -> Result<TrackTable, PipelineError<S::Error>> {
        while self.process_scan()?.is_some() {}
        debug!(
            scans = self.times.len(),
            resamplings = self.filter.resample_count(),
            "measurement source exhausted"
        );
        Ok(self.estimate())
    }

    /// Tracks of the highest-weight particle.
    pub fn estimate(&self) -> TrackTable {
        TrackTable::from_particle(self.filter.best_particle())
    }

    /// Timestamps processed so far.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Score the current estimate at every processed timestamp.
    pub fn evaluate_with<E: TrackEvaluator>(
        &self,
        evaluator: &mut E,
        ground_truth: &[DenseRow],
        max_distance: f64,
    ) -> Result<ClearMotSummary, E::Error> {
        let estimate = self.estimate().dense(&self.times);
        evaluator.evaluate(ground_truth, &estimate, max_distance)
    }

    /// Get a reference to the underlying source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Get a mutable reference to the underlying source.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Get a reference to the underlying filter.
    pub fn filter(&self) -> &ParticleFilter<R> {
        &self.filter
    }

    /// Get a mutable reference to the underlying filter.
    pub fn filter_mut(&mut self) -> &mut ParticleFilter<R> {
        &mut self.filter
    }
}
