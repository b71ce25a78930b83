//! Integration module for connecting measurement sources and evaluators with
//! the particle filter.
//!
//! This module provides traits and utilities for feeding recorded or live
//! scans into the tracker and for handing its estimate to a CLEAR-MOT scorer.

mod builder;
mod estimate;
mod pipeline;
mod source;

pub use builder::{ScanBuilder, uniform_stream};
pub use estimate::{ClearMotSummary, DenseRow, Timestamp, TrackEvaluator, TrackTable};
pub use pipeline::{PipelineError, TrackerPipeline};
pub use source::{IntoScans, MeasurementSource, Scan};
