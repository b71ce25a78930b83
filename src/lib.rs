//! Rao-Blackwellized particle filter for tracking an unknown, time-varying
//! number of targets from unlabeled scalar measurements.
//!
//! Each particle carries one hypothesis of which measurements belong to which
//! target, which are clutter, and when targets were born or died. Target
//! kinematics are integrated out analytically by per-target constant-velocity
//! Kalman filters.
//!
//! ```no_run
//! use rbpf_tracker::{FilterConfig, ParticleFilter};
//!
//! let mut filter = ParticleFilter::with_seed(FilterConfig::default(), 7)?;
//! for step in 0..100 {
//!     let time = step as f64 * 0.01;
//!     filter.step(time, &[0.5 * time])?;
//! }
//! let best = filter.best_particle();
//! println!("{} living targets", best.targets().living_count());
//! # Ok::<(), rbpf_tracker::FilterError>(())
//! ```

pub mod integration;
pub mod tracker;

pub use integration::{MeasurementSource, Scan, ScanBuilder, TrackTable, TrackerPipeline};
pub use tracker::{FilterConfig, FilterError, ParticleFilter, StepReport, TargetId};
