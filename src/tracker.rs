mod association;
mod error;
mod kalman_filter;
mod lifetime;
mod particle;
mod particle_filter;
mod sampling;
mod target;
mod target_set;
mod target_state;

pub use association::{
    Association, AssociationEvent, AssociationSampler, DeathSampling, EventTable,
    SampledAssociation,
};
pub use error::{FilterError, Result};
pub use kalman_filter::{KalmanFilter, StateCovariance, StateVector};
pub use lifetime::LifetimeModel;
pub use particle::{MeasurementOutcome, Particle};
pub use particle_filter::{FilterConfig, ParticleFilter, StepReport, TargetCount};
pub use sampling::{Categorical, effective_sample_size, stratified_resample};
pub use target::{StateSnapshot, Target, TargetId};
pub use target_set::TargetSet;
pub use target_state::TargetState;
