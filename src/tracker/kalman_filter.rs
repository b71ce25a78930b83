//! Constant-velocity Kalman filter for a scalar position measurement using nalgebra.
//!
//! State is `[position, velocity]`. The filter itself holds only the model
//! matrices; each target owns its own mean and covariance.

use nalgebra::{Matrix2, RowVector2, Vector2};
use statrs::distribution::{Continuous, Normal};

use crate::tracker::error::{FilterError, Result};

pub type StateVector = Vector2<f64>;
pub type StateCovariance = Matrix2<f64>;

#[derive(Debug, Clone)]
pub struct KalmanFilter {
    time_step: f64,
    time_step_tolerance: f64,
    motion_mat: Matrix2<f64>,
    process_cov: Matrix2<f64>,
    update_mat: RowVector2<f64>,
    measurement_var: f64,
    initial_cov: Matrix2<f64>,
}

impl KalmanFilter {
    /// Build the model for a fixed sampling interval.
    ///
    /// Process noise follows the discrete white-noise-acceleration model
    /// `q * [[dt^3/3, dt^2/2], [dt^2/2, dt]]` evaluated at the nominal interval.
    pub fn new(
        time_step: f64,
        time_step_tolerance: f64,
        spectral_density: f64,
        measurement_sigma: f64,
        initial_velocity_variance: f64,
    ) -> Self {
        let dt = time_step;
        let motion_mat = Matrix2::new(1.0, dt, 0.0, 1.0);
        let process_cov = Matrix2::new(
            dt.powi(3) / 3.0,
            dt.powi(2) / 2.0,
            dt.powi(2) / 2.0,
            dt,
        ) * spectral_density;
        let measurement_var = measurement_sigma * measurement_sigma;

        Self {
            time_step,
            time_step_tolerance,
            motion_mat,
            process_cov,
            update_mat: RowVector2::new(1.0, 0.0),
            measurement_var,
            initial_cov: Matrix2::new(measurement_var, 0.0, 0.0, initial_velocity_variance),
        }
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    pub fn time_tolerance(&self) -> f64 {
        self.time_step_tolerance
    }

    pub fn measurement_var(&self) -> f64 {
        self.measurement_var
    }

    pub fn process_cov(&self) -> &Matrix2<f64> {
        &self.process_cov
    }

    /// Initial state for a target born from a measurement: at rest, at the measured position.
    pub fn initiate(&self, measurement: f64) -> (StateVector, StateCovariance) {
        (Vector2::new(measurement, 0.0), self.initial_cov)
    }

    /// Reject any `dt` that differs from the nominal interval.
    pub fn check_time_step(&self, time: f64, dt: f64) -> Result<()> {
        if (dt - self.time_step).abs() > self.time_step_tolerance {
            return Err(FilterError::TimeStepMismatch {
                time,
                dt,
                expected: self.time_step,
            });
        }
        Ok(())
    }

    /// Propagate a state estimate forward by `dt`.
    ///
    /// `dt` must match the nominal interval; process noise is fixed at that interval.
    pub fn predict(
        &self,
        mean: &StateVector,
        covariance: &StateCovariance,
        time: f64,
        dt: f64,
    ) -> Result<(StateVector, StateCovariance)> {
        self.check_time_step(time, dt)?;

        let new_mean = self.motion_mat * mean;
        let new_covariance =
            self.motion_mat * covariance * self.motion_mat.transpose() + self.process_cov;

        Ok((new_mean, new_covariance))
    }

    /// Project a state estimate into measurement space: `(H x, H P H^T + R)`.
    pub fn project(&self, mean: &StateVector, covariance: &StateCovariance) -> (f64, f64) {
        let projected_mean = (self.update_mat * mean)[0];
        let projected_var =
            (self.update_mat * covariance * self.update_mat.transpose())[0] + self.measurement_var;
        (projected_mean, projected_var)
    }

    pub fn update(
        &self,
        mean: &StateVector,
        covariance: &StateCovariance,
        measurement: f64,
    ) -> (StateVector, StateCovariance) {
        let (projected_mean, projected_var) = self.project(mean, covariance);
        let innovation = measurement - projected_mean;

        // K = P * H^T * S^-1, with S a scalar
        let kalman_gain = covariance * self.update_mat.transpose() / projected_var;

        let new_mean = mean + kalman_gain * innovation;
        // Subtractive form; (I - KH) P loses symmetry over long runs.
        let new_covariance = covariance - kalman_gain * projected_var * kalman_gain.transpose();

        (new_mean, new_covariance)
    }

    /// Density of `measurement` under the predicted measurement distribution.
    pub fn likelihood(
        &self,
        mean: &StateVector,
        covariance: &StateCovariance,
        measurement: f64,
    ) -> Result<f64> {
        let (projected_mean, projected_var) = self.project(mean, covariance);
        let normal = Normal::new(projected_mean, projected_var.sqrt())
            .map_err(|e| FilterError::Distribution(e.to_string()))?;
        Ok(normal.pdf(measurement))
    }
}
