//! Builders for measurement scans.

use super::Scan;

/// Builder for a single `Scan`.
#[derive(Debug, Clone, Default)]
pub struct ScanBuilder {
    time: f64,
    measurements: Vec<f64>,
}

impl ScanBuilder {
    /// Create a new scan builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timestamp.
    pub fn at(mut self, time: f64) -> Self {
        self.time = time;
        self
    }

    /// Add one measurement.
    pub fn measurement(mut self, value: f64) -> Self {
        self.measurements.push(value);
        self
    }

    /// Add several measurements.
    pub fn measurements<I: IntoIterator<Item = f64>>(mut self, values: I) -> Self {
        self.measurements.extend(values);
        self
    }

    /// Build the final `Scan`.
    pub fn build(self) -> Scan {
        Scan::new(self.time, self.measurements)
    }
}

/// One single-measurement scan per value, at `start + i * time_step`.
pub fn uniform_stream<I>(start: f64, time_step: f64, values: I) -> Vec<Scan>
where
    I: IntoIterator<Item = f64>,
{
    values
        .into_iter()
        .enumerate()
        .map(|(i, value)| Scan::new(start + i as f64 * time_step, vec![value]))
        .collect()
}
