//! Trait for streams of time-stamped measurement scans.

use std::collections::VecDeque;
use std::convert::Infallible;

use serde::{Deserialize, Serialize};

/// All measurements taken at one timestamp.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Scan {
    pub time: f64,
    pub measurements: Vec<f64>,
}

impl Scan {
    pub fn new(time: f64, measurements: Vec<f64>) -> Self {
        Self { time, measurements }
    }

    /// A timestamp at which nothing was measured.
    pub fn empty(time: f64) -> Self {
        Self::new(time, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}

/// Anything that yields scans in increasing time order.
///
/// Implement this trait to feed a sensor, a recorded file, or a simulator
/// into the tracker.
///
/// # Example
///
/// ```ignore
/// use rbpf_tracker::{MeasurementSource, Scan};
///
/// struct Radar {
///     // Your device handle here
/// }
///
/// impl MeasurementSource for Radar {
///     type Error = std::io::Error;
///
///     fn next_scan(&mut self) -> Result<Option<Scan>, Self::Error> {
///         // Read one sweep and return its range measurements
///         Ok(None)
///     }
/// }
/// ```
pub trait MeasurementSource {
    /// Error type for acquisition failures.
    type Error;

    /// Next scan, or `None` once the source is exhausted.
    fn next_scan(&mut self) -> Result<Option<Scan>, Self::Error>;
}

impl MeasurementSource for VecDeque<Scan> {
    type Error = Infallible;

    fn next_scan(&mut self) -> Result<Option<Scan>, Self::Error> {
        Ok(self.pop_front())
    }
}

/// Helper trait for turning recorded data into a replayable source.
pub trait IntoScans {
    fn into_scans(self) -> VecDeque<Scan>;
}

impl IntoScans for Vec<Scan> {
    fn into_scans(self) -> VecDeque<Scan> {
        self.into()
    }
}

impl IntoScans for Vec<(f64, Vec<f64>)> {
    fn into_scans(self) -> VecDeque<Scan> {
        self.into_iter()
            .map(|(time, measurements)| Scan::new(time, measurements))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_in_order() {
        let recorded: Vec<(f64, Vec<f64>)> =
            vec![(0.0, vec![1.0]), (0.01, vec![]), (0.02, vec![2.0, 3.0])];
        let mut source = recorded.into_scans();

        assert_eq!(source.next_scan().unwrap(), Some(Scan::new(0.0, vec![1.0])));
        assert!(source.next_scan().unwrap().unwrap().is_empty());
        assert_eq!(source.next_scan().unwrap().unwrap().len(), 2);
        assert_eq!(source.next_scan().unwrap(), None);
    }

    #[test]
    fn test_scan_serde() {
        let scan: Scan = serde_json::from_str(r#"{"time": 0.5, "measurements": [1.5]}"#).unwrap();
        assert_eq!(scan, Scan::new(0.5, vec![1.5]));
    }
}
