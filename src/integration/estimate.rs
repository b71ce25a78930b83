//! Track estimates laid out per timestamp, the form CLEAR-MOT evaluation
//! consumes.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tracker::{Particle, StateSnapshot, TargetId, TargetSet};

/// Timestamp usable as an ordered map key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Timestamp(pub f64);

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Estimated target states keyed by timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackTable {
    rows: BTreeMap<Timestamp, Vec<(TargetId, StateSnapshot)>>,
    /// Every target in the source set, in id order
    targets: Vec<TargetId>,
}

/// Positions of every known target at one timestamp; `None` where the target
/// did not exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseRow {
    pub time: f64,
    pub positions: Vec<Option<f64>>,
}

impl TrackTable {
    /// Collect the history of every target, dead or alive.
    pub fn from_targets(targets: &TargetSet) -> Self {
        let mut rows: BTreeMap<Timestamp, Vec<(TargetId, StateSnapshot)>> = BTreeMap::new();
        for target in targets.archive() {
            for snapshot in target.history() {
                rows.entry(Timestamp(snapshot.time))
                    .or_default()
                    .push((target.id, *snapshot));
            }
        }
        Self {
            rows,
            targets: targets.archive().iter().map(|t| t.id).collect(),
        }
    }

    pub fn from_particle(particle: &Particle) -> Self {
        Self::from_targets(particle.targets())
    }

    /// Number of distinct timestamps.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn targets(&self) -> &[TargetId] {
        &self.targets
    }

    /// Targets present at exactly `time`, in id order.
    pub fn at(&self, time: f64) -> &[(TargetId, StateSnapshot)] {
        self.rows
            .get(&Timestamp(time))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, &[(TargetId, StateSnapshot)])> + '_ {
        self.rows.iter().map(|(t, row)| (t.0, row.as_slice()))
    }

    /// One row per requested timestamp with one slot per known target.
    pub fn dense(&self, all_times: &[f64]) -> Vec<DenseRow> {
        all_times
            .iter()
            .map(|&time| {
                let present = self.at(time);
                let positions = self
                    .targets
                    .iter()
                    .map(|id| {
                        present
                            .iter()
                            .find(|(other, _)| other == id)
                            .map(|(_, snapshot)| snapshot.position)
                    })
                    .collect();
                DenseRow { time, positions }
            })
            .collect()
    }
}

/// CLEAR-MOT scores of an estimate against ground truth.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClearMotSummary {
    /// Multiple object tracking accuracy
    pub mota: f64,
    /// Multiple object tracking precision (mean matched distance)
    pub motp: f64,
    pub false_negatives: usize,
    pub false_positives: usize,
    pub mismatches: usize,
    /// Ground truth objects over all timestamps
    pub objects: usize,
    pub matches: usize,
}

/// Scores an estimate against ground truth.
///
/// Implement this trait to plug in a CLEAR-MOT implementation; truth and
/// estimate are matched only within `max_distance`.
pub trait TrackEvaluator {
    type Error;

    fn evaluate(
        &mut self,
        ground_truth: &[DenseRow],
        estimate: &[DenseRow],
        max_distance: f64,
    ) -> Result<ClearMotSummary, Self::Error>;
}
