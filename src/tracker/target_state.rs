/// Lifecycle of a target within one hypothesis.
///
/// A target is born alive and stays alive until the association sampler kills it.
/// Dead targets are archived, never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetState {
    /// Tracked and eligible for association
    #[default]
    Alive,
    /// Archived; kept for its trajectory only
    Dead,
}
