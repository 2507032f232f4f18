/// Indicates how the step driver terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Completed all requested steps.
    Complete,

    /// Stopped early due to an observer action.
    StoppedByObserver,
}

/// The result of a driven integration.
///
/// The state itself lives in the caller's buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Solution {
    /// How the driver terminated.
    pub status: Status,

    /// Number of advances completed.
    pub steps: usize,

    /// Time of the final state.
    pub time: f64,

    /// The engine's last internal step size.
    pub step_size: f64,
}
