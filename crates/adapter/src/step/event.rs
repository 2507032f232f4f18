/// Event emitted by the step driver.
///
/// Step 0 is the bound state before any advance.
/// Steps 1..N are emitted after each advance.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// The step number (0 for initial, 1..N for advances).
    pub step: usize,

    /// Time the state corresponds to.
    pub time: f64,

    /// The engine's last internal step size.
    pub step_size: f64,

    /// Copy of the local state at `time`.
    pub state: Vec<f64>,
}
