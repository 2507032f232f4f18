//! The plug-in protocol for the engine's linear-solve step.
//!
//! An implicit engine repeatedly solves the linearized correction equation
//! `(I − γJ) x = b` inside its Newton iteration. A [`LinearSolver`] supplies
//! that solve through four slots, installed as a unit with
//! [`Engine::install_linear_solver`](crate::Engine::install_linear_solver):
//!
//! 1. [`init`](LinearSolver::init) once before first use
//! 2. [`setup`](LinearSolver::setup) before a batch of solves, with the
//!    predicted state and derivative
//! 3. [`solve`](LinearSolver::solve) once per correction
//! 4. [`free`](LinearSolver::free) on teardown or replacement
//!
//! Every slot reports a [`HookStatus`]. The engine treats
//! [`HookStatus::Recoverable`] as a reason to retry (fresh setup or a smaller
//! step) and [`HookStatus::Unrecoverable`] as fatal.

use crate::{Layout, RhsOperator};

/// Outcome of a linear-solver slot.
///
/// Maps onto the integer convention of classic integrators: zero for
/// success, positive for a recoverable failure, negative for an
/// unrecoverable one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStatus {
    Success,
    Recoverable,
    Unrecoverable,
}

impl HookStatus {
    /// Integer code for this status.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Recoverable => 1,
            Self::Unrecoverable => -1,
        }
    }

    #[must_use]
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl From<i32> for HookStatus {
    fn from(code: i32) -> Self {
        match code {
            0 => Self::Success,
            c if c > 0 => Self::Recoverable,
            _ => Self::Unrecoverable,
        }
    }
}

/// Why the engine is asking for a fresh setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceFailure {
    /// First setup of a step, or a routine refresh.
    None,

    /// The previous iteration failed to converge with Jacobian data that was
    /// already current; the solver should rebuild it.
    BadJacobian,

    /// The previous iteration failed for another reason (for example a
    /// recoverable right-hand-side or solve failure).
    Other,
}

/// What [`LinearSolver::setup`] reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupOutcome {
    pub status: HookStatus,

    /// `true` if the solver's Jacobian data was computed at the predicted
    /// state during this call.
    pub jacobian_current: bool,
}

impl SetupOutcome {
    #[must_use]
    pub fn current() -> Self {
        Self {
            status: HookStatus::Success,
            jacobian_current: true,
        }
    }
}

/// How the engine drives an installed solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolvePolicy {
    /// Maximum Newton corrections per stage.
    ///
    /// With a single correction the stage is accepted as soon as the solve
    /// succeeds; the solver is trusted to solve the linearized system fully.
    pub max_corrections: usize,

    /// Call setup before every solve instead of reusing Jacobian data.
    pub setup_every_solve: bool,
}

impl Default for SolvePolicy {
    fn default() -> Self {
        Self {
            max_corrections: 3,
            setup_every_solve: false,
        }
    }
}

/// Arguments to [`LinearSolver::setup`].
///
/// Slices are engine-owned and valid only for the duration of the call.
pub struct SetupContext<'a> {
    pub time: f64,

    /// Coefficient `γ` in `I − γJ`.
    pub gamma: f64,

    pub convergence_failure: ConvergenceFailure,

    /// Predicted state at `time`.
    pub predicted_state: &'a [f64],

    /// `f(time, predicted_state)`.
    pub predicted_derivative: &'a [f64],

    pub error_weights: &'a [f64],
    pub layout: &'a Layout,
    pub rhs: &'a mut dyn RhsOperator,
}

/// Arguments to [`LinearSolver::solve`].
///
/// Slices are engine-owned and valid only for the duration of the call.
pub struct SolveContext<'a> {
    pub time: f64,

    /// Coefficient `γ` in `I − γJ`.
    pub gamma: f64,

    /// Right-hand side `b` on entry, solution `x` on successful return.
    pub rhs_vector: &'a mut [f64],

    /// Current Newton iterate.
    pub current_state: &'a [f64],

    /// State at the start of the step.
    pub prior_state: &'a [f64],

    /// `f(time, current_state)`.
    pub current_derivative: &'a [f64],

    pub error_weights: &'a [f64],

    /// Weighted RMS accuracy an iterative solver should reach.
    pub tolerance: f64,

    pub layout: &'a Layout,
    pub rhs: &'a mut dyn RhsOperator,
}

/// A linear solver plugged into an implicit engine.
pub trait LinearSolver {
    /// Allocates scratch for vectors shaped like `layout`.
    fn init(&mut self, layout: &Layout) -> HookStatus;

    /// Prepares for the solves that follow.
    fn setup(&mut self, ctx: SetupContext<'_>) -> SetupOutcome;

    /// Solves `(I − γJ) x = b` in place.
    fn solve(&mut self, ctx: SolveContext<'_>) -> HookStatus;

    /// Releases scratch.
    fn free(&mut self);

    /// Short name used in log messages.
    fn name(&self) -> &'static str {
        "custom"
    }
}
