//! The capability contract an integration engine offers the adapter.
//!
//! The adapter never reaches into engine internals. Everything it needs,
//! from stepping to replacing the linear solver, goes through [`Engine`].

mod error;
mod mode;
mod stats;

pub use error::EngineError;
pub use mode::{MethodFamily, Mode};
pub use stats::EngineStats;

use crate::{LinearSolver, RhsOperator, SolvePolicy, Tolerances, VectorAlias};

/// A time-integration engine for `y' = f(t, y)`.
///
/// The engine keeps its own history between calls and sees the caller's
/// state only through the [`VectorAlias`] passed to each call.
pub trait Engine: Sized {
    /// Allocates engine memory for the given mode and family.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Unsupported`] if the engine cannot run the
    /// combination.
    fn create(mode: Mode, family: MethodFamily) -> Result<Self, EngineError>;

    /// Returns the mode the engine was created with.
    fn mode(&self) -> Mode;

    /// Returns the method family the engine was created with.
    fn family(&self) -> MethodFamily;

    /// Sets the initial condition `y(t0) = y0`.
    ///
    /// In implicit mode the engine's default linear solver is attached.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the state.
    fn init(&mut self, t0: f64, y0: &VectorAlias<'_>) -> Result<(), EngineError>;

    /// Restarts from a new initial condition, possibly of a new size.
    ///
    /// Engine memory is reused. Tolerances and limits are kept; in implicit
    /// mode the default linear solver replaces any installed one.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the state.
    fn reinit(&mut self, t0: f64, y0: &VectorAlias<'_>) -> Result<(), EngineError>;

    /// Sets the tolerances used for error weights from the next step on.
    fn set_tolerances(&mut self, tolerances: Tolerances);

    /// Limits the internal steps taken by one call to [`advance`](Engine::advance).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MaxNumSteps`] if `max_steps` is zero.
    fn set_max_num_steps(&mut self, max_steps: usize) -> Result<(), EngineError>;

    /// Switches to fixed steps of `step`, or back to adaptive stepping.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::FixedStep`] if the step is not finite and
    /// positive.
    fn set_fixed_step(&mut self, step: Option<f64>) -> Result<(), EngineError>;

    /// Integrates to `t_out` and writes `y(t_out)` into `y`.
    ///
    /// The engine may step past `t_out` internally and interpolate. Returns
    /// the time actually reached, which equals `t_out` on success.
    ///
    /// # Errors
    ///
    /// Returns an error if integration fails after the engine's own retries.
    fn advance(
        &mut self,
        rhs: &mut dyn RhsOperator,
        t_out: f64,
        y: &mut VectorAlias<'_>,
    ) -> Result<f64, EngineError>;

    /// Time of the last returned solution.
    fn current_time(&self) -> f64;

    /// Size of the last internal step, or zero before the first.
    fn last_step_size(&self) -> f64;

    /// Writes the solution at [`current_time`](Engine::current_time) into `out`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotInitialized`] before `init`, or
    /// [`EngineError::SizeMismatch`] if `out` has the wrong length.
    fn current_solution(&self, out: &mut [f64]) -> Result<(), EngineError>;

    /// Replaces the linear solver, freeing the old one.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoLinearSolve`] in explicit mode.
    fn install_linear_solver(
        &mut self,
        solver: Box<dyn LinearSolver>,
        policy: SolvePolicy,
    ) -> Result<(), EngineError>;

    /// Returns the work counters since the last `init` or `reinit`.
    fn stats(&self) -> EngineStats;
}
