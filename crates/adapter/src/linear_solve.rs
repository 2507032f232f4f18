//! Caller-supplied linear solves, plugged into an implicit engine.
//!
//! The caller implements [`JacobianSolve`] for its own solver type. The
//! adapter wraps it in a [`LinearSolveOverride`], which speaks the engine's
//! four-slot [`LinearSolver`] protocol.

use tandem_core::{HookStatus, Layout, LinearSolver, SetupContext, SetupOutcome, SolveContext};
use thiserror::Error;

/// Why a caller's solve did not produce a solution.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SolveFailure {
    /// The engine may retry with fresh setup or a smaller step.
    #[error("recoverable linear-solve failure")]
    Recoverable,

    /// The integration must stop.
    #[error("unrecoverable linear-solve failure")]
    Unrecoverable,
}

impl From<SolveFailure> for HookStatus {
    fn from(failure: SolveFailure) -> Self {
        match failure {
            SolveFailure::Recoverable => Self::Recoverable,
            SolveFailure::Unrecoverable => Self::Unrecoverable,
        }
    }
}

/// Values captured at the last setup, owned by the override.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearSolveContext {
    predicted_state: Vec<f64>,
    predicted_derivative: Vec<f64>,
    time: f64,
    weight: f64,
}

impl LinearSolveContext {
    /// Predicted state at the stage being solved.
    #[must_use]
    pub fn predicted_state(&self) -> &[f64] {
        &self.predicted_state
    }

    /// Right-hand side evaluated at the predicted state.
    #[must_use]
    pub fn predicted_derivative(&self) -> &[f64] {
        &self.predicted_derivative
    }

    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// The implicit coefficient `γ` in `I − γJ`.
    #[must_use]
    pub fn weight(&self) -> f64 {
        self.weight
    }

    fn capture(&mut self, ctx: &SetupContext<'_>) {
        self.predicted_state.clear();
        self.predicted_state.extend_from_slice(ctx.predicted_state);
        self.predicted_derivative.clear();
        self.predicted_derivative
            .extend_from_slice(ctx.predicted_derivative);
        self.time = ctx.time;
        self.weight = ctx.gamma;
    }
}

/// Solves the engine's linearized correction equation for the caller.
pub trait JacobianSolve {
    /// The caller's solver, handed back on every call.
    type Solver;

    /// Overwrites `rhs` with the solution `x` of `(I − weight·J) x = rhs`.
    ///
    /// `current` is the current Newton iterate and `prior` the state at the
    /// start of the step. Under a distributed layout all slices are the
    /// local segment.
    ///
    /// # Errors
    ///
    /// Returns a [`SolveFailure`] if no solution was produced.
    fn solve_jacobian(
        &mut self,
        rhs: &mut [f64],
        current: &[f64],
        prior: &[f64],
        solver: &mut Self::Solver,
        weight: f64,
    ) -> Result<(), SolveFailure>;

    /// Called at every setup with the freshly captured predicted values.
    ///
    /// Does nothing by default.
    ///
    /// # Errors
    ///
    /// Returns a [`SolveFailure`] if the solver cannot be prepared.
    fn prepare(
        &mut self,
        _ctx: &LinearSolveContext,
        _solver: &mut Self::Solver,
    ) -> Result<(), SolveFailure> {
        Ok(())
    }
}

/// Adapts a [`JacobianSolve`] to the engine's [`LinearSolver`] protocol.
///
/// Setup always reports the Jacobian data as current: the caller's solve
/// builds whatever it needs from the values it is given.
#[derive(Debug)]
pub struct LinearSolveOverride<J: JacobianSolve> {
    op: J,
    solver: J::Solver,
    context: LinearSolveContext,
}

impl<J: JacobianSolve> LinearSolveOverride<J> {
    pub fn new(op: J, solver: J::Solver) -> Self {
        Self {
            op,
            solver,
            context: LinearSolveContext::default(),
        }
    }

    /// Values captured at the last setup.
    #[must_use]
    pub fn context(&self) -> &LinearSolveContext {
        &self.context
    }
}

impl<J: JacobianSolve> LinearSolver for LinearSolveOverride<J> {
    fn init(&mut self, layout: &Layout) -> HookStatus {
        let n = layout.local_len();
        self.context.predicted_state = Vec::with_capacity(n);
        self.context.predicted_derivative = Vec::with_capacity(n);
        HookStatus::Success
    }

    fn setup(&mut self, ctx: SetupContext<'_>) -> SetupOutcome {
        self.context.capture(&ctx);
        let status = match self.op.prepare(&self.context, &mut self.solver) {
            Ok(()) => HookStatus::Success,
            Err(failure) => failure.into(),
        };
        SetupOutcome {
            status,
            jacobian_current: true,
        }
    }

    fn solve(&mut self, ctx: SolveContext<'_>) -> HookStatus {
        match self.op.solve_jacobian(
            ctx.rhs_vector,
            ctx.current_state,
            ctx.prior_state,
            &mut self.solver,
            ctx.gamma,
        ) {
            Ok(()) => HookStatus::Success,
            Err(failure) => failure.into(),
        }
    }

    fn free(&mut self) {
        self.context = LinearSolveContext::default();
    }

    fn name(&self) -> &'static str {
        "override"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use tandem_core::{ConvergenceFailure, RhsOperator};

    // --- Test fixtures ---

    /// Solves `(I − γJ) x = b` for `J = −λ I`.
    struct ScaledIdentity {
        prepared: usize,
    }

    impl JacobianSolve for ScaledIdentity {
        type Solver = f64;

        fn solve_jacobian(
            &mut self,
            rhs: &mut [f64],
            _current: &[f64],
            _prior: &[f64],
            lambda: &mut f64,
            weight: f64,
        ) -> Result<(), SolveFailure> {
            for b in rhs.iter_mut() {
                *b /= 1.0 + weight * *lambda;
            }
            Ok(())
        }

        fn prepare(
            &mut self,
            _ctx: &LinearSolveContext,
            _lambda: &mut f64,
        ) -> Result<(), SolveFailure> {
            self.prepared += 1;
            Ok(())
        }
    }

    struct Failing(SolveFailure);

    impl JacobianSolve for Failing {
        type Solver = ();

        fn solve_jacobian(
            &mut self,
            _rhs: &mut [f64],
            _current: &[f64],
            _prior: &[f64],
            _solver: &mut (),
            _weight: f64,
        ) -> Result<(), SolveFailure> {
            Err(self.0)
        }
    }

    fn zero(_t: f64, _y: &[f64], ydot: &mut [f64]) {
        ydot.fill(0.0);
    }

    fn setup_context<'a>(
        state: &'a [f64],
        derivative: &'a [f64],
        weights: &'a [f64],
        layout: &'a Layout,
        rhs: &'a mut dyn RhsOperator,
    ) -> SetupContext<'a> {
        SetupContext {
            time: 0.75,
            gamma: 0.1,
            convergence_failure: ConvergenceFailure::None,
            predicted_state: state,
            predicted_derivative: derivative,
            error_weights: weights,
            layout,
            rhs,
        }
    }

    // --- Tests ---

    #[test]
    fn setup_captures_predicted_values() {
        let layout = Layout::Contiguous { len: 2 };
        let mut rhs = zero;
        let mut hooks = LinearSolveOverride::new(ScaledIdentity { prepared: 0 }, 2.0);
        assert_eq!(hooks.init(&layout), HookStatus::Success);

        let outcome = hooks.setup(setup_context(
            &[1.0, 2.0],
            &[-1.0, -2.0],
            &[1.0, 1.0],
            &layout,
            &mut rhs,
        ));

        assert_eq!(outcome, SetupOutcome::current());
        assert_eq!(hooks.context().predicted_state(), &[1.0, 2.0]);
        assert_eq!(hooks.context().predicted_derivative(), &[-1.0, -2.0]);
        assert_relative_eq!(hooks.context().time(), 0.75);
        assert_relative_eq!(hooks.context().weight(), 0.1);
        assert_eq!(hooks.op.prepared, 1);
    }

    #[test]
    fn solve_delegates_to_caller() {
        let layout = Layout::Contiguous { len: 2 };
        let mut rhs = zero;
        let mut hooks = LinearSolveOverride::new(ScaledIdentity { prepared: 0 }, 4.0);
        hooks.init(&layout);

        let mut b = [1.5, -3.0];
        let status = hooks.solve(SolveContext {
            time: 0.0,
            gamma: 0.5,
            rhs_vector: &mut b,
            current_state: &[0.0, 0.0],
            prior_state: &[0.0, 0.0],
            current_derivative: &[0.0, 0.0],
            error_weights: &[1.0, 1.0],
            tolerance: 0.005,
            layout: &layout,
            rhs: &mut rhs,
        });

        assert_eq!(status, HookStatus::Success);
        assert_relative_eq!(b[0], 0.5);
        assert_relative_eq!(b[1], -1.0);
    }

    #[test]
    fn failures_keep_their_class() {
        let layout = Layout::Contiguous { len: 1 };
        let mut rhs = zero;

        for (failure, expected) in [
            (SolveFailure::Recoverable, HookStatus::Recoverable),
            (SolveFailure::Unrecoverable, HookStatus::Unrecoverable),
        ] {
            let mut hooks = LinearSolveOverride::new(Failing(failure), ());
            let mut b = [1.0];
            let status = hooks.solve(SolveContext {
                time: 0.0,
                gamma: 0.5,
                rhs_vector: &mut b,
                current_state: &[0.0],
                prior_state: &[0.0],
                current_derivative: &[0.0],
                error_weights: &[1.0],
                tolerance: 0.005,
                layout: &layout,
                rhs: &mut rhs,
            });
            assert_eq!(status, expected);
            assert!(expected.code() != 0);
        }
    }

    #[test]
    fn free_releases_scratch() {
        let layout = Layout::Contiguous { len: 1 };
        let mut rhs = zero;
        let mut hooks = LinearSolveOverride::new(ScaledIdentity { prepared: 0 }, 1.0);
        hooks.init(&layout);
        hooks.setup(setup_context(&[3.0], &[0.0], &[1.0], &layout, &mut rhs));

        hooks.free();
        assert!(hooks.context().predicted_state().is_empty());
        assert_eq!(hooks.name(), "override");
    }
}
