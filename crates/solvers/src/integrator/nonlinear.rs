//! Solves the implicit stage equation `z = ψ + γ f(t, z)`.
//!
//! With a linear solver attached this is a modified Newton iteration on
//! `(I − γJ) δ = ψ + γ f(t, z) − z`; without one it is functional
//! (fixed-point) iteration.

use tandem_core::{
    ConvergenceFailure, EngineError, HookStatus, Layout, SetupContext, SolveContext, SolvePolicy,
};

use super::step::{Counted, StageWork};
use super::Linear;

/// Weighted correction norm below which the iteration has converged.
const CONVERGENCE_COEF: f64 = 0.1;

/// Accuracy requested from iterative linear solvers.
const LINEAR_TOLERANCE: f64 = 0.05 * CONVERGENCE_COEF;

/// Relative change in `γ` that forces a fresh setup.
const MAX_GAMMA_CHANGE: f64 = 0.3;

/// Steps after which a fresh setup is forced.
const MAX_STEPS_BETWEEN_SETUPS: usize = 20;

/// Why a stage could not be solved.
#[derive(Debug)]
pub(crate) enum StageFailure {
    /// Retry with a smaller step.
    Convergence,

    /// Give up.
    Fatal(EngineError),
}

/// One stage equation.
pub(crate) struct Stage<'a> {
    pub time: f64,
    pub gamma: f64,
    pub prior: &'a [f64],
    pub weights: &'a [f64],
}

enum Outcome {
    Converged,
    Failed,
}

/// Iteration state carried across stages and steps.
#[derive(Debug)]
pub(crate) struct Newton {
    policy: SolvePolicy,
    gamma_at_setup: Option<f64>,
    steps_since_setup: usize,
    pending: Option<ConvergenceFailure>,
    jacobian_current: bool,
}

impl Newton {
    pub fn new(policy: SolvePolicy) -> Self {
        Self {
            policy,
            gamma_at_setup: None,
            steps_since_setup: 0,
            pending: None,
            jacobian_current: false,
        }
    }

    pub fn policy(&self) -> SolvePolicy {
        self.policy
    }

    pub fn step_accepted(&mut self) {
        self.steps_since_setup += 1;
    }

    /// Solves the stage with `work.psi` set and `work.z` holding the
    /// predictor. Leaves the solution in `work.z`.
    pub fn solve(
        &mut self,
        f: &mut Counted<'_>,
        layout: &Layout,
        mut linear: Option<&mut Linear>,
        stage: &Stage<'_>,
        work: &mut StageWork,
    ) -> Result<(), StageFailure> {
        work.predictor.copy_from_slice(&work.z);
        f.eval(stage.time, &work.predictor, &mut work.predictor_derivative);

        let mut retried = false;
        loop {
            if let Some(linear) = linear.as_deref_mut() {
                if self.needs_setup(stage.gamma) {
                    self.setup(f, layout, linear, stage, work)?;
                }
            }

            work.z.copy_from_slice(&work.predictor);
            work.derivative.copy_from_slice(&work.predictor_derivative);

            match self.iterate(f, layout, linear.as_deref_mut(), stage, work)? {
                Outcome::Converged => return Ok(()),
                Outcome::Failed if linear.is_some() && !self.jacobian_current && !retried => {
                    // Stale Jacobian data: rebuild it and try the stage again.
                    retried = true;
                    self.pending = Some(ConvergenceFailure::BadJacobian);
                }
                Outcome::Failed => {
                    self.pending = Some(ConvergenceFailure::Other);
                    return Err(StageFailure::Convergence);
                }
            }
        }
    }

    fn needs_setup(&self, gamma: f64) -> bool {
        self.policy.setup_every_solve
            || self.pending.is_some()
            || self.steps_since_setup >= MAX_STEPS_BETWEEN_SETUPS
            || self
                .gamma_at_setup
                .is_none_or(|g| (gamma / g - 1.0).abs() > MAX_GAMMA_CHANGE)
    }

    fn setup(
        &mut self,
        f: &mut Counted<'_>,
        layout: &Layout,
        linear: &mut Linear,
        stage: &Stage<'_>,
        work: &StageWork,
    ) -> Result<(), StageFailure> {
        let failure = self.pending.take().unwrap_or(ConvergenceFailure::None);
        let outcome = linear.solver.setup(SetupContext {
            time: stage.time,
            gamma: stage.gamma,
            convergence_failure: failure,
            predicted_state: &work.predictor,
            predicted_derivative: &work.predictor_derivative,
            error_weights: stage.weights,
            layout,
            rhs: f.uncounted(),
        });
        f.stats.linear_setups += 1;

        self.gamma_at_setup = Some(stage.gamma);
        self.steps_since_setup = 0;
        self.jacobian_current = outcome.jacobian_current;

        match outcome.status {
            HookStatus::Success => Ok(()),
            HookStatus::Recoverable => {
                self.pending = Some(ConvergenceFailure::Other);
                Err(StageFailure::Convergence)
            }
            HookStatus::Unrecoverable => Err(StageFailure::Fatal(EngineError::LinearSetupFailed {
                time: stage.time,
            })),
        }
    }

    fn iterate(
        &mut self,
        f: &mut Counted<'_>,
        layout: &Layout,
        mut linear: Option<&mut Linear>,
        stage: &Stage<'_>,
        work: &mut StageWork,
    ) -> Result<Outcome, StageFailure> {
        let StageWork {
            psi,
            z,
            derivative,
            correction,
            ..
        } = work;

        let max_corrections = self.policy.max_corrections.max(1);
        let mut rate = 1.0_f64;
        let mut previous = 0.0;

        for m in 0..max_corrections {
            for i in 0..z.len() {
                correction[i] = psi[i] + stage.gamma * derivative[i] - z[i];
            }

            if let Some(linear) = linear.as_deref_mut() {
                let status = linear.solver.solve(SolveContext {
                    time: stage.time,
                    gamma: stage.gamma,
                    rhs_vector: correction.as_mut_slice(),
                    current_state: z.as_slice(),
                    prior_state: stage.prior,
                    current_derivative: derivative.as_slice(),
                    error_weights: stage.weights,
                    tolerance: LINEAR_TOLERANCE,
                    layout,
                    rhs: f.uncounted(),
                });
                f.stats.linear_solves += 1;

                match status {
                    HookStatus::Success => {}
                    HookStatus::Recoverable => return Ok(Outcome::Failed),
                    HookStatus::Unrecoverable => {
                        return Err(StageFailure::Fatal(EngineError::LinearSolveFailed {
                            time: stage.time,
                        }));
                    }
                }
            }
            f.stats.nonlinear_iterations += 1;

            for (zi, ci) in z.iter_mut().zip(correction.iter()) {
                *zi += ci;
            }

            let del = layout.wrms_norm(correction, stage.weights);
            if !del.is_finite() {
                return Ok(Outcome::Failed);
            }

            // A single correction means the linear solve is trusted to be exact.
            if max_corrections == 1 && linear.is_some() {
                return Ok(Outcome::Converged);
            }

            if m > 0 {
                rate = (0.3 * rate).max(del / previous);
            }
            if del * rate.min(1.0) <= CONVERGENCE_COEF {
                return Ok(Outcome::Converged);
            }
            if m > 0 && del > 2.0 * previous {
                return Ok(Outcome::Failed);
            }
            previous = del;

            f.eval(stage.time, z, derivative);
        }

        Ok(Outcome::Failed)
    }
}
