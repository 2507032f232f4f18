use tandem_core::{
    ConvergenceFailure, HookStatus, Layout, LinearSolver, RhsOperator, SetupContext,
    SetupOutcome, SolveContext,
};

use super::lu;

/// Setups that may reuse one Jacobian before it is recomputed.
const MAX_REUSE: usize = 50;

/// Dense direct solver for contiguous state.
///
/// Builds `J` by forward difference quotients at the predicted state, factors
/// `I − γJ` with partial pivoting, and reuses `J` across setups until a
/// convergence failure or [`MAX_REUSE`] setups have passed.
#[derive(Debug, Default)]
pub struct DenseDirect {
    n: usize,
    jacobian: Vec<f64>,
    matrix: Vec<f64>,
    pivot: Vec<usize>,
    perturbed: Vec<f64>,
    column: Vec<f64>,
    scratch: Vec<f64>,
    has_jacobian: bool,
    factored: bool,
    setups_since_jacobian: usize,
}

impl DenseDirect {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recomputes the Jacobian at `(time, y)`. Returns `false` if the
    /// right-hand side produced a non-finite value.
    fn difference_quotient(
        &mut self,
        time: f64,
        y: &[f64],
        fy: &[f64],
        weights: &[f64],
        rhs: &mut dyn RhsOperator,
    ) -> bool {
        let n = self.n;
        let srur = f64::EPSILON.sqrt();

        self.perturbed.copy_from_slice(y);
        for j in 0..n {
            let yj = self.perturbed[j];
            let inc = srur * yj.abs().max(1.0 / weights[j]);
            self.perturbed[j] = yj + inc;
            rhs.mult(time, &self.perturbed, &mut self.column);
            self.perturbed[j] = yj;

            for i in 0..n {
                let d = (self.column[i] - fy[i]) / inc;
                if !d.is_finite() {
                    return false;
                }
                self.jacobian[i * n + j] = d;
            }
        }
        true
    }
}

impl LinearSolver for DenseDirect {
    fn init(&mut self, layout: &Layout) -> HookStatus {
        if layout.local_len() != layout.global_len() {
            log::debug!(
                "dense solver needs the whole state, got {} of {} elements",
                layout.local_len(),
                layout.global_len()
            );
            return HookStatus::Unrecoverable;
        }

        let n = layout.local_len();
        self.n = n;
        self.jacobian = vec![0.0; n * n];
        self.matrix = vec![0.0; n * n];
        self.pivot = vec![0; n];
        self.perturbed = vec![0.0; n];
        self.column = vec![0.0; n];
        self.scratch = vec![0.0; n];
        self.has_jacobian = false;
        self.factored = false;
        HookStatus::Success
    }

    fn setup(&mut self, ctx: SetupContext<'_>) -> SetupOutcome {
        let SetupContext {
            time,
            gamma,
            convergence_failure,
            predicted_state,
            predicted_derivative,
            error_weights,
            rhs,
            ..
        } = ctx;

        let refresh = !self.has_jacobian
            || convergence_failure != ConvergenceFailure::None
            || self.setups_since_jacobian >= MAX_REUSE;

        if refresh {
            if !self.difference_quotient(
                time,
                predicted_state,
                predicted_derivative,
                error_weights,
                rhs,
            ) {
                self.has_jacobian = false;
                return SetupOutcome {
                    status: HookStatus::Recoverable,
                    jacobian_current: true,
                };
            }
            self.has_jacobian = true;
            self.setups_since_jacobian = 0;
        } else {
            self.setups_since_jacobian += 1;
        }

        let n = self.n;
        for i in 0..n {
            for j in 0..n {
                let identity = if i == j { 1.0 } else { 0.0 };
                self.matrix[i * n + j] = identity - gamma * self.jacobian[i * n + j];
            }
        }

        self.factored = lu::factor(&mut self.matrix, &mut self.pivot, n).is_ok();
        SetupOutcome {
            status: if self.factored {
                HookStatus::Success
            } else {
                HookStatus::Recoverable
            },
            jacobian_current: refresh,
        }
    }

    fn solve(&mut self, ctx: SolveContext<'_>) -> HookStatus {
        if !self.factored {
            return HookStatus::Unrecoverable;
        }

        let b = ctx.rhs_vector;
        lu::solve(&self.matrix, &self.pivot, b, &mut self.scratch, self.n);

        if b.iter().all(|v| v.is_finite()) {
            HookStatus::Success
        } else {
            HookStatus::Recoverable
        }
    }

    fn free(&mut self) {
        self.jacobian = Vec::new();
        self.matrix = Vec::new();
        self.pivot = Vec::new();
        self.perturbed = Vec::new();
        self.column = Vec::new();
        self.scratch = Vec::new();
        self.has_jacobian = false;
        self.factored = false;
    }

    fn name(&self) -> &'static str {
        "dense"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    /// y' = A y with A = [[-2, 1], [1, -3]]
    fn linear(_t: f64, y: &[f64], ydot: &mut [f64]) {
        ydot[0] = -2.0 * y[0] + y[1];
        ydot[1] = y[0] - 3.0 * y[1];
    }

    fn setup(solver: &mut DenseDirect, gamma: f64, failure: ConvergenceFailure) -> SetupOutcome {
        let layout = Layout::Contiguous { len: 2 };
        let y = [1.0, 2.0];
        let mut fy = [0.0; 2];
        linear(0.0, &y, &mut fy);
        let mut rhs = linear;
        solver.setup(SetupContext {
            time: 0.0,
            gamma,
            convergence_failure: failure,
            predicted_state: &y,
            predicted_derivative: &fy,
            error_weights: &[1.0, 1.0],
            layout: &layout,
            rhs: &mut rhs,
        })
    }

    fn solve(solver: &mut DenseDirect, gamma: f64, b: &mut [f64]) -> HookStatus {
        let layout = Layout::Contiguous { len: 2 };
        let mut rhs = linear;
        solver.solve(SolveContext {
            time: 0.0,
            gamma,
            rhs_vector: b,
            current_state: &[1.0, 2.0],
            prior_state: &[1.0, 2.0],
            current_derivative: &[0.0, -5.0],
            error_weights: &[1.0, 1.0],
            tolerance: 0.1,
            layout: &layout,
            rhs: &mut rhs,
        })
    }

    #[test]
    fn solves_the_iteration_matrix() {
        let mut solver = DenseDirect::new();
        assert_eq!(
            solver.init(&Layout::Contiguous { len: 2 }),
            HookStatus::Success
        );

        let outcome = setup(&mut solver, 0.5, ConvergenceFailure::None);
        assert_eq!(outcome, SetupOutcome::current());

        // (I − 0.5 A) = [[2, -0.5], [-0.5, 2.5]]; x = (1, 1) gives b = (1.5, 2).
        let mut b = [1.5, 2.0];
        assert_eq!(solve(&mut solver, 0.5, &mut b), HookStatus::Success);
        assert_relative_eq!(b[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(b[1], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn reuses_the_jacobian_until_a_failure() {
        let mut solver = DenseDirect::new();
        solver.init(&Layout::Contiguous { len: 2 });

        assert!(setup(&mut solver, 0.5, ConvergenceFailure::None).jacobian_current);
        assert!(!setup(&mut solver, 0.4, ConvergenceFailure::None).jacobian_current);
        assert!(setup(&mut solver, 0.4, ConvergenceFailure::BadJacobian).jacobian_current);
    }

    #[test]
    fn solve_before_setup_is_fatal() {
        let mut solver = DenseDirect::new();
        solver.init(&Layout::Contiguous { len: 2 });
        let mut b = [1.0, 1.0];
        assert_eq!(solve(&mut solver, 0.5, &mut b), HookStatus::Unrecoverable);
    }
}
