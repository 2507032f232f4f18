/// Counters accumulated by an engine since creation or the last reinit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStats {
    /// Accepted internal steps.
    pub steps: usize,

    /// Right-hand-side evaluations, excluding those made by linear solvers.
    pub rhs_evals: usize,

    pub linear_setups: usize,
    pub linear_solves: usize,
    pub nonlinear_iterations: usize,
    pub error_test_failures: usize,
    pub convergence_failures: usize,
}
