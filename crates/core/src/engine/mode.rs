use std::fmt;

/// Whether the right-hand side is integrated explicitly or implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Stages are evaluated directly; no linear solves.
    #[default]
    Explicit,

    /// Stages are solved by Newton iteration with a linear solver.
    Implicit,
}

/// The family of integration methods an engine uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MethodFamily {
    /// One-step Runge–Kutta methods.
    #[default]
    RungeKutta,

    /// Backward differentiation formulas.
    Bdf,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Explicit => "explicit",
            Self::Implicit => "implicit",
        })
    }
}

impl fmt::Display for MethodFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RungeKutta => "Runge-Kutta",
            Self::Bdf => "BDF",
        })
    }
}
