//! The reference integration engine.
//!
//! [`Integrator`] implements [`Engine`] for both method families:
//!
//! | family | explicit mode | implicit mode |
//! |---|---|---|
//! | [`MethodFamily::RungeKutta`] | embedded explicit pair ([`ExplicitTable`]) | SDIRK pair ([`ImplicitTable`]) |
//! | [`MethodFamily::Bdf`] | backward Euler, functional iteration | backward Euler, Newton iteration |
//!
//! # Algorithm
//!
//! Each call to [`advance`](Engine::advance) takes adaptive steps until the
//! trajectory reaches or passes the output time, then interpolates back with
//! cubic Hermite dense output. Steps are controlled by the weighted RMS norm
//! of the embedded error estimate with weights `1 / (rtol·|y| + atol)`.
//!
//! In implicit mode each stage equation is solved by modified Newton
//! iteration through the attached [`LinearSolver`]. [`init`](Engine::init)
//! attaches [`DenseDirect`](crate::linear::DenseDirect) for contiguous state
//! and [`MatrixFreeGmres`](crate::linear::MatrixFreeGmres) for distributed
//! state.

mod control;
mod history;
mod nonlinear;
mod step;
mod tableau;


pub use tableau::{ExplicitTable, ImplicitTable};

use std::fmt;

use tandem_core::{
    Engine, EngineError, EngineStats, HookStatus, Layout, LinearSolver, MethodFamily, Mode,
    RhsOperator, SolvePolicy, Tolerances, VectorAlias,
};

use crate::linear;

use history::{History, reached};
use nonlinear::Newton;
use step::{Counted, Method, Stepper, Workspace};

/// Internal steps allowed per call to `advance` unless configured.
pub const DEFAULT_MAX_NUM_STEPS: usize = 500;

/// The reference engine.
#[derive(Debug)]
pub struct Integrator {
    mode: Mode,
    family: MethodFamily,
    explicit_table: ExplicitTable,
    implicit_table: ImplicitTable,
    tolerances: Tolerances,
    max_num_steps: usize,
    fixed_step: Option<f64>,
    linear: Option<Linear>,
    newton: Newton,
    history: Option<History>,
    work: Workspace,
    stats: EngineStats,
}

/// An attached linear solver, freed exactly once on replacement or drop.
pub(crate) struct Linear {
    pub solver: Box<dyn LinearSolver>,
    initialized: bool,
}

impl Linear {
    fn new(solver: Box<dyn LinearSolver>) -> Self {
        Self {
            solver,
            initialized: false,
        }
    }

    fn ensure_init(&mut self, layout: &Layout) -> Result<(), EngineError> {
        if self.initialized {
            return Ok(());
        }
        match self.solver.init(layout) {
            HookStatus::Success => {
                self.initialized = true;
                Ok(())
            }
            status => {
                log::debug!(
                    "{} linear solver init returned {}",
                    self.solver.name(),
                    status.code()
                );
                Err(EngineError::LinearInitFailed)
            }
        }
    }
}

impl Drop for Linear {
    fn drop(&mut self) {
        self.solver.free();
    }
}

impl fmt::Debug for Linear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Linear")
            .field("solver", &self.solver.name())
            .field("initialized", &self.initialized)
            .finish()
    }
}

impl Integrator {
    /// Selects the explicit pair used in explicit Runge–Kutta mode.
    pub fn set_explicit_table(&mut self, table: ExplicitTable) {
        self.explicit_table = table;
    }

    /// Selects the SDIRK pair used in implicit Runge–Kutta mode.
    pub fn set_implicit_table(&mut self, table: ImplicitTable) {
        self.implicit_table = table;
    }

    #[must_use]
    pub fn explicit_table(&self) -> ExplicitTable {
        self.explicit_table
    }

    #[must_use]
    pub fn implicit_table(&self) -> ImplicitTable {
        self.implicit_table
    }

    #[must_use]
    pub fn tolerances(&self) -> Tolerances {
        self.tolerances
    }

    #[must_use]
    pub fn max_num_steps(&self) -> usize {
        self.max_num_steps
    }

    #[must_use]
    pub fn fixed_step(&self) -> Option<f64> {
        self.fixed_step
    }

    /// Policy the nonlinear solver currently drives the linear solver with.
    #[must_use]
    pub fn solve_policy(&self) -> SolvePolicy {
        self.newton.policy()
    }

    fn method(&self) -> Method {
        match (self.mode, self.family) {
            (Mode::Explicit, MethodFamily::RungeKutta) => {
                Method::Explicit(self.explicit_table.tableau())
            }
            (Mode::Implicit, MethodFamily::RungeKutta) => {
                Method::Diagonal(self.implicit_table.tableau())
            }
            (_, MethodFamily::Bdf) => Method::BackwardEuler,
        }
    }

    fn start(&mut self, t0: f64, y0: &VectorAlias<'_>) {
        self.history = Some(History::new(t0, y0.as_slice()));
        self.work = Workspace::new(y0.len());
        self.stats = EngineStats::default();
        self.newton = Newton::new(SolvePolicy::default());

        if self.mode == Mode::Implicit {
            let solver = linear::default_for(y0.layout());
            log::debug!("attaching default {} linear solver", solver.name());
            self.linear = Some(Linear::new(solver));
        }
    }
}

impl Engine for Integrator {
    fn create(mode: Mode, family: MethodFamily) -> Result<Self, EngineError> {
        Ok(Self {
            mode,
            family,
            explicit_table: ExplicitTable::default(),
            implicit_table: ImplicitTable::default(),
            tolerances: Tolerances::default(),
            max_num_steps: DEFAULT_MAX_NUM_STEPS,
            fixed_step: None,
            linear: None,
            newton: Newton::new(SolvePolicy::default()),
            history: None,
            work: Workspace::default(),
            stats: EngineStats::default(),
        })
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn family(&self) -> MethodFamily {
        self.family
    }

    fn init(&mut self, t0: f64, y0: &VectorAlias<'_>) -> Result<(), EngineError> {
        self.start(t0, y0);
        Ok(())
    }

    fn reinit(&mut self, t0: f64, y0: &VectorAlias<'_>) -> Result<(), EngineError> {
        self.start(t0, y0);
        Ok(())
    }

    fn set_tolerances(&mut self, tolerances: Tolerances) {
        self.tolerances = tolerances;
    }

    fn set_max_num_steps(&mut self, max_steps: usize) -> Result<(), EngineError> {
        if max_steps == 0 {
            return Err(EngineError::MaxNumSteps);
        }
        self.max_num_steps = max_steps;
        Ok(())
    }

    fn set_fixed_step(&mut self, step: Option<f64>) -> Result<(), EngineError> {
        if let Some(h) = step {
            if !h.is_finite() || h <= 0.0 {
                return Err(EngineError::FixedStep(h));
            }
        }
        self.fixed_step = step;
        Ok(())
    }

    fn advance(
        &mut self,
        rhs: &mut dyn RhsOperator,
        t_out: f64,
        y: &mut VectorAlias<'_>,
    ) -> Result<f64, EngineError> {
        let method = self.method();
        let Some(history) = self.history.as_mut() else {
            return Err(EngineError::NotInitialized);
        };

        if y.len() != history.len() {
            return Err(EngineError::SizeMismatch {
                expected: history.len(),
                found: y.len(),
            });
        }
        if !t_out.is_finite() || !reached(t_out, history.output_time) {
            return Err(EngineError::BadOutputTime {
                time: history.output_time,
                target: t_out,
            });
        }

        let (out, layout) = y.split();
        if let Some(linear) = self.linear.as_mut() {
            linear.ensure_init(layout)?;
        }

        let mut stepper = Stepper {
            f: Counted::new(rhs, &mut self.stats),
            layout,
            work: &mut self.work,
            linear: self.linear.as_mut(),
            newton: &mut self.newton,
            tolerances: self.tolerances,
            method,
            fixed_step: self.fixed_step,
        };
        stepper.advance(history, t_out, self.max_num_steps)?;

        history.interpolate(t_out, out);
        history.output_time = t_out;
        Ok(t_out)
    }

    fn current_time(&self) -> f64 {
        self.history.as_ref().map_or(0.0, |h| h.output_time)
    }

    fn last_step_size(&self) -> f64 {
        self.history.as_ref().map_or(0.0, |h| h.last_step)
    }

    fn current_solution(&self, out: &mut [f64]) -> Result<(), EngineError> {
        let history = self.history.as_ref().ok_or(EngineError::NotInitialized)?;
        if out.len() != history.len() {
            return Err(EngineError::SizeMismatch {
                expected: history.len(),
                found: out.len(),
            });
        }
        history.interpolate(history.output_time, out);
        Ok(())
    }

    fn install_linear_solver(
        &mut self,
        solver: Box<dyn LinearSolver>,
        policy: SolvePolicy,
    ) -> Result<(), EngineError> {
        if self.mode == Mode::Explicit {
            return Err(EngineError::NoLinearSolve(self.mode));
        }

        if let Some(old) = &self.linear {
            log::debug!(
                "replacing {} linear solver with {}",
                old.solver.name(),
                solver.name()
            );
        }
        self.linear = Some(Linear::new(solver));
        self.newton = Newton::new(policy);
        Ok(())
    }

    fn stats(&self) -> EngineStats {
        self.stats
    }
}
