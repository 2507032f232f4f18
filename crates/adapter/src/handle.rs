//! The lifecycle object that owns an engine and binds caller state to it.

mod phase;

pub use phase::Phase;

use log::{debug, info};
use tandem_core::{
    Engine, EngineStats, Layout, MethodFamily, Mode, RhsOperator, SolvePolicy, StateBuffer,
    Tolerances, VectorAlias,
};
use tandem_solvers::Integrator;

use crate::{Config, Error, JacobianSolve, LinearSolveOverride};

/// Relative tolerance applied when a linear-solve override is installed.
pub const OVERRIDE_RELATIVE_TOLERANCE: f64 = 1e-2;

/// Absolute tolerance applied when a linear-solve override is installed.
pub const OVERRIDE_ABSOLUTE_TOLERANCE: f64 = 1e-4;

/// Maximum internal steps per call once a linear-solve override is installed.
pub const OVERRIDE_MAX_NUM_STEPS: usize = 10_000;

/// One correction per stage, with a fresh setup before it.
const OVERRIDE_POLICY: SolvePolicy = SolvePolicy {
    max_corrections: 1,
    setup_every_solve: true,
};

/// What a call to [`IntegratorHandle::step`] achieved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// Time the returned state corresponds to.
    pub time: f64,

    /// The engine's last internal step size.
    pub step_size: f64,
}

/// Drives an integration engine over caller-owned state.
///
/// The handle owns the engine, the right-hand side, and the [`Layout`] of the
/// bound state. It never owns the state itself: every call that touches the
/// state borrows a [`StateBuffer`] from the caller and hands it to the engine
/// without copying.
///
/// Operations are valid only in certain [`Phase`]s; calling one elsewhere
/// returns [`Error::InvalidPhase`] and leaves the handle unchanged.
pub struct IntegratorHandle<F, E = Integrator> {
    engine: Option<E>,
    rhs: Option<F>,
    layout: Option<Layout>,
    phase: Phase,
    mode: Mode,
    family: MethodFamily,
    tolerances: Option<Tolerances>,
    max_num_steps: usize,
    fixed_step: Option<f64>,
}

impl<F: RhsOperator> IntegratorHandle<F> {
    /// Creates a handle around the reference engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine does not support `mode` with `family`.
    pub fn create(mode: Mode, family: MethodFamily) -> Result<Self, Error> {
        Self::with_config(Config::with_method(mode, family))
    }

    /// Creates a handle around the reference engine from a full config.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the config.
    pub fn with_config(config: Config) -> Result<Self, Error> {
        Self::with_engine(config)
    }
}

impl<F: RhsOperator, E: Engine> IntegratorHandle<F, E> {
    /// Creates a handle around any engine type.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be created for the configured
    /// mode and family, or rejects the configured limits.
    pub fn with_engine(config: Config) -> Result<Self, Error> {
        let mut engine = E::create(config.mode(), config.family())?;
        engine.set_max_num_steps(config.max_num_steps())?;
        engine.set_fixed_step(config.fixed_step())?;

        debug!("created {} {} handle", config.mode(), config.family());

        Ok(Self {
            engine: Some(engine),
            rhs: None,
            layout: None,
            phase: Phase::Unconfigured,
            mode: config.mode(),
            family: config.family(),
            tolerances: None,
            max_num_steps: config.max_num_steps(),
            fixed_step: config.fixed_step(),
        })
    }

    /// Binds the right-hand side and initial condition.
    ///
    /// Tolerances set earlier with [`set_tolerances`](Self::set_tolerances)
    /// are applied; otherwise the defaults are.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPhase`] unless the handle is unconfigured.
    /// - [`Error::Bind`] if the state cannot be bound.
    /// - [`Error::Engine`] if the engine rejects the initial condition.
    pub fn init(&mut self, rhs: F, t0: f64, state: StateBuffer<'_>) -> Result<(), Error> {
        if self.phase != Phase::Unconfigured {
            return Err(self.invalid("init"));
        }
        let engine = self.engine.as_mut().ok_or(Error::InvalidPhase {
            operation: "init",
            phase: self.phase,
        })?;

        let alias = VectorAlias::bind(state)?;
        engine.set_tolerances(self.tolerances.unwrap_or_default());
        engine.init(t0, &alias)?;

        debug!("initialized at t = {t0} with {} local elements", alias.len());

        self.layout = Some(alias.into_layout());
        self.rhs = Some(rhs);
        self.phase = Phase::Initialized;
        Ok(())
    }

    /// Rebinds to a possibly resized or relocated state and restarts at `t0`.
    ///
    /// Engine memory is kept. An implicit engine falls back to its default
    /// linear solver, so an installed override must be reinstalled.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPhase`] unless the handle is initialized or
    ///   stepping.
    /// - [`Error::Bind`] if the state cannot be bound.
    /// - [`Error::Engine`] if the engine rejects the new state.
    pub fn reinit(&mut self, rhs: F, state: StateBuffer<'_>, t0: f64) -> Result<(), Error> {
        if !self.phase.is_bound() {
            return Err(self.invalid("reinit"));
        }
        let engine = self.engine.as_mut().ok_or(Error::InvalidPhase {
            operation: "reinit",
            phase: self.phase,
        })?;

        // Keep the held layout when it still fits so a distributed buffer
        // whose descriptor was already taken can be reused.
        let alias = match self.layout.take() {
            Some(layout) if VectorAlias::check(&layout, &state).is_ok() => {
                VectorAlias::attach(layout, state)?
            }
            held => match VectorAlias::bind(state) {
                Ok(alias) => alias,
                Err(err) => {
                    self.layout = held;
                    return Err(err.into());
                }
            },
        };

        let result = engine.reinit(t0, &alias);
        let len = alias.len();
        self.layout = Some(alias.into_layout());
        result?;

        debug!("reinitialized at t = {t0} with {len} local elements");

        self.rhs = Some(rhs);
        self.phase = Phase::Initialized;
        Ok(())
    }

    /// Sets relative and absolute tolerances; the last call wins.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPhase`] if the handle was destroyed.
    /// - [`Error::Tolerance`] if the values are invalid.
    pub fn set_tolerances(&mut self, relative: f64, absolute: f64) -> Result<(), Error> {
        if self.phase == Phase::Destroyed {
            return Err(self.invalid("set tolerances"));
        }

        let tolerances = Tolerances::new(relative, absolute)?;
        if let Some(engine) = self.engine.as_mut() {
            engine.set_tolerances(tolerances);
        }
        self.tolerances = Some(tolerances);
        Ok(())
    }

    /// Sets the maximum number of internal steps per call to
    /// [`step`](Self::step).
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPhase`] if the handle was destroyed.
    /// - [`Error::Engine`] if `max_steps` is zero.
    pub fn set_max_num_steps(&mut self, max_steps: usize) -> Result<(), Error> {
        let engine = self.live_engine("set max steps")?;
        engine.set_max_num_steps(max_steps)?;
        self.max_num_steps = max_steps;
        Ok(())
    }

    /// Switches between adaptive stepping (`None`) and a fixed internal step.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPhase`] if the handle was destroyed.
    /// - [`Error::Engine`] if the step is not finite and positive.
    pub fn set_fixed_step(&mut self, step: Option<f64>) -> Result<(), Error> {
        let engine = self.live_engine("set fixed step")?;
        engine.set_fixed_step(step)?;
        self.fixed_step = step;
        Ok(())
    }

    /// Advances the solution to `target_time`, writing it into `state`.
    ///
    /// The engine may step past `target_time` internally and interpolate; the
    /// returned time equals `target_time` on success.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPhase`] unless the handle is initialized or
    ///   stepping.
    /// - [`Error::Bind`] if `state` does not match the bound layout.
    /// - [`Error::Engine`] if the engine fails to reach `target_time`.
    pub fn step(&mut self, state: StateBuffer<'_>, target_time: f64) -> Result<StepReport, Error> {
        if !self.phase.is_bound() {
            return Err(self.invalid("step"));
        }
        let (Some(engine), Some(rhs), Some(layout)) =
            (self.engine.as_mut(), self.rhs.as_mut(), self.layout.as_ref())
        else {
            return Err(Error::InvalidPhase {
                operation: "step",
                phase: self.phase,
            });
        };
        VectorAlias::check(layout, &state)?;

        let layout = self.layout.take().ok_or(Error::InvalidPhase {
            operation: "step",
            phase: self.phase,
        })?;
        let mut alias = VectorAlias::attach(layout, state)?;

        let result = engine.advance(rhs, target_time, &mut alias);
        self.layout = Some(alias.into_layout());
        let time = result?;

        self.phase = Phase::Stepping;
        Ok(StepReport {
            time,
            step_size: engine.last_step_size(),
        })
    }

    /// Replaces the engine's linear solves with the caller's `op` acting on
    /// `solver`.
    ///
    /// An explicit engine is first recreated in implicit mode at the current
    /// time and solution, with default tolerances. Then the correction limit
    /// drops to one per stage with a fresh setup before each solve, the
    /// tolerances become 1e-2 relative and 1e-4 absolute, and the step limit
    /// rises to 10 000.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPhase`] unless the handle is initialized or
    ///   stepping.
    /// - [`Error::Engine`] if the engine cannot be recreated or refuses the
    ///   override.
    pub fn set_linear_solve_override<J>(&mut self, solver: J::Solver, op: J) -> Result<(), Error>
    where
        J: JacobianSolve + 'static,
        J::Solver: 'static,
    {
        if !self.phase.is_bound() {
            return Err(self.invalid("install a linear-solve override"));
        }
        if self.mode == Mode::Explicit {
            self.switch_to_implicit()?;
        }

        let engine = self.live_engine("install a linear-solve override")?;
        let tolerances =
            Tolerances::new(OVERRIDE_RELATIVE_TOLERANCE, OVERRIDE_ABSOLUTE_TOLERANCE)?;
        engine.set_max_num_steps(OVERRIDE_MAX_NUM_STEPS)?;
        engine.set_tolerances(tolerances);
        engine.install_linear_solver(
            Box::new(LinearSolveOverride::new(op, solver)),
            OVERRIDE_POLICY,
        )?;

        self.max_num_steps = OVERRIDE_MAX_NUM_STEPS;
        self.tolerances = Some(tolerances);
        Ok(())
    }

    /// Releases engine memory, the bound layout and the right-hand side.
    ///
    /// Calling it again does nothing.
    pub fn destroy(&mut self) {
        if self.phase == Phase::Destroyed {
            return;
        }
        self.engine = None;
        self.layout = None;
        self.rhs = None;
        self.phase = Phase::Destroyed;
        debug!("destroyed handle");
    }

    /// Returns the lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current integration mode; `Implicit` after an override switched it.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Returns the method family, which the mode switch keeps.
    #[must_use]
    pub fn family(&self) -> MethodFamily {
        self.family
    }

    /// Tolerances last set, or `None` if the defaults apply.
    #[must_use]
    pub fn tolerances(&self) -> Option<Tolerances> {
        self.tolerances
    }

    /// Returns the maximum internal steps per call to [`step`](Self::step).
    #[must_use]
    pub fn max_num_steps(&self) -> usize {
        self.max_num_steps
    }

    /// Returns the fixed internal step, or `None` when stepping adaptively.
    #[must_use]
    pub fn fixed_step(&self) -> Option<f64> {
        self.fixed_step
    }

    /// Time of the last returned solution, if state is bound.
    #[must_use]
    pub fn current_time(&self) -> Option<f64> {
        self.bound_engine().map(Engine::current_time)
    }

    /// The engine's last internal step size, if state is bound.
    #[must_use]
    pub fn last_step_size(&self) -> Option<f64> {
        self.bound_engine().map(Engine::last_step_size)
    }

    /// Work counters since the last `init` or `reinit`.
    #[must_use]
    pub fn stats(&self) -> Option<EngineStats> {
        self.engine.as_ref().map(Engine::stats)
    }

    /// The engine, for engine-specific tuning.
    #[must_use]
    pub fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }

    /// Mutable access to the engine, for engine-specific tuning.
    ///
    /// Tuning is lost if an override later recreates the engine.
    pub fn engine_mut(&mut self) -> Option<&mut E> {
        self.engine.as_mut()
    }

    /// Recreates the engine in implicit mode, continuing the trajectory.
    fn switch_to_implicit(&mut self) -> Result<(), Error> {
        let (Some(engine), Some(layout)) = (self.engine.as_ref(), self.layout.as_ref()) else {
            return Err(self.invalid("switch to implicit mode"));
        };

        let time = engine.current_time();
        let mut solution = vec![0.0; layout.local_len()];
        engine.current_solution(&mut solution)?;

        let mut fresh = E::create(Mode::Implicit, self.family)?;
        fresh.set_tolerances(Tolerances::default());
        fresh.set_max_num_steps(self.max_num_steps)?;
        fresh.set_fixed_step(self.fixed_step)?;

        let layout = self.layout.take().ok_or(Error::InvalidPhase {
            operation: "switch to implicit mode",
            phase: self.phase,
        })?;
        let alias = VectorAlias::with_layout(&mut solution, layout)?;
        let result = fresh.init(time, &alias);
        self.layout = Some(alias.into_layout());
        result?;

        info!(
            "switched {} engine from explicit to implicit mode at t = {time}",
            self.family
        );

        self.engine = Some(fresh);
        self.mode = Mode::Implicit;
        self.tolerances = None;
        Ok(())
    }

    fn bound_engine(&self) -> Option<&E> {
        if self.phase.is_bound() {
            self.engine.as_ref()
        } else {
            None
        }
    }

    fn live_engine(&mut self, operation: &'static str) -> Result<&mut E, Error> {
        let phase = self.phase;
        self.engine
            .as_mut()
            .ok_or(Error::InvalidPhase { operation, phase })
    }

    fn invalid(&self, operation: &'static str) -> Error {
        Error::InvalidPhase {
            operation,
            phase: self.phase,
        }
    }
}
