//! One adaptive step and the loop that reaches an output time.

use tandem_core::{EngineError, EngineStats, Layout, RhsOperator, Tolerances};

use super::control::{
    self, CONVERGENCE_CUT, MAX_CONVERGENCE_FAILURES, MAX_ERROR_FAILURES,
};
use super::history::{History, reached};
use super::nonlinear::{Newton, Stage, StageFailure};
use super::tableau::{MAX_STAGES, Tableau};
use super::Linear;

/// The method a step is taken with.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Method {
    Explicit(&'static Tableau),
    Diagonal(&'static Tableau),
    BackwardEuler,
}

impl Method {
    fn embedded_order(self) -> u8 {
        match self {
            Self::Explicit(t) | Self::Diagonal(t) => t.embedded_order,
            Self::BackwardEuler => 1,
        }
    }
}

/// The right-hand side with evaluations counted.
pub(crate) struct Counted<'a> {
    inner: &'a mut dyn RhsOperator,
    pub stats: &'a mut EngineStats,
}

impl<'a> Counted<'a> {
    pub fn new(inner: &'a mut dyn RhsOperator, stats: &'a mut EngineStats) -> Self {
        Self { inner, stats }
    }

    pub fn eval(&mut self, t: f64, y: &[f64], out: &mut [f64]) {
        self.stats.rhs_evals += 1;
        self.inner.mult(t, y, out);
    }

    /// Access for linear solvers, whose evaluations are not counted.
    pub fn uncounted(&mut self) -> &mut dyn RhsOperator {
        &mut *self.inner
    }
}

/// Buffers for one implicit stage.
#[derive(Debug, Default)]
pub(crate) struct StageWork {
    pub psi: Vec<f64>,
    pub z: Vec<f64>,
    pub predictor: Vec<f64>,
    pub predictor_derivative: Vec<f64>,
    pub derivative: Vec<f64>,
    pub correction: Vec<f64>,
}

/// Scratch sized to the state, allocated at init.
#[derive(Debug, Default)]
pub(crate) struct Workspace {
    pub weights: Vec<f64>,
    pub stages: Vec<Vec<f64>>,
    pub y_new: Vec<f64>,
    pub f_new: Vec<f64>,
    pub error: Vec<f64>,
    pub stage: StageWork,
}

impl Workspace {
    pub fn new(n: usize) -> Self {
        Self {
            weights: vec![0.0; n],
            stages: vec![vec![0.0; n]; MAX_STAGES],
            y_new: vec![0.0; n],
            f_new: vec![0.0; n],
            error: vec![0.0; n],
            stage: StageWork {
                psi: vec![0.0; n],
                z: vec![0.0; n],
                predictor: vec![0.0; n],
                predictor_derivative: vec![0.0; n],
                derivative: vec![0.0; n],
                correction: vec![0.0; n],
            },
        }
    }
}

/// Everything one call to `advance` borrows from the engine.
pub(crate) struct Stepper<'a> {
    pub f: Counted<'a>,
    pub layout: &'a Layout,
    pub work: &'a mut Workspace,
    pub linear: Option<&'a mut Linear>,
    pub newton: &'a mut Newton,
    pub tolerances: Tolerances,
    pub method: Method,
    pub fixed_step: Option<f64>,
}

impl Stepper<'_> {
    /// Steps until the trajectory reaches or passes `t_out`.
    pub fn advance(
        &mut self,
        history: &mut History,
        t_out: f64,
        max_steps: usize,
    ) -> Result<(), EngineError> {
        if !history.derivative_ready {
            let current = &mut history.current;
            self.f.eval(current.t, &current.y, &mut current.f);
            history.derivative_ready = true;
        }

        let mut taken = 0;
        while !reached(history.current.t, t_out) {
            if taken >= max_steps {
                return Err(EngineError::TooMuchWork {
                    max_steps,
                    time: history.current.t,
                });
            }
            self.step(history, t_out)?;
            taken += 1;
        }
        Ok(())
    }

    /// Takes one accepted step, retrying with smaller steps as needed.
    fn step(&mut self, history: &mut History, t_out: f64) -> Result<(), EngineError> {
        let t = history.current.t;
        self.tolerances
            .error_weights(&history.current.y, &mut self.work.weights);

        let mut h = match self.fixed_step {
            Some(h) => h,
            None if history.next_step > 0.0 => history.next_step,
            None => control::initial_step(
                self.layout,
                &history.current.y,
                &history.current.f,
                &self.work.weights,
                t_out - t,
            ),
        };

        let order = self.method.embedded_order();
        let mut error_failures = 0;
        let mut convergence_failures = 0;

        loop {
            if h < control::min_step(t) {
                return Err(EngineError::StepTooSmall { time: t, step_size: h });
            }

            match self.attempt(history, h) {
                Ok(error_norm) if self.fixed_step.is_some() || error_norm <= 1.0 => {
                    let failed = error_failures + convergence_failures > 0;
                    self.accept(history, h);
                    history.next_step = h * control::step_factor(error_norm, order, failed);
                    log::trace!(
                        "step {} accepted: t = {:.6e}, h = {h:.3e}, error = {error_norm:.3e}",
                        self.f.stats.steps,
                        history.current.t,
                    );
                    return Ok(());
                }
                Ok(error_norm) => {
                    error_failures += 1;
                    self.f.stats.error_test_failures += 1;
                    log::debug!(
                        "error test failed at t = {t:.6e}: h = {h:.3e}, error = {error_norm:.3e}"
                    );
                    if error_failures >= MAX_ERROR_FAILURES {
                        return Err(EngineError::ErrorTestFailures { time: t, step_size: h });
                    }
                    h *= control::step_factor(error_norm, order, true);
                }
                Err(StageFailure::Convergence) => {
                    convergence_failures += 1;
                    self.f.stats.convergence_failures += 1;
                    log::debug!("nonlinear iteration failed at t = {t:.6e} with h = {h:.3e}");
                    if self.fixed_step.is_some() || convergence_failures >= MAX_CONVERGENCE_FAILURES
                    {
                        return Err(EngineError::ConvergenceFailures { time: t, step_size: h });
                    }
                    h *= CONVERGENCE_CUT;
                }
                Err(StageFailure::Fatal(err)) => return Err(err),
            }
        }
    }

    /// Computes `work.y_new` for a step of `h` and returns the weighted
    /// error norm.
    fn attempt(&mut self, history: &History, h: f64) -> Result<f64, StageFailure> {
        match self.method {
            Method::Explicit(tableau) => Ok(self.explicit(history, tableau, h)),
            Method::Diagonal(tableau) => self.diagonal(history, tableau, h),
            Method::BackwardEuler => self.backward_euler(history, h),
        }
    }

    fn explicit(&mut self, history: &History, tableau: &Tableau, h: f64) -> f64 {
        let Workspace {
            weights,
            stages,
            y_new,
            error,
            ..
        } = &mut *self.work;
        let (t, y) = (history.current.t, &history.current.y);
        let s = tableau.stages();

        stages[0].copy_from_slice(&history.current.f);
        for i in 1..s {
            let (done, rest) = stages.split_at_mut(i);
            combine(y_new, y, h, tableau.a[i], done);
            self.f.eval(t + tableau.c[i] * h, y_new, &mut rest[0]);
        }

        combine(y_new, y, h, tableau.b, &stages[..s]);
        estimate(error, h, tableau, &stages[..s]);
        self.layout.wrms_norm(error, weights)
    }

    fn diagonal(&mut self, history: &History, tableau: &Tableau, h: f64) -> Result<f64, StageFailure> {
        let Workspace {
            weights,
            stages,
            y_new,
            error,
            stage,
            ..
        } = &mut *self.work;
        let (t, y, f0) = (history.current.t, &history.current.y, &history.current.f);
        let gamma = h * tableau.gamma();
        let s = tableau.stages();

        for i in 0..s {
            let (done, rest) = stages.split_at_mut(i);
            combine(&mut stage.psi, y, h, &tableau.a[i][..i], done);
            for ((z, yi), fi) in stage.z.iter_mut().zip(y).zip(f0) {
                *z = yi + h * tableau.c[i] * fi;
            }

            let input = Stage {
                time: t + tableau.c[i] * h,
                gamma,
                prior: y,
                weights,
            };
            self.newton.solve(
                &mut self.f,
                self.layout,
                self.linear.as_deref_mut(),
                &input,
                stage,
            )?;

            for ((k, z), psi) in rest[0].iter_mut().zip(&stage.z).zip(&stage.psi) {
                *k = (z - psi) / gamma;
            }
        }

        combine(y_new, y, h, tableau.b, &stages[..s]);
        estimate(error, h, tableau, &stages[..s]);
        Ok(self.layout.wrms_norm(error, weights))
    }

    fn backward_euler(&mut self, history: &History, h: f64) -> Result<f64, StageFailure> {
        let Workspace {
            weights,
            y_new,
            error,
            stage,
            ..
        } = &mut *self.work;
        let (t, y, f0) = (history.current.t, &history.current.y, &history.current.f);

        stage.psi.copy_from_slice(y);
        for ((z, yi), fi) in stage.z.iter_mut().zip(y).zip(f0) {
            *z = yi + h * fi;
        }

        let input = Stage {
            time: t + h,
            gamma: h,
            prior: y,
            weights,
        };
        self.newton.solve(
            &mut self.f,
            self.layout,
            self.linear.as_deref_mut(),
            &input,
            stage,
        )?;

        // Local error of backward Euler is half the corrector–predictor gap.
        y_new.copy_from_slice(&stage.z);
        for ((e, z), p) in error.iter_mut().zip(&stage.z).zip(&stage.predictor) {
            *e = 0.5 * (z - p);
        }
        Ok(self.layout.wrms_norm(error, weights))
    }

    /// Moves the trajectory to `t + h`.
    fn accept(&mut self, history: &mut History, h: f64) {
        let t_new = history.current.t + h;
        let Workspace {
            stages,
            y_new,
            f_new,
            ..
        } = &mut *self.work;

        match self.method {
            Method::Explicit(tableau) if tableau.fsal => {
                f_new.copy_from_slice(&stages[tableau.stages() - 1]);
            }
            _ => self.f.eval(t_new, y_new, f_new),
        }

        history.accept(t_new, y_new, f_new);
        history.last_step = h;
        self.f.stats.steps += 1;
        self.newton.step_accepted();
    }
}

/// `out = base + h Σ coeffs[j] · ks[j]`
fn combine(out: &mut [f64], base: &[f64], h: f64, coeffs: &[f64], ks: &[Vec<f64>]) {
    out.copy_from_slice(base);
    for (c, k) in coeffs.iter().zip(ks) {
        if *c != 0.0 {
            for (o, ki) in out.iter_mut().zip(k) {
                *o += h * c * ki;
            }
        }
    }
}

/// `error = h Σ (b[j] − b̂[j]) · ks[j]`
fn estimate(error: &mut [f64], h: f64, tableau: &Tableau, ks: &[Vec<f64>]) {
    error.fill(0.0);
    for ((b, b_hat), k) in tableau.b.iter().zip(tableau.b_hat).zip(ks) {
        let e = b - b_hat;
        if e != 0.0 {
            for (o, ki) in error.iter_mut().zip(k) {
                *o += h * e * ki;
            }
        }
    }
}
