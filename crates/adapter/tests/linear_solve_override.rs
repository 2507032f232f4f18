use std::{cell::RefCell, rc::Rc};

use approx::assert_relative_eq;
use tandem::{
    EngineError, Error, IntegratorHandle, JacobianSolve, LinearSolveContext, MethodFamily, Mode,
    OVERRIDE_ABSOLUTE_TOLERANCE, OVERRIDE_MAX_NUM_STEPS, OVERRIDE_RELATIVE_TOLERANCE,
    SolveFailure, StateBuffer, Tolerances,
};

// --- Test fixtures ---

type Rhs = fn(f64, &[f64], &mut [f64]);

/// `y' = −λ y` with `λ = 1`.
fn decay(_t: f64, y: &[f64], ydot: &mut [f64]) {
    for (d, v) in ydot.iter_mut().zip(y) {
        *d = -v;
    }
}

/// The exact solve for `decay`: `(1 + weight) x = rhs`.
#[derive(Default)]
struct DecaySolve {
    log: Rc<RefCell<Log>>,
}

#[derive(Debug, Default)]
struct Log {
    prepares: usize,
    solves: usize,
    weights: Vec<f64>,
}

impl JacobianSolve for DecaySolve {
    type Solver = f64;

    fn solve_jacobian(
        &mut self,
        rhs: &mut [f64],
        current: &[f64],
        prior: &[f64],
        lambda: &mut f64,
        weight: f64,
    ) -> Result<(), SolveFailure> {
        assert_eq!(current.len(), rhs.len());
        assert_eq!(prior.len(), rhs.len());

        let mut log = self.log.borrow_mut();
        log.solves += 1;
        log.weights.push(weight);

        for b in rhs.iter_mut() {
            *b /= 1.0 + weight * *lambda;
        }
        Ok(())
    }

    fn prepare(
        &mut self,
        ctx: &LinearSolveContext,
        _lambda: &mut f64,
    ) -> Result<(), SolveFailure> {
        assert!(!ctx.predicted_state().is_empty());
        self.log.borrow_mut().prepares += 1;
        Ok(())
    }
}

/// Fails the first `failures` solves with `failure`, then solves exactly.
struct Flaky {
    failure: SolveFailure,
    failures: usize,
}

impl JacobianSolve for Flaky {
    type Solver = ();

    fn solve_jacobian(
        &mut self,
        rhs: &mut [f64],
        _current: &[f64],
        _prior: &[f64],
        _solver: &mut (),
        weight: f64,
    ) -> Result<(), SolveFailure> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(self.failure);
        }
        for b in rhs.iter_mut() {
            *b /= 1.0 + weight;
        }
        Ok(())
    }
}

fn bound(mode: Mode, y: &mut Vec<f64>, t0: f64) -> IntegratorHandle<Rhs> {
    let mut handle: IntegratorHandle<Rhs> =
        IntegratorHandle::create(mode, MethodFamily::RungeKutta).expect("supported method");
    handle
        .init(decay, t0, StateBuffer::from(y))
        .expect("init should succeed");
    handle
}

fn override_tolerances() -> Tolerances {
    Tolerances::new(OVERRIDE_RELATIVE_TOLERANCE, OVERRIDE_ABSOLUTE_TOLERANCE)
        .expect("valid tolerances")
}

// --- Tests ---

#[test]
fn installing_applies_override_settings() {
    let mut y = vec![1.0];
    let mut handle = bound(Mode::Implicit, &mut y, 0.0);
    handle.set_tolerances(1e-8, 1e-12).expect("valid tolerances");

    handle
        .set_linear_solve_override(1.0, DecaySolve::default())
        .expect("override should install");

    assert_eq!(handle.tolerances(), Some(override_tolerances()));
    assert_eq!(handle.max_num_steps(), OVERRIDE_MAX_NUM_STEPS);

    let engine = handle.engine().expect("live");
    assert_eq!(engine.tolerances(), override_tolerances());
    assert_eq!(engine.max_num_steps(), OVERRIDE_MAX_NUM_STEPS);
    assert_eq!(engine.solve_policy().max_corrections, 1);
    assert!(engine.solve_policy().setup_every_solve);
}

#[test]
fn every_solve_follows_a_setup() {
    let solve = DecaySolve::default();
    let log = Rc::clone(&solve.log);

    let mut y = vec![1.0, 0.5];
    let mut handle = bound(Mode::Implicit, &mut y, 0.0);
    handle
        .set_linear_solve_override(1.0, solve)
        .expect("override should install");
    handle
        .step(StateBuffer::from(&mut y), 1.0)
        .expect("step should succeed");

    let log = log.borrow();
    let stats = handle.stats().expect("live");
    assert!(log.solves > 0);
    assert_eq!(log.prepares, log.solves);
    assert_eq!(stats.linear_solves, log.solves);
    assert_eq!(stats.linear_setups, log.solves);
    assert!(log.weights.iter().all(|w| *w > 0.0));
}

#[test]
fn implicit_override_tracks_explicit_trajectory() {
    let mut explicit_y = vec![1.0];
    let mut explicit = bound(Mode::Explicit, &mut explicit_y, 0.0);

    let mut implicit_y = vec![1.0];
    let mut implicit = bound(Mode::Implicit, &mut implicit_y, 0.0);
    implicit
        .set_linear_solve_override(1.0, DecaySolve::default())
        .expect("override should install");

    for target in [0.25, 0.5, 0.75, 1.0] {
        explicit
            .step(StateBuffer::from(&mut explicit_y), target)
            .expect("explicit step should succeed");
        implicit
            .step(StateBuffer::from(&mut implicit_y), target)
            .expect("implicit step should succeed");

        let band = OVERRIDE_RELATIVE_TOLERANCE * explicit_y[0].abs() + OVERRIDE_ABSOLUTE_TOLERANCE;
        assert!(
            (implicit_y[0] - explicit_y[0]).abs() <= band,
            "at t = {target}: implicit {} vs explicit {}",
            implicit_y[0],
            explicit_y[0]
        );
    }

    let explicit_steps = explicit.stats().expect("live").steps;
    let implicit_steps = implicit.stats().expect("live").steps;
    assert!(implicit_steps <= explicit_steps);
}

#[test]
fn switching_from_explicit_matches_a_direct_implicit_handle() {
    let mut switched_y = vec![1.0, -0.5];
    let mut switched = bound(Mode::Explicit, &mut switched_y, 0.0);
    switched
        .set_linear_solve_override(1.0, DecaySolve::default())
        .expect("override should switch the engine");
    assert_eq!(switched.mode(), Mode::Implicit);

    let mut direct_y = vec![1.0, -0.5];
    let mut direct = bound(Mode::Implicit, &mut direct_y, 0.0);
    direct
        .set_linear_solve_override(1.0, DecaySolve::default())
        .expect("override should install");

    for target in [0.5, 1.0, 2.0] {
        let a = switched
            .step(StateBuffer::from(&mut switched_y), target)
            .expect("switched step should succeed");
        let b = direct
            .step(StateBuffer::from(&mut direct_y), target)
            .expect("direct step should succeed");
        assert_eq!(a, b);
    }
    assert_eq!(switched_y, direct_y);
}

#[test]
fn switching_mid_trajectory_continues_from_current_state() {
    let mut y = vec![1.0];
    let mut handle = bound(Mode::Explicit, &mut y, 0.0);
    handle
        .step(StateBuffer::from(&mut y), 0.5)
        .expect("explicit step should succeed");
    let halfway = y.clone();

    handle
        .set_linear_solve_override(1.0, DecaySolve::default())
        .expect("override should switch the engine");
    assert_relative_eq!(handle.current_time().expect("bound"), 0.5);

    let mut reference_y = halfway.clone();
    let mut reference = bound(Mode::Implicit, &mut reference_y, 0.5);
    reference
        .set_linear_solve_override(1.0, DecaySolve::default())
        .expect("override should install");

    handle
        .step(StateBuffer::from(&mut y), 1.0)
        .expect("implicit step should succeed");
    reference
        .step(StateBuffer::from(&mut reference_y), 1.0)
        .expect("reference step should succeed");

    assert_eq!(y, reference_y);
    assert_relative_eq!(y[0], (-1.0_f64).exp(), max_relative = 2e-2);
}

#[test]
fn recoverable_failure_only_shrinks_the_step() {
    let mut y = vec![1.0];
    let mut handle = bound(Mode::Implicit, &mut y, 0.0);
    handle
        .set_linear_solve_override(
            (),
            Flaky {
                failure: SolveFailure::Recoverable,
                failures: 2,
            },
        )
        .expect("override should install");

    handle
        .step(StateBuffer::from(&mut y), 1.0)
        .expect("engine should recover");

    assert_eq!(handle.stats().expect("live").convergence_failures, 2);
    assert_relative_eq!(y[0], (-1.0_f64).exp(), max_relative = 2e-2);
}

#[test]
fn unrecoverable_failure_is_fatal() {
    let mut y = vec![1.0];
    let mut handle = bound(Mode::Implicit, &mut y, 0.0);
    handle
        .set_linear_solve_override(
            (),
            Flaky {
                failure: SolveFailure::Unrecoverable,
                failures: 1,
            },
        )
        .expect("override should install");

    let err = handle
        .step(StateBuffer::from(&mut y), 1.0)
        .expect_err("unrecoverable solve");
    assert!(matches!(
        err,
        Error::Engine(EngineError::LinearSolveFailed { .. })
    ));
}

#[test]
fn override_requires_bound_state() {
    let mut handle: IntegratorHandle<Rhs> =
        IntegratorHandle::create(Mode::Implicit, MethodFamily::RungeKutta)
            .expect("supported method");

    let err = handle
        .set_linear_solve_override(1.0, DecaySolve::default())
        .expect_err("nothing bound yet");
    assert!(matches!(err, Error::InvalidPhase { .. }));
}

#[test]
fn reinit_drops_the_override() {
    let solve = DecaySolve::default();
    let log = Rc::clone(&solve.log);

    let mut y = vec![1.0];
    let mut handle = bound(Mode::Implicit, &mut y, 0.0);
    handle
        .set_linear_solve_override(1.0, solve)
        .expect("override should install");
    handle
        .reinit(decay, StateBuffer::from(&mut y), 0.0)
        .expect("reinit should succeed");

    let policy = handle.engine().expect("live").solve_policy();
    assert_eq!(policy.max_corrections, 3);
    assert!(!policy.setup_every_solve);

    handle
        .step(StateBuffer::from(&mut y), 1.0)
        .expect("default solver should integrate");
    assert_eq!(log.borrow().solves, 0);
}
