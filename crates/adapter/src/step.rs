//! Stepping a handle forward in time.
//!
//! [`advance`] takes one discrete step and reports what the engine achieved.
//! [`run`] repeats it over a uniform output grid and lets an observer watch:
//!
//! ```ignore
//! use tandem::step;
//!
//! let solution = step::run_unobserved(&mut handle, StateBuffer::from(&mut y), 0.1, 10)?;
//! assert_eq!(solution.steps, 10);
//! ```

mod action;
mod event;
mod solution;

pub use action::Action;
pub use event::Event;
pub use solution::{Solution, Status};

use tandem_core::{Engine, Observer, RhsOperator, StateBuffer};

use crate::{Error, IntegratorHandle};

/// Advances `state` from `time` by `step_size`.
///
/// On return `time` holds the achieved time and `step_size` the engine's
/// last internal step size, which equals the fixed step when one is set.
///
/// # Errors
///
/// Returns an error if the handle cannot step; `time` and `step_size` are
/// left unchanged.
pub fn advance<F, E>(
    handle: &mut IntegratorHandle<F, E>,
    state: StateBuffer<'_>,
    time: &mut f64,
    step_size: &mut f64,
) -> Result<(), Error>
where
    F: RhsOperator,
    E: Engine,
{
    let report = handle.step(state, *time + *step_size)?;
    *time = report.time;
    *step_size = report.step_size;
    Ok(())
}

/// Drives a bound handle through `steps` outputs spaced `dt` apart.
///
/// # Algorithm
///
/// 1. Emit an event for the bound state at the handle's current time.
/// 2. For each step:
///    - Step the handle to the next output time.
///    - Emit an [`Event`] to the observer.
///    - If the observer returns `StopEarly`, terminate.
///
/// # Errors
///
/// Returns [`Error::StepSize`] if `dt` is not finite and positive, or any
/// error from [`IntegratorHandle::step`].
pub fn run<F, E, Obs>(
    handle: &mut IntegratorHandle<F, E>,
    mut state: StateBuffer<'_>,
    dt: f64,
    steps: usize,
    mut observer: Obs,
) -> Result<Solution, Error>
where
    F: RhsOperator,
    E: Engine,
    Obs: Observer<Event, Action>,
{
    if !dt.is_finite() || dt <= 0.0 {
        return Err(Error::StepSize(dt));
    }
    let (Some(start), Some(step_size)) = (handle.current_time(), handle.last_step_size()) else {
        return Err(Error::InvalidPhase {
            operation: "run",
            phase: handle.phase(),
        });
    };

    let mut time = start;
    let mut step_size = step_size;

    let event = Event {
        step: 0,
        time,
        step_size,
        state: state.as_slice().to_vec(),
    };
    if let Some(Action::StopEarly) = observer.observe(&event) {
        return Ok(Solution {
            status: Status::StoppedByObserver,
            steps: 0,
            time,
            step_size,
        });
    }

    for step in 1..=steps {
        // Targets come from the start time so rounding does not accumulate.
        let report = handle.step(state.reborrow(), start + dt * step as f64)?;
        time = report.time;
        step_size = report.step_size;

        let event = Event {
            step,
            time,
            step_size,
            state: state.as_slice().to_vec(),
        };
        if let Some(Action::StopEarly) = observer.observe(&event) {
            return Ok(Solution {
                status: Status::StoppedByObserver,
                steps: step,
                time,
                step_size,
            });
        }
    }

    Ok(Solution {
        status: Status::Complete,
        steps,
        time,
        step_size,
    })
}

/// Drives a bound handle without observation.
///
/// This is a convenience wrapper around [`run`] that discards events.
///
/// # Errors
///
/// See [`run`].
pub fn run_unobserved<F, E>(
    handle: &mut IntegratorHandle<F, E>,
    state: StateBuffer<'_>,
    dt: f64,
    steps: usize,
) -> Result<Solution, Error>
where
    F: RhsOperator,
    E: Engine,
{
    run(handle, state, dt, steps, ())
}
