//! Drive a black-box ODE engine over caller-owned state.
//!
//! Tandem binds the caller's state storage to an integration engine without
//! copying, steps it to requested output times, and lets the caller replace
//! the engine's linear solves with its own.
//!
//! - [`IntegratorHandle`] — lifecycle: create, init, step, reinit, destroy
//! - [`JacobianSolve`] — the caller's solve for `(I − γJ) x = b`, installed
//!   with [`IntegratorHandle::set_linear_solve_override`]
//! - [`step`] — single advances and an observed multi-step driver
//!
//! # Example
//!
//! ```ignore
//! use tandem::{IntegratorHandle, MethodFamily, Mode, StateBuffer};
//!
//! let mut y = vec![1.0];
//! let mut handle = IntegratorHandle::create(Mode::Explicit, MethodFamily::RungeKutta)?;
//! handle.init(
//!     |_t: f64, y: &[f64], ydot: &mut [f64]| ydot[0] = -y[0],
//!     0.0,
//!     StateBuffer::from(&mut y),
//! )?;
//!
//! let report = handle.step(StateBuffer::from(&mut y), 1.0)?;
//! assert_eq!(report.time, 1.0);
//! ```

mod config;
mod error;
mod handle;
mod linear_solve;
pub mod step;

pub use config::{Config, ConfigError};
pub use error::Error;
pub use handle::{
    IntegratorHandle, OVERRIDE_ABSOLUTE_TOLERANCE, OVERRIDE_MAX_NUM_STEPS,
    OVERRIDE_RELATIVE_TOLERANCE, Phase, StepReport,
};
pub use linear_solve::{JacobianSolve, LinearSolveContext, LinearSolveOverride, SolveFailure};

pub use tandem_core::{
    BindError, Communicator, DistributedVector, Engine, EngineError, EngineStats, MethodFamily,
    Mode, Observer, Partition, PartitionDescriptor, PartitionError, RhsOperator,
    SelfCommunicator, StateBuffer, ToleranceError, Tolerances,
};
pub use tandem_solvers::Integrator;
