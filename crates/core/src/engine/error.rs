use thiserror::Error;

use super::Mode;

/// Errors reported by an integration engine.
///
/// Failures inside [`advance`](super::Engine::advance) are terminal for that
/// call: the engine has already exhausted its own retries.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("engine has not been initialized")]
    NotInitialized,

    #[error("state has {found} local elements, engine was initialized with {expected}")]
    SizeMismatch { expected: usize, found: usize },

    #[error("output time {target} lies behind the current time {time}")]
    BadOutputTime { time: f64, target: f64 },

    #[error("reached {max_steps} internal steps before t = {time}")]
    TooMuchWork { max_steps: usize, time: f64 },

    #[error("error test failed repeatedly at t = {time} with step {step_size}")]
    ErrorTestFailures { time: f64, step_size: f64 },

    #[error("nonlinear iteration failed repeatedly at t = {time} with step {step_size}")]
    ConvergenceFailures { time: f64, step_size: f64 },

    #[error("step size {step_size} is too small at t = {time}")]
    StepTooSmall { time: f64, step_size: f64 },

    #[error("linear solver initialization failed")]
    LinearInitFailed,

    #[error("linear solver setup failed unrecoverably at t = {time}")]
    LinearSetupFailed { time: f64 },

    #[error("linear solve failed unrecoverably at t = {time}")]
    LinearSolveFailed { time: f64 },

    #[error("a linear solver cannot be installed in {0} mode")]
    NoLinearSolve(Mode),

    #[error("max_num_steps must be positive")]
    MaxNumSteps,

    #[error("fixed step must be finite and positive, got {0}")]
    FixedStep(f64),

    #[error("{0}")]
    Unsupported(String),
}
