use tandem_core::{BindError, EngineError, ToleranceError};
use thiserror::Error;

use crate::{ConfigError, Phase};

/// Errors returned by the adapter.
///
/// Every error is reported at the call that caused it; the adapter never
/// retries. Recoverable linear-solve failures never surface here: the
/// engine absorbs them by retrying with fresh setup or a smaller step.
#[derive(Debug, Error)]
pub enum Error {
    #[error("binding error: {0}")]
    Bind(#[from] BindError),

    #[error("tolerance error: {0}")]
    Tolerance(#[from] ToleranceError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("cannot {operation} while the handle is {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: Phase,
    },

    #[error("step size must be finite and positive, got {0}")]
    StepSize(f64),
}
