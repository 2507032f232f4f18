use tandem_core::{MethodFamily, Mode};
use tandem_solvers::DEFAULT_MAX_NUM_STEPS;
use thiserror::Error;

/// Configuration for an [`IntegratorHandle`](crate::IntegratorHandle).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    mode: Mode,
    family: MethodFamily,
    max_num_steps: usize,
    fixed_step: Option<f64>,
}

/// Errors that can occur when validating a handle config.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum ConfigError {
    #[error("max_num_steps must be positive")]
    MaxNumSteps,

    #[error("fixed_step must be finite and positive, got {0}")]
    FixedStep(f64),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Explicit,
            family: MethodFamily::RungeKutta,
            max_num_steps: DEFAULT_MAX_NUM_STEPS,
            fixed_step: None,
        }
    }
}

impl Config {
    /// Creates a new config with validated limits.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_num_steps` is zero or `fixed_step` is not
    /// finite and positive.
    pub fn new(
        mode: Mode,
        family: MethodFamily,
        max_num_steps: usize,
        fixed_step: Option<f64>,
    ) -> Result<Self, ConfigError> {
        if max_num_steps == 0 {
            return Err(ConfigError::MaxNumSteps);
        }
        if let Some(h) = fixed_step {
            if !h.is_finite() || h <= 0.0 {
                return Err(ConfigError::FixedStep(h));
            }
        }

        Ok(Self {
            mode,
            family,
            max_num_steps,
            fixed_step,
        })
    }

    /// Returns the default config for the given mode and family.
    #[must_use]
    pub fn with_method(mode: Mode, family: MethodFamily) -> Self {
        Self {
            mode,
            family,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[must_use]
    pub fn family(&self) -> MethodFamily {
        self.family
    }

    /// Returns the maximum internal steps per call to `step`.
    #[must_use]
    pub fn max_num_steps(&self) -> usize {
        self.max_num_steps
    }

    /// Returns the fixed internal step, if adaptive stepping is off.
    #[must_use]
    pub fn fixed_step(&self) -> Option<f64> {
        self.fixed_step
    }
}
