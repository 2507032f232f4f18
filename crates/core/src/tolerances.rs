use thiserror::Error;

/// Relative and absolute error tolerances for the integrator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    relative: f64,
    absolute: f64,
}

/// Errors that can occur when validating tolerances.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ToleranceError {
    #[error("relative tolerance must be finite and non-negative")]
    Relative,

    #[error("absolute tolerance must be finite and non-negative")]
    Absolute,

    #[error("relative and absolute tolerances cannot both be zero")]
    BothZero,
}

impl Tolerances {
    /// Relative tolerance applied when the caller sets none.
    pub const DEFAULT_RELATIVE: f64 = 1e-4;

    /// Absolute tolerance applied when the caller sets none.
    pub const DEFAULT_ABSOLUTE: f64 = 1e-9;

    /// Creates validated tolerances.
    ///
    /// # Errors
    ///
    /// Returns an error if either tolerance is negative or non-finite, or if
    /// both are zero.
    pub fn new(relative: f64, absolute: f64) -> Result<Self, ToleranceError> {
        if !relative.is_finite() || relative < 0.0 {
            return Err(ToleranceError::Relative);
        }
        if !absolute.is_finite() || absolute < 0.0 {
            return Err(ToleranceError::Absolute);
        }
        if relative == 0.0 && absolute == 0.0 {
            return Err(ToleranceError::BothZero);
        }

        Ok(Self { relative, absolute })
    }

    #[must_use]
    pub fn relative(&self) -> f64 {
        self.relative
    }

    #[must_use]
    pub fn absolute(&self) -> f64 {
        self.absolute
    }

    /// Fills `weights` with `1 / (relative·|y| + absolute)`.
    pub fn error_weights(&self, y: &[f64], weights: &mut [f64]) {
        for (w, v) in weights.iter_mut().zip(y) {
            *w = 1.0 / (self.relative * v.abs() + self.absolute);
        }
    }
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            relative: Self::DEFAULT_RELATIVE,
            absolute: Self::DEFAULT_ABSOLUTE,
        }
    }
}
