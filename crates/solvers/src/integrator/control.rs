//! Step-size selection.

use tandem_core::Layout;

const SAFETY: f64 = 0.9;
const MAX_GROWTH: f64 = 10.0;
const MAX_SHRINK: f64 = 0.2;

/// Step cut applied after a convergence failure.
pub(crate) const CONVERGENCE_CUT: f64 = 0.25;

/// Most error-test failures tolerated within one step.
pub(crate) const MAX_ERROR_FAILURES: usize = 7;

/// Most convergence failures tolerated within one step.
pub(crate) const MAX_CONVERGENCE_FAILURES: usize = 10;

/// Factor to scale the step by, given the weighted error norm of the
/// attempt and the order of the embedded error estimate.
///
/// Growth is capped at one after a failure within the same step.
pub(crate) fn step_factor(error_norm: f64, embedded_order: u8, after_failure: bool) -> f64 {
    let max = if after_failure { 1.0 } else { MAX_GROWTH };
    if error_norm <= 0.0 {
        return max;
    }
    let exponent = -1.0 / f64::from(embedded_order + 1);
    (SAFETY * error_norm.powf(exponent)).clamp(MAX_SHRINK, max)
}

/// Initial step `0.01·‖y0‖/‖f0‖`, or `1e-6` when either norm is tiny.
///
/// Limited by `span`, the distance to the first output time.
pub(crate) fn initial_step(layout: &Layout, y0: &[f64], f0: &[f64], weights: &[f64], span: f64) -> f64 {
    let d0 = layout.wrms_norm(y0, weights);
    let d1 = layout.wrms_norm(f0, weights);

    let h0 = if d0 < 1e-5 || d1 < 1e-5 {
        1e-6
    } else {
        0.01 * d0 / d1
    };

    if span > 0.0 { h0.min(span) } else { h0 }
}

/// Smallest step that still advances `t`.
pub(crate) fn min_step(t: f64) -> f64 {
    16.0 * f64::EPSILON * t.abs().max(1.0)
}
