//! Default linear solvers attached by the reference engine in implicit mode.
//!
//! - [`DenseDirect`] for contiguous state
//! - [`MatrixFreeGmres`] for distributed state, where only the local segment
//!   is visible

mod dense;
mod gmres;
mod lu;

pub use dense::DenseDirect;
pub use gmres::{DEFAULT_KRYLOV_DIM, MatrixFreeGmres};

use tandem_core::{Layout, LinearSolver};

/// The solver an implicit engine starts with for `layout`.
pub(crate) fn default_for(layout: &Layout) -> Box<dyn LinearSolver> {
    if layout.is_distributed() {
        Box::new(MatrixFreeGmres::default())
    } else {
        Box::new(DenseDirect::new())
    }
}
