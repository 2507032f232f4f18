//! Reference engine for the Tandem adapter.
//!
//! - [`Integrator`] — an adaptive engine implementing [`tandem_core::Engine`]
//! - [`linear`] — the default linear solvers it attaches in implicit mode

mod integrator;
pub mod linear;

pub use integrator::{DEFAULT_MAX_NUM_STEPS, ExplicitTable, ImplicitTable, Integrator};
