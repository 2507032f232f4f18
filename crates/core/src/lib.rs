//! Core traits and types for the Tandem integrator adapter.
//!
//! This crate defines the shared abstractions that engines and the adapter
//! build on:
//!
//! - [`StateBuffer`] — caller-owned state, contiguous or distributed
//! - [`VectorAlias`] and [`Layout`] — zero-copy engine views of that state
//! - [`Partition`], [`PartitionDescriptor`], [`Communicator`] — the
//!   distributed-vector contract
//! - [`Engine`] — the capability contract of an integration engine
//! - [`LinearSolver`] — the plug-in protocol for the engine's linear solves
//! - [`RhsOperator`] — the right-hand side `f(t, y)`
//! - [`Observer`] — receives driver events and optionally returns actions

mod alias;
mod engine;
mod layout;
mod linear;
mod observer;
mod partition;
mod rhs;
mod state;
mod tolerances;

pub use alias::{BindError, VectorAlias};
pub use engine::{Engine, EngineError, EngineStats, MethodFamily, Mode};
pub use layout::Layout;
pub use linear::{
    ConvergenceFailure, HookStatus, LinearSolver, SetupContext, SetupOutcome, SolveContext,
    SolvePolicy,
};
pub use observer::Observer;
pub use partition::{
    Communicator, DistributedVector, Partition, PartitionDescriptor, PartitionError,
    SelfCommunicator,
};
pub use rhs::RhsOperator;
pub use state::StateBuffer;
pub use tolerances::{ToleranceError, Tolerances};
