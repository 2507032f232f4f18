use std::fmt::Debug;

/// Global reductions across the ranks sharing a distributed vector.
///
/// Every rank must call each reduction in the same order.
pub trait Communicator: Debug + Send + Sync {
    /// This rank's index.
    fn rank(&self) -> usize;

    /// Number of ranks.
    fn size(&self) -> usize;

    /// Sum of `local` over all ranks.
    fn sum(&self, local: f64) -> f64;

    /// Maximum of `local` over all ranks.
    fn max(&self, local: f64) -> f64;
}

/// A communicator for a single rank; every reduction is the identity.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SelfCommunicator;

impl Communicator for SelfCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn sum(&self, local: f64) -> f64 {
        local
    }

    fn max(&self, local: f64) -> f64 {
        local
    }
}
