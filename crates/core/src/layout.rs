use crate::PartitionDescriptor;

/// How a bound state vector is laid out, kept by the engine between calls.
///
/// A layout carries no data. It records the shape observed at bind time and,
/// for distributed state, owns the stolen [`PartitionDescriptor`] so that
/// global reductions reach every rank.
#[derive(Debug)]
pub enum Layout {
    Contiguous { len: usize },
    Distributed(PartitionDescriptor),
}

impl Layout {
    /// Number of locally stored elements.
    #[must_use]
    pub fn local_len(&self) -> usize {
        match self {
            Self::Contiguous { len } => *len,
            Self::Distributed(descriptor) => descriptor.local_len(),
        }
    }

    /// Number of elements across all ranks.
    #[must_use]
    pub fn global_len(&self) -> usize {
        match self {
            Self::Contiguous { len } => *len,
            Self::Distributed(descriptor) => descriptor.global_len(),
        }
    }

    #[must_use]
    pub fn is_distributed(&self) -> bool {
        matches!(self, Self::Distributed(_))
    }

    /// Sums a locally computed value over all ranks.
    #[must_use]
    pub fn sum(&self, local: f64) -> f64 {
        match self {
            Self::Contiguous { .. } => local,
            Self::Distributed(descriptor) => descriptor.communicator().sum(local),
        }
    }

    /// Maximum of a locally computed value over all ranks.
    #[must_use]
    pub fn max(&self, local: f64) -> f64 {
        match self {
            Self::Contiguous { .. } => local,
            Self::Distributed(descriptor) => descriptor.communicator().max(local),
        }
    }

    /// Global dot product of two local segments.
    #[must_use]
    pub fn dot(&self, x: &[f64], y: &[f64]) -> f64 {
        self.sum(x.iter().zip(y).map(|(a, b)| a * b).sum())
    }

    /// Weighted root-mean-square norm `sqrt(Σ (xᵢ wᵢ)² / N)` over the global
    /// vector.
    #[must_use]
    pub fn wrms_norm(&self, x: &[f64], w: &[f64]) -> f64 {
        let local: f64 = x.iter().zip(w).map(|(a, b)| (a * b) * (a * b)).sum();
        (self.sum(local) / self.global_len() as f64).sqrt()
    }

    /// Global maximum absolute entry.
    #[must_use]
    pub fn max_norm(&self, x: &[f64]) -> f64 {
        self.max(x.iter().fold(0.0, |m, v| m.max(v.abs())))
    }
}
