use crate::Partition;

/// Caller-owned storage for the ODE state.
///
/// A `StateBuffer` borrows the caller's storage for the duration of one call.
/// The adapter aliases it and never frees it; the caller is free to move or
/// reallocate its storage between calls.
pub enum StateBuffer<'a> {
    /// A single contiguous segment holding the whole state.
    Contiguous(&'a mut [f64]),

    /// This rank's segment of a distributed state.
    Distributed(&'a mut dyn Partition),
}

impl<'a> StateBuffer<'a> {
    /// Wraps a contiguous slice.
    pub fn contiguous(data: &'a mut [f64]) -> Self {
        Self::Contiguous(data)
    }

    /// Wraps a distributed partition.
    pub fn distributed(partition: &'a mut dyn Partition) -> Self {
        Self::Distributed(partition)
    }

    /// Number of locally stored elements.
    #[must_use]
    pub fn local_len(&self) -> usize {
        match self {
            Self::Contiguous(data) => data.len(),
            Self::Distributed(partition) => partition.local_len(),
        }
    }

    /// Number of elements across all ranks.
    #[must_use]
    pub fn global_len(&self) -> usize {
        match self {
            Self::Contiguous(data) => data.len(),
            Self::Distributed(partition) => partition.global_len(),
        }
    }

    /// Read access to the local elements.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        match self {
            Self::Contiguous(data) => data,
            Self::Distributed(partition) => partition.local_data(),
        }
    }

    /// Borrows the buffer again for a shorter lifetime.
    ///
    /// Lets a driver hand the same storage to the engine on every step.
    pub fn reborrow(&mut self) -> StateBuffer<'_> {
        match self {
            Self::Contiguous(data) => StateBuffer::Contiguous(data),
            Self::Distributed(partition) => StateBuffer::Distributed(&mut **partition),
        }
    }

    /// Gives up the borrow and returns the local elements.
    pub fn into_local_mut(self) -> &'a mut [f64] {
        match self {
            Self::Contiguous(data) => data,
            Self::Distributed(partition) => partition.local_data_mut(),
        }
    }
}

impl<'a> From<&'a mut [f64]> for StateBuffer<'a> {
    fn from(data: &'a mut [f64]) -> Self {
        Self::Contiguous(data)
    }
}

impl<'a> From<&'a mut Vec<f64>> for StateBuffer<'a> {
    fn from(data: &'a mut Vec<f64>) -> Self {
        Self::Contiguous(data.as_mut_slice())
    }
}
