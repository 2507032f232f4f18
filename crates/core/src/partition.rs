//! The distributed-vector contract consumed by the adapter.
//!
//! A distributed vector is split across ranks; each rank owns one contiguous
//! local segment. The adapter only ever touches the local segment and routes
//! global reductions through the [`Communicator`] carried by the
//! [`PartitionDescriptor`].
//!
//! The descriptor moves out of the caller's object exactly once, through
//! [`Partition::steal`]. After that the caller keeps the data and the engine
//! owns the description of how the data is laid out.

mod communicator;
mod distributed;

use std::sync::Arc;

use thiserror::Error;

pub use communicator::{Communicator, SelfCommunicator};
pub use distributed::DistributedVector;

/// Errors raised when describing a partition.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PartitionError {
    #[error("local segment at offset {offset} with length {local_len} exceeds global length {global_len}")]
    OutOfBounds {
        offset: usize,
        local_len: usize,
        global_len: usize,
    },
}

/// Where one rank's segment sits within a distributed vector.
///
/// Not `Clone`: a descriptor has exactly one owner at a time.
#[derive(Debug)]
pub struct PartitionDescriptor {
    offset: usize,
    local_len: usize,
    global_len: usize,
    comm: Arc<dyn Communicator>,
}

impl PartitionDescriptor {
    /// Creates a descriptor for the segment `[offset, offset + local_len)`.
    ///
    /// # Errors
    ///
    /// Returns [`PartitionError::OutOfBounds`] if the segment does not fit
    /// inside `global_len`.
    pub fn new(
        offset: usize,
        local_len: usize,
        global_len: usize,
        comm: Arc<dyn Communicator>,
    ) -> Result<Self, PartitionError> {
        if offset
            .checked_add(local_len)
            .is_none_or(|end| end > global_len)
        {
            return Err(PartitionError::OutOfBounds {
                offset,
                local_len,
                global_len,
            });
        }

        Ok(Self {
            offset,
            local_len,
            global_len,
            comm,
        })
    }

    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn local_len(&self) -> usize {
        self.local_len
    }

    #[must_use]
    pub fn global_len(&self) -> usize {
        self.global_len
    }

    #[must_use]
    pub fn communicator(&self) -> &dyn Communicator {
        self.comm.as_ref()
    }

    /// Returns `true` if `partition` describes the same segment on the same
    /// communicator.
    #[must_use]
    pub fn describes(&self, partition: &dyn Partition) -> bool {
        Arc::ptr_eq(&self.comm, partition.communicator())
            && self.offset == partition.offset()
            && self.local_len == partition.local_len()
            && self.global_len == partition.global_len()
    }
}

/// A caller-owned distributed vector.
///
/// Implementors expose their local segment and hand over their
/// [`PartitionDescriptor`] once.
pub trait Partition {
    /// The local segment owned by this rank.
    fn local_data(&self) -> &[f64];

    /// Mutable access to the local segment.
    fn local_data_mut(&mut self) -> &mut [f64];

    /// Number of elements in the local segment.
    fn local_len(&self) -> usize {
        self.local_data().len()
    }

    /// Number of elements across all ranks.
    fn global_len(&self) -> usize;

    /// Global index of the first local element.
    fn offset(&self) -> usize;

    /// The communicator shared by every rank of this vector.
    ///
    /// Remains available after the descriptor is stolen.
    fn communicator(&self) -> &Arc<dyn Communicator>;

    /// Returns `true` while the descriptor has not been stolen.
    fn can_steal(&self) -> bool;

    /// Transfers the descriptor to the caller.
    ///
    /// Returns `Some` on the first call and `None` afterwards.
    fn steal(&mut self) -> Option<PartitionDescriptor>;
}
