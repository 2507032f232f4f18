use std::sync::Arc;

use super::{Communicator, Partition, PartitionDescriptor, PartitionError, SelfCommunicator};

/// A distributed vector whose local segment is a `Vec<f64>`.
#[derive(Debug)]
pub struct DistributedVector {
    data: Vec<f64>,
    offset: usize,
    global_len: usize,
    comm: Arc<dyn Communicator>,
    descriptor: Option<PartitionDescriptor>,
}

impl DistributedVector {
    /// Creates the local part of a distributed vector.
    ///
    /// # Errors
    ///
    /// Returns [`PartitionError::OutOfBounds`] if `data` placed at `offset`
    /// does not fit inside `global_len`.
    pub fn new(
        data: Vec<f64>,
        offset: usize,
        global_len: usize,
        comm: Arc<dyn Communicator>,
    ) -> Result<Self, PartitionError> {
        let descriptor = PartitionDescriptor::new(offset, data.len(), global_len, comm.clone())?;
        Ok(Self {
            data,
            offset,
            global_len,
            comm,
            descriptor: Some(descriptor),
        })
    }

    /// Creates a vector held entirely by a single rank.
    #[must_use]
    pub fn serial(data: Vec<f64>) -> Self {
        let len = data.len();
        let comm: Arc<dyn Communicator> = Arc::new(SelfCommunicator);
        let descriptor = PartitionDescriptor {
            offset: 0,
            local_len: len,
            global_len: len,
            comm: comm.clone(),
        };
        Self {
            data,
            offset: 0,
            global_len: len,
            comm,
            descriptor: Some(descriptor),
        }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<f64> {
        self.data
    }
}

impl Partition for DistributedVector {
    fn local_data(&self) -> &[f64] {
        &self.data
    }

    fn local_data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    fn global_len(&self) -> usize {
        self.global_len
    }

    fn offset(&self) -> usize {
        self.offset
    }

    fn communicator(&self) -> &Arc<dyn Communicator> {
        &self.comm
    }

    fn can_steal(&self) -> bool {
        self.descriptor.is_some()
    }

    fn steal(&mut self) -> Option<PartitionDescriptor> {
        self.descriptor.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steal_succeeds_exactly_once() {
        let mut v = DistributedVector::serial(vec![1.0, 2.0]);
        assert!(v.can_steal());

        let descriptor = v.steal().expect("first steal hands over the descriptor");
        assert_eq!(descriptor.local_len(), 2);
        assert_eq!(descriptor.global_len(), 2);
        assert!(descriptor.describes(&v));

        assert!(v.steal().is_none());
        assert!(!v.can_steal());
        assert_eq!(v.local_data(), &[1.0, 2.0]);
    }

    #[test]
    fn rejects_segment_outside_global_range() {
        let err = DistributedVector::new(vec![0.0; 4], 8, 10, Arc::new(SelfCommunicator))
            .expect_err("segment [8, 12) does not fit in 10");
        assert_eq!(
            err,
            PartitionError::OutOfBounds {
                offset: 8,
                local_len: 4,
                global_len: 10,
            }
        );
    }

    #[test]
    fn segment_end_overflow_is_out_of_bounds() {
        let err = DistributedVector::new(
            vec![0.0; 4],
            usize::MAX - 1,
            10,
            Arc::new(SelfCommunicator),
        )
        .expect_err("segment end overflows");
        assert_eq!(
            err,
            PartitionError::OutOfBounds {
                offset: usize::MAX - 1,
                local_len: 4,
                global_len: 10,
            }
        );
    }

    #[test]
    fn descriptor_tracks_offset() {
        let mut v = DistributedVector::new(vec![0.0; 3], 5, 8, Arc::new(SelfCommunicator))
            .expect("segment fits");
        let descriptor = v.steal().expect("descriptor available");
        assert_eq!(descriptor.offset(), 5);
        assert_eq!(descriptor.communicator().size(), 1);
    }
}
