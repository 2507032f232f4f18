//! Zero-copy binding of caller storage to the engine's vector abstraction.
//!
//! A [`VectorAlias`] is the engine's view of the caller's state: it holds the
//! only mutable borrow of the caller's storage together with the [`Layout`]
//! describing it. Nothing is copied when binding or rebinding.
//!
//! Between calls the engine keeps only the layout. Each call reattaches the
//! layout to whatever storage the caller presents, so callers may move or
//! reallocate their buffers freely between steps. Because the alias holds a
//! `&mut` borrow, two live aliases can never overlap, and the caller cannot
//! rebind while the engine is running a callback.

mod error;

pub use error::BindError;

use crate::{Layout, StateBuffer};

/// A mutable view of caller storage, as seen by the engine.
#[derive(Debug)]
pub struct VectorAlias<'a> {
    data: &'a mut [f64],
    layout: Layout,
}

impl<'a> VectorAlias<'a> {
    /// Binds caller storage without copying.
    ///
    /// A distributed buffer hands its partition descriptor to the alias; the
    /// descriptor can be taken only once per partition object.
    ///
    /// # Errors
    ///
    /// - [`BindError::Empty`] if the buffer has no elements.
    /// - [`BindError::DescriptorUnavailable`] if the partition's descriptor
    ///   was already taken.
    pub fn bind(buffer: StateBuffer<'a>) -> Result<Self, BindError> {
        if buffer.global_len() == 0 {
            return Err(BindError::Empty);
        }

        match buffer {
            StateBuffer::Contiguous(data) => Ok(Self {
                layout: Layout::Contiguous { len: data.len() },
                data,
            }),
            StateBuffer::Distributed(partition) => {
                let descriptor = partition.steal().ok_or(BindError::DescriptorUnavailable)?;
                Ok(Self {
                    layout: Layout::Distributed(descriptor),
                    data: partition.local_data_mut(),
                })
            }
        }
    }

    /// Repoints this alias at new storage of the same shape.
    ///
    /// # Errors
    ///
    /// See [`VectorAlias::check`].
    pub fn rebind<'b>(self, buffer: StateBuffer<'b>) -> Result<VectorAlias<'b>, BindError> {
        VectorAlias::attach(self.layout, buffer)
    }

    /// Attaches a detached layout to caller storage.
    ///
    /// A distributed buffer that still owns its descriptor hands it over and
    /// the held descriptor is dropped. A buffer whose descriptor was already
    /// taken keeps the held one, provided it describes the same segment on
    /// the same communicator.
    ///
    /// # Errors
    ///
    /// See [`VectorAlias::check`].
    pub fn attach(layout: Layout, buffer: StateBuffer<'a>) -> Result<Self, BindError> {
        Self::check(&layout, &buffer)?;

        match (layout, buffer) {
            (layout @ Layout::Contiguous { .. }, StateBuffer::Contiguous(data)) => {
                Ok(Self { data, layout })
            }
            (Layout::Distributed(held), StateBuffer::Distributed(partition)) => {
                let descriptor = partition.steal().unwrap_or(held);
                Ok(Self {
                    layout: Layout::Distributed(descriptor),
                    data: partition.local_data_mut(),
                })
            }
            (layout, buffer) => Err(mismatch(&layout, &buffer)),
        }
    }

    /// Checks that `buffer` can be attached to `layout` without consuming
    /// either.
    ///
    /// # Errors
    ///
    /// - [`BindError::Empty`] if the buffer has no elements.
    /// - [`BindError::LayoutMismatch`] if the buffer is contiguous where the
    ///   layout is distributed, or the reverse.
    /// - [`BindError::SizeMismatch`] if the local or global length differs.
    /// - [`BindError::DescriptorUnavailable`] if a distributed buffer has no
    ///   descriptor to hand over and the held one describes another segment
    ///   or another communicator.
    pub fn check(layout: &Layout, buffer: &StateBuffer<'_>) -> Result<(), BindError> {
        if buffer.global_len() == 0 {
            return Err(BindError::Empty);
        }

        if buffer.local_len() != layout.local_len() || buffer.global_len() != layout.global_len()
        {
            return Err(BindError::SizeMismatch {
                expected_local: layout.local_len(),
                expected_global: layout.global_len(),
                found_local: buffer.local_len(),
                found_global: buffer.global_len(),
            });
        }

        match (layout, buffer) {
            (Layout::Contiguous { .. }, StateBuffer::Contiguous(_)) => Ok(()),
            (Layout::Distributed(held), StateBuffer::Distributed(partition)) => {
                if partition.can_steal() || held.describes(&**partition) {
                    Ok(())
                } else {
                    Err(BindError::DescriptorUnavailable)
                }
            }
            _ => Err(mismatch(layout, buffer)),
        }
    }

    /// Wraps engine-side scratch storage in an existing layout.
    ///
    /// Used when the engine must hand a copy of the state back to itself,
    /// for example when it is recreated with a saved solution.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::SizeMismatch`] if `data` does not match the
    /// layout's local length, or [`BindError::Empty`] if the layout is empty.
    pub fn with_layout(data: &'a mut [f64], layout: Layout) -> Result<Self, BindError> {
        if layout.global_len() == 0 {
            return Err(BindError::Empty);
        }
        if data.len() != layout.local_len() {
            return Err(BindError::SizeMismatch {
                expected_local: layout.local_len(),
                expected_global: layout.global_len(),
                found_local: data.len(),
                found_global: layout.global_len(),
            });
        }
        Ok(Self { data, layout })
    }

    /// Number of locally stored elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always `false`: a bound alias has at least one element globally.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        self.data
    }

    /// Splits the alias into the caller's storage and the layout.
    pub fn split(&mut self) -> (&mut [f64], &Layout) {
        (self.data, &self.layout)
    }

    /// Releases the caller's storage and keeps the layout.
    #[must_use]
    pub fn into_layout(self) -> Layout {
        self.layout
    }
}

fn kind_of_layout(layout: &Layout) -> &'static str {
    match layout {
        Layout::Contiguous { .. } => "contiguous",
        Layout::Distributed(_) => "distributed",
    }
}

fn kind_of_buffer(buffer: &StateBuffer<'_>) -> &'static str {
    match buffer {
        StateBuffer::Contiguous(_) => "contiguous",
        StateBuffer::Distributed(_) => "distributed",
    }
}

fn mismatch(layout: &Layout, buffer: &StateBuffer<'_>) -> BindError {
    BindError::LayoutMismatch {
        expected: kind_of_layout(layout),
        found: kind_of_buffer(buffer),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;

    use super::*;
    use crate::{Communicator, DistributedVector, Partition, SelfCommunicator};

    // --- Test fixtures ---

    /// A communicator spanning two ranks.
    #[derive(Debug)]
    struct TwoRanks;

    impl Communicator for TwoRanks {
        fn rank(&self) -> usize {
            0
        }

        fn size(&self) -> usize {
            2
        }

        fn sum(&self, local: f64) -> f64 {
            2.0 * local
        }

        fn max(&self, local: f64) -> f64 {
            local
        }
    }

    // --- Tests ---

    #[test]
    fn binding_an_empty_buffer_fails() {
        let mut empty: Vec<f64> = Vec::new();
        let err = VectorAlias::bind(StateBuffer::from(&mut empty)).expect_err("nothing to bind");
        assert_eq!(err, BindError::Empty);
    }

    #[test]
    fn writes_through_the_alias_reach_the_caller() {
        let mut data = vec![1.0, 2.0, 3.0];
        {
            let mut alias = VectorAlias::bind(StateBuffer::from(&mut data)).expect("binds");
            alias.as_mut_slice()[1] = 20.0;
        }
        assert_eq!(data, vec![1.0, 20.0, 3.0]);
    }

    #[test]
    fn rebinding_a_different_size_fails() {
        let mut a = vec![0.0; 3];
        let mut b = vec![0.0; 4];
        let alias = VectorAlias::bind(StateBuffer::from(&mut a)).expect("binds");
        let err = alias
            .rebind(StateBuffer::from(&mut b))
            .expect_err("sizes differ");
        assert!(matches!(err, BindError::SizeMismatch { found_local: 4, .. }));
    }

    #[test]
    fn rebinding_across_layout_kinds_fails() {
        let mut a = vec![0.0; 2];
        let mut v = DistributedVector::serial(vec![0.0; 2]);
        let alias = VectorAlias::bind(StateBuffer::from(&mut a)).expect("binds");
        let err = alias
            .rebind(StateBuffer::distributed(&mut v))
            .expect_err("contiguous binding cannot take a partition");
        assert_eq!(
            err,
            BindError::LayoutMismatch {
                expected: "contiguous",
                found: "distributed",
            }
        );
        assert!(v.can_steal(), "a rejected rebind must not steal");
    }

    #[test]
    fn distributed_bind_steals_once() {
        let mut v = DistributedVector::serial(vec![1.0, 2.0]);
        let alias = VectorAlias::bind(StateBuffer::distributed(&mut v)).expect("binds");
        assert!(alias.layout().is_distributed());
        let layout = alias.into_layout();
        assert!(!v.can_steal());

        // Binding the same object from scratch finds no descriptor.
        let err = VectorAlias::bind(StateBuffer::distributed(&mut v)).expect_err("stolen");
        assert_eq!(err, BindError::DescriptorUnavailable);

        // Reattaching keeps the held descriptor for the same segment.
        let alias = VectorAlias::attach(layout, StateBuffer::distributed(&mut v))
            .expect("held descriptor describes this partition");
        assert_eq!(alias.as_slice(), &[1.0, 2.0]);
    }

    #[test]
    fn distributed_rebind_takes_a_fresh_descriptor() {
        let mut first = DistributedVector::serial(vec![1.0, 2.0]);
        let mut second = DistributedVector::serial(vec![3.0, 4.0]);

        let alias = VectorAlias::bind(StateBuffer::distributed(&mut first)).expect("binds");
        let alias = alias
            .rebind(StateBuffer::distributed(&mut second))
            .expect("second partition hands over its descriptor");
        assert_eq!(alias.as_slice(), &[3.0, 4.0]);
        drop(alias);
        assert!(!second.can_steal());
    }

    #[test]
    fn stale_descriptor_for_another_segment_is_rejected() {
        let comm = Arc::new(SelfCommunicator);
        let mut first = DistributedVector::new(vec![0.0; 2], 0, 4, comm.clone()).expect("fits");
        let mut second = DistributedVector::new(vec![0.0; 2], 2, 4, comm).expect("fits");
        let _ = second.steal();

        let alias = VectorAlias::bind(StateBuffer::distributed(&mut first)).expect("binds");
        let layout = alias.into_layout();
        let err = VectorAlias::check(&layout, &StateBuffer::distributed(&mut second))
            .expect_err("held descriptor covers offset 0, buffer sits at offset 2");
        assert_eq!(err, BindError::DescriptorUnavailable);
    }

    #[test]
    fn stale_descriptor_on_another_communicator_is_rejected() {
        let mut first = DistributedVector::serial(vec![1.0, 1.0]);
        let mut second =
            DistributedVector::new(vec![1.0, 1.0], 0, 2, Arc::new(TwoRanks)).expect("fits");
        let _ = second.steal();

        let alias = VectorAlias::bind(StateBuffer::distributed(&mut first)).expect("binds");
        let err = alias
            .rebind(StateBuffer::distributed(&mut second))
            .expect_err("same shape, different communicator");
        assert_eq!(err, BindError::DescriptorUnavailable);
    }

    #[test]
    fn held_descriptor_keeps_its_communicator() {
        let mut v = DistributedVector::new(vec![1.0, 1.0], 0, 2, Arc::new(TwoRanks)).expect("fits");

        let layout = VectorAlias::bind(StateBuffer::distributed(&mut v))
            .expect("binds")
            .into_layout();
        let alias = VectorAlias::attach(layout, StateBuffer::distributed(&mut v))
            .expect("same partition object");
        let Layout::Distributed(descriptor) = alias.layout() else {
            panic!("distributed buffer gives a distributed layout");
        };
        assert_eq!(descriptor.communicator().size(), 2);
    }

    proptest! {
        #[test]
        fn rebind_preserves_content(
            (a, b) in (1usize..64).prop_flat_map(|n| (
                prop::collection::vec(-1e6f64..1e6, n),
                prop::collection::vec(-1e6f64..1e6, n),
            ))
        ) {
            let mut first = a.clone();
            let mut second = b.clone();

            let alias = VectorAlias::bind(StateBuffer::from(&mut first)).expect("non-empty");
            prop_assert_eq!(alias.as_slice(), a.as_slice());

            let alias = alias.rebind(StateBuffer::from(&mut second)).expect("same size");
            prop_assert_eq!(alias.len(), b.len());
            prop_assert_eq!(alias.as_slice(), b.as_slice());
            drop(alias);

            prop_assert_eq!(first, a);
            prop_assert_eq!(second, b);
        }
    }
}
