use approx::assert_relative_eq;
use proptest::prelude::*;
use tandem::{
    BindError, DistributedVector, Error, IntegratorHandle, MethodFamily, Mode, Partition,
    StateBuffer,
};

type Rhs = fn(f64, &[f64], &mut [f64]);

fn decay(_t: f64, y: &[f64], ydot: &mut [f64]) {
    for (d, v) in ydot.iter_mut().zip(y) {
        *d = -v;
    }
}

fn explicit() -> IntegratorHandle<Rhs> {
    IntegratorHandle::create(Mode::Explicit, MethodFamily::RungeKutta)
        .expect("explicit Runge-Kutta is supported")
}

proptest! {
    #[test]
    fn rebinding_carries_content_to_the_new_buffer(
        values in prop::collection::vec(-1e6_f64..1e6, 1..64),
        t0 in -10.0_f64..10.0,
    ) {
        let mut original = values.clone();
        let mut handle = explicit();
        handle
            .init(decay, t0, StateBuffer::from(&mut original))
            .expect("init should succeed");

        let mut relocated = vec![0.0; values.len()];
        let report = handle
            .step(StateBuffer::from(&mut relocated), t0)
            .expect("zero-length step should succeed");

        prop_assert_eq!(report.time, t0);
        prop_assert_eq!(&relocated, &values);
        prop_assert_eq!(&original, &values);
    }
}

/// Ignores the state: `y' = sin t`.
fn forcing(t: f64, _y: &[f64], ydot: &mut [f64]) {
    ydot.fill(t.sin());
}

/// Couples neighbours and adds a time-dependent source.
fn coupled(t: f64, y: &[f64], ydot: &mut [f64]) {
    let n = y.len();
    for i in 0..n {
        ydot[i] = y[(i + 1) % n] - 2.0 * y[i] + t * t;
    }
}

const OPERATORS: [Rhs; 3] = [decay, forcing, coupled];

proptest! {
    #[test]
    fn step_to_start_leaves_buffer_unchanged(
        values in prop::collection::vec(-1e3_f64..1e3, 1..16),
        t0 in -10.0_f64..10.0,
        operator in 0..OPERATORS.len(),
        implicit in any::<bool>(),
    ) {
        let mode = if implicit { Mode::Implicit } else { Mode::Explicit };
        let mut handle: IntegratorHandle<Rhs> =
            IntegratorHandle::create(mode, MethodFamily::RungeKutta).expect("supported method");

        let mut y = values.clone();
        handle
            .init(OPERATORS[operator], t0, StateBuffer::from(&mut y))
            .expect("init should succeed");

        let report = handle
            .step(StateBuffer::from(&mut y), t0)
            .expect("step should succeed");

        prop_assert_eq!(report.time, t0);
        prop_assert_eq!(&y, &values);
    }
}

#[test]
fn caller_may_move_storage_between_steps() {
    let mut y = vec![1.0, 2.0];
    let mut handle = explicit();
    handle
        .init(decay, 0.0, StateBuffer::from(&mut y))
        .expect("init should succeed");
    handle
        .step(StateBuffer::from(&mut y), 0.5)
        .expect("step should succeed");

    let mut moved = y.clone();
    drop(y);
    handle
        .step(StateBuffer::from(&mut moved), 1.0)
        .expect("moved storage should bind");

    let expected = (-1.0_f64).exp();
    assert_relative_eq!(moved[0], expected, max_relative = 1e-3);
    assert_relative_eq!(moved[1], 2.0 * expected, max_relative = 1e-3);
}

#[test]
fn empty_state_is_rejected() {
    let mut y: Vec<f64> = Vec::new();
    let mut handle = explicit();

    let err = handle
        .init(decay, 0.0, StateBuffer::from(&mut y))
        .expect_err("empty state");
    assert!(matches!(err, Error::Bind(BindError::Empty)));
}

#[test]
fn distributed_partition_is_reused_every_step() {
    let mut v = DistributedVector::serial(vec![1.0, 2.0, 3.0]);
    let mut handle = explicit();
    handle
        .init(decay, 0.0, StateBuffer::distributed(&mut v))
        .expect("init should succeed");

    // The descriptor was taken at init; the held one still describes `v`.
    for target in [0.25, 0.5, 0.75, 1.0] {
        handle
            .step(StateBuffer::distributed(&mut v), target)
            .expect("same partition should rebind");
    }

    let expected = (-1.0_f64).exp();
    for (i, value) in v.as_slice().iter().enumerate() {
        assert_relative_eq!(*value, (i as f64 + 1.0) * expected, max_relative = 1e-3);
    }
}

#[test]
fn distributed_partition_may_be_replaced() {
    let mut v = DistributedVector::serial(vec![1.0, 1.0]);
    let mut handle = explicit();
    handle
        .init(decay, 0.0, StateBuffer::distributed(&mut v))
        .expect("init should succeed");

    let mut fresh = DistributedVector::serial(vec![0.0, 0.0]);
    handle
        .step(StateBuffer::distributed(&mut fresh), 0.0)
        .expect("fresh partition hands over its descriptor");
    assert_eq!(fresh.as_slice(), &[1.0, 1.0]);
}

#[test]
fn layout_kind_and_size_must_match() {
    let mut v = DistributedVector::serial(vec![1.0, 1.0]);
    let mut handle = explicit();
    handle
        .init(decay, 0.0, StateBuffer::distributed(&mut v))
        .expect("init should succeed");

    let mut contiguous = vec![1.0, 1.0];
    let err = handle
        .step(StateBuffer::from(&mut contiguous), 0.1)
        .expect_err("contiguous buffer for a distributed layout");
    assert!(matches!(err, Error::Bind(BindError::LayoutMismatch { .. })));

    let mut longer = DistributedVector::serial(vec![1.0, 1.0, 1.0]);
    let err = handle
        .step(StateBuffer::distributed(&mut longer), 0.1)
        .expect_err("different global length");
    assert!(matches!(err, Error::Bind(BindError::SizeMismatch { .. })));

    handle
        .step(StateBuffer::distributed(&mut v), 0.1)
        .expect("original partition still binds");
}

#[test]
fn spent_partition_from_another_vector_is_rejected() {
    let mut v = DistributedVector::serial(vec![1.0, 1.0]);
    let mut handle = explicit();
    handle
        .init(decay, 0.0, StateBuffer::distributed(&mut v))
        .expect("init should succeed");

    // Same shape, but its own communicator, and its descriptor is gone.
    let mut other = DistributedVector::serial(vec![1.0, 1.0]);
    let _ = other.steal();

    let err = handle
        .step(StateBuffer::distributed(&mut other), 0.1)
        .expect_err("held descriptor belongs to another vector");
    assert!(matches!(err, Error::Bind(BindError::DescriptorUnavailable)));
}
