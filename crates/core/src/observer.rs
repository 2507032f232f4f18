/// Receives events from a driver and optionally returns a control action.
///
/// Drivers emit an event after each unit of work and consult the observer
/// before continuing. Returning `None` lets the driver proceed normally.
///
/// Implemented for `()` (observes nothing) and for any closure
/// `FnMut(&E) -> Option<A>`.
pub trait Observer<E, A> {
    /// Observes an event and optionally returns an action.
    fn observe(&mut self, event: &E) -> Option<A>;
}

impl<E, A> Observer<E, A> for () {
    fn observe(&mut self, _event: &E) -> Option<A> {
        None
    }
}

impl<E, A, F> Observer<E, A> for F
where
    F: FnMut(&E) -> Option<A>,
{
    fn observe(&mut self, event: &E) -> Option<A> {
        self(event)
    }
}
