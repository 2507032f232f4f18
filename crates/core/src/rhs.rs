/// The right-hand side `f` of an ODE system `y' = f(t, y)`.
///
/// The engine calls [`mult`](RhsOperator::mult) once per internal evaluation
/// and may evaluate the same `(t, y)` more than once, so the result must depend
/// only on the inputs. Under a distributed layout `y` and `ydot` are the local
/// segment of the global vectors.
///
/// Any closure `FnMut(f64, &[f64], &mut [f64])` is an operator.
pub trait RhsOperator {
    /// Writes `f(t, y)` into `ydot`.
    ///
    /// `y` and `ydot` always have the same length.
    fn mult(&mut self, t: f64, y: &[f64], ydot: &mut [f64]);
}

impl<F> RhsOperator for F
where
    F: FnMut(f64, &[f64], &mut [f64]),
{
    fn mult(&mut self, t: f64, y: &[f64], ydot: &mut [f64]) {
        self(t, y, ydot);
    }
}
