//! The engine's record of the trajectory between calls.
//!
//! The last two accepted points carry state and derivative, which is all
//! cubic Hermite dense output needs.

/// Solution and derivative at one accepted time.
#[derive(Debug, Clone)]
pub(crate) struct Point {
    pub t: f64,
    pub y: Vec<f64>,
    pub f: Vec<f64>,
}

#[derive(Debug)]
pub(crate) struct History {
    /// Last accepted point.
    pub current: Point,

    /// Point before `current`, once a step has been taken.
    pub previous: Option<Point>,

    /// `current.f` holds `f(current.t, current.y)`.
    pub derivative_ready: bool,

    /// Step to try next; zero until the initial step has been chosen.
    pub next_step: f64,

    pub last_step: f64,

    /// Time of the last returned solution.
    pub output_time: f64,
}

impl History {
    pub fn new(t0: f64, y0: &[f64]) -> Self {
        Self {
            current: Point {
                t: t0,
                y: y0.to_vec(),
                f: vec![0.0; y0.len()],
            },
            previous: None,
            derivative_ready: false,
            next_step: 0.0,
            last_step: 0.0,
            output_time: t0,
        }
    }

    pub fn len(&self) -> usize {
        self.current.y.len()
    }

    /// Makes `(t, y, f)` the current point.
    pub fn accept(&mut self, t: f64, y: &[f64], f: &[f64]) {
        let previous = self.previous.get_or_insert_with(|| self.current.clone());
        std::mem::swap(previous, &mut self.current);
        self.current.t = t;
        self.current.y.copy_from_slice(y);
        self.current.f.copy_from_slice(f);
        self.derivative_ready = true;
    }

    /// Writes the solution at `t` into `out`.
    ///
    /// `t` must lie within the last accepted step.
    pub fn interpolate(&self, t: f64, out: &mut [f64]) {
        match &self.previous {
            Some(prev) if !reached(t, self.current.t) => hermite(prev, &self.current, t, out),
            _ => out.copy_from_slice(&self.current.y),
        }
    }
}

/// Returns `true` if `t` has reached `target` up to roundoff.
pub(crate) fn reached(t: f64, target: f64) -> bool {
    target - t <= 100.0 * f64::EPSILON * t.abs().max(target.abs()).max(1.0)
}

/// Cubic Hermite interpolation between two points.
fn hermite(p0: &Point, p1: &Point, t: f64, out: &mut [f64]) {
    let h = p1.t - p0.t;
    let s = (t - p0.t) / h;
    let s2 = s * s;
    let s3 = s2 * s;

    let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;

    for (i, o) in out.iter_mut().enumerate() {
        *o = h00 * p0.y[i] + h10 * h * p0.f[i] + h01 * p1.y[i] + h11 * h * p1.f[i];
    }
}
