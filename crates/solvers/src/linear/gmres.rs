use tandem_core::{HookStatus, Layout, LinearSolver, SetupContext, SetupOutcome, SolveContext};

/// Krylov dimension used by [`MatrixFreeGmres::default`].
pub const DEFAULT_KRYLOV_DIM: usize = 5;

/// Matrix-free GMRES for distributed state.
///
/// Products `J·v` are forward difference quotients of the right-hand side
/// around the current iterate, so only the local segment is ever touched and
/// inner products reduce through the layout. The system is scaled by the
/// error weights. There is no preconditioner and no restart.
#[derive(Debug)]
pub struct MatrixFreeGmres {
    max_krylov: usize,
    basis: Vec<Vec<f64>>,
    hessenberg: Vec<Vec<f64>>,
    rotations: Vec<(f64, f64)>,
    g: Vec<f64>,
    coefficients: Vec<f64>,
    unscaled: Vec<f64>,
    perturbed: Vec<f64>,
    perturbed_derivative: Vec<f64>,
}

impl MatrixFreeGmres {
    /// Creates a solver with a Krylov subspace of at most `max_krylov`
    /// vectors (at least one).
    #[must_use]
    pub fn new(max_krylov: usize) -> Self {
        let max_krylov = max_krylov.max(1);
        Self {
            max_krylov,
            basis: Vec::new(),
            hessenberg: Vec::new(),
            rotations: Vec::new(),
            g: Vec::new(),
            coefficients: Vec::new(),
            unscaled: Vec::new(),
            perturbed: Vec::new(),
            perturbed_derivative: Vec::new(),
        }
    }

    #[must_use]
    pub fn max_krylov(&self) -> usize {
        self.max_krylov
    }
}

impl Default for MatrixFreeGmres {
    fn default() -> Self {
        Self::new(DEFAULT_KRYLOV_DIM)
    }
}

fn norm(layout: &Layout, v: &[f64]) -> f64 {
    layout.dot(v, v).sqrt()
}

impl LinearSolver for MatrixFreeGmres {
    fn init(&mut self, layout: &Layout) -> HookStatus {
        let n = layout.local_len();
        let m = self.max_krylov;
        self.basis = vec![vec![0.0; n]; m + 1];
        self.hessenberg = vec![vec![0.0; m]; m + 1];
        self.rotations = vec![(1.0, 0.0); m];
        self.g = vec![0.0; m + 1];
        self.coefficients = vec![0.0; m];
        self.unscaled = vec![0.0; n];
        self.perturbed = vec![0.0; n];
        self.perturbed_derivative = vec![0.0; n];
        HookStatus::Success
    }

    /// Nothing to prepare: `J·v` is always formed at the current iterate.
    fn setup(&mut self, _ctx: SetupContext<'_>) -> SetupOutcome {
        SetupOutcome::current()
    }

    fn solve(&mut self, ctx: SolveContext<'_>) -> HookStatus {
        let SolveContext {
            time,
            gamma,
            rhs_vector,
            current_state,
            current_derivative,
            error_weights: w,
            tolerance,
            layout,
            rhs,
            ..
        } = ctx;

        // Scaled initial residual with x₀ = 0.
        for ((v, b), wi) in self.basis[0].iter_mut().zip(rhs_vector.iter()).zip(w) {
            *v = wi * b;
        }
        let beta = norm(layout, &self.basis[0]);
        if !beta.is_finite() {
            return HookStatus::Recoverable;
        }

        // Tolerance is a weighted RMS value; compare in the 2-norm.
        let target = tolerance * (layout.global_len() as f64).sqrt();
        if beta <= target {
            rhs_vector.fill(0.0);
            return HookStatus::Success;
        }

        for v in &mut self.basis[0] {
            *v /= beta;
        }
        self.g.fill(0.0);
        self.g[0] = beta;

        let mut residual = beta;
        let mut k = 0;

        for j in 0..self.max_krylov {
            // u = W⁻¹ vⱼ
            for ((u, v), wi) in self.unscaled.iter_mut().zip(&self.basis[j]).zip(w) {
                *u = v / wi;
            }

            // J·u ≈ (f(t, z + σu) − f(t, z)) / σ with ‖σu‖ = 1 in the WRMS norm.
            let u_norm = layout.wrms_norm(&self.unscaled, w);
            let sigma = if u_norm > 0.0 { 1.0 / u_norm } else { 1.0 };
            for ((p, z), u) in self
                .perturbed
                .iter_mut()
                .zip(current_state)
                .zip(&self.unscaled)
            {
                *p = z + sigma * u;
            }
            rhs.mult(time, &self.perturbed, &mut self.perturbed_derivative);

            let (head, tail) = self.basis.split_at_mut(j + 1);
            let next = &mut tail[0];
            for i in 0..next.len() {
                let jv = (self.perturbed_derivative[i] - current_derivative[i]) / sigma;
                next[i] = w[i] * (self.unscaled[i] - gamma * jv);
            }

            // Modified Gram–Schmidt.
            for (i, vi) in head.iter().enumerate() {
                let hij = layout.dot(next, vi);
                self.hessenberg[i][j] = hij;
                for (a, b) in next.iter_mut().zip(vi) {
                    *a -= hij * b;
                }
            }

            let h_next = norm(layout, next);
            if !h_next.is_finite() {
                return HookStatus::Recoverable;
            }
            self.hessenberg[j + 1][j] = h_next;
            if h_next > 0.0 {
                for a in next.iter_mut() {
                    *a /= h_next;
                }
            }

            // Apply earlier rotations to the new column, then annihilate h[j+1][j].
            for i in 0..j {
                let (c, s) = self.rotations[i];
                let upper = self.hessenberg[i][j];
                let lower = self.hessenberg[i + 1][j];
                self.hessenberg[i][j] = c * upper + s * lower;
                self.hessenberg[i + 1][j] = -s * upper + c * lower;
            }
            let diag = self.hessenberg[j][j];
            let r = diag.hypot(h_next);
            if r == 0.0 {
                return HookStatus::Recoverable;
            }
            let (c, s) = (diag / r, h_next / r);
            self.rotations[j] = (c, s);
            self.hessenberg[j][j] = r;
            self.hessenberg[j + 1][j] = 0.0;
            self.g[j + 1] = -s * self.g[j];
            self.g[j] *= c;

            residual = self.g[j + 1].abs();
            k = j + 1;
            log::trace!("gmres iteration {k}: residual = {residual:.6e}");

            if residual <= target || h_next == 0.0 {
                break;
            }
        }

        // Back-substitute R y = g.
        for i in (0..k).rev() {
            let mut sum = self.g[i];
            for l in (i + 1)..k {
                sum -= self.hessenberg[i][l] * self.coefficients[l];
            }
            self.coefficients[i] = sum / self.hessenberg[i][i];
        }

        // x = W⁻¹ Σ yᵢ vᵢ
        for (idx, x) in rhs_vector.iter_mut().enumerate() {
            let scaled: f64 = (0..k)
                .map(|i| self.coefficients[i] * self.basis[i][idx])
                .sum();
            *x = scaled / w[idx];
        }

        if residual < beta {
            HookStatus::Success
        } else {
            HookStatus::Recoverable
        }
    }

    fn free(&mut self) {
        self.basis = Vec::new();
        self.hessenberg = Vec::new();
        self.rotations = Vec::new();
        self.g = Vec::new();
        self.coefficients = Vec::new();
        self.unscaled = Vec::new();
        self.perturbed = Vec::new();
        self.perturbed_derivative = Vec::new();
    }

    fn name(&self) -> &'static str {
        "gmres"
    }
}
