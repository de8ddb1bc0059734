//! Binary soft-margin SVM with a linear kernel
//!
//! Solves the C-SVC dual
//!
//! ```text
//! min_a  1/2 a'Qa - e'a    s.t.  y'a = 0,  0 <= a_i <= C
//! Q_ij = y_i y_j <x_i, x_j>
//! ```
//!
//! by sequential minimal optimisation with second-order working-set
//! selection. Because the kernel is linear the solution collapses into a
//! weight vector, so evaluation costs one dot product.

/// Floor for a non-positive curvature along the chosen pair
const TAU: f64 = 1e-12;

#[inline]
fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Fitted separating hyperplane, `f(x) = <w, x> - rho`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSvm {
    weights: Vec<f64>,
    rho: f64,
}

impl LinearSvm {
    /// Signed decision value; positive means the `+1` side
    pub fn decision(&self, x: &[f64]) -> f64 {
        dot(&self.weights, x) - self.rho
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }
}

/// Solver result with convergence bookkeeping
#[derive(Debug, Clone)]
pub struct SolverOutcome {
    pub svm: LinearSvm,
    pub iterations: usize,
    pub converged: bool,
    pub support_vectors: usize,
}

/// Fit a binary linear SVM
///
/// # Arguments
/// * `xs` - Training rows, all of equal length
/// * `ys` - `+1.0` / `-1.0` targets aligned with `xs`
/// * `c` - Upper bound on every dual variable
/// * `tolerance` - Stop once the maximal KKT violation falls below this
/// * `max_iterations` - Hard cap on SMO steps
pub fn train(
    xs: &[&[f64]],
    ys: &[f64],
    c: f64,
    tolerance: f64,
    max_iterations: usize,
) -> SolverOutcome {
    debug_assert_eq!(xs.len(), ys.len());
    let l = xs.len();

    let qd: Vec<f64> = xs.iter().map(|x| dot(x, x)).collect();
    let mut alpha = vec![0.0; l];
    let mut grad = vec![-1.0; l];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iterations {
        let Some((i, j)) = select_working_set(xs, ys, &qd, &alpha, &grad, c, tolerance) else {
            converged = true;
            break;
        };
        iterations += 1;

        let q_ij = ys[i] * ys[j] * dot(xs[i], xs[j]);
        let (old_ai, old_aj) = (alpha[i], alpha[j]);

        if ys[i] != ys[j] {
            let quad = positive_or_tau(qd[i] + qd[j] + 2.0 * q_ij);
            let delta = (-grad[i] - grad[j]) / quad;
            let diff = alpha[i] - alpha[j];
            alpha[i] += delta;
            alpha[j] += delta;

            if diff > 0.0 {
                if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = diff;
                }
                if alpha[i] > c {
                    alpha[i] = c;
                    alpha[j] = c - diff;
                }
            } else {
                if alpha[i] < 0.0 {
                    alpha[i] = 0.0;
                    alpha[j] = -diff;
                }
                if alpha[j] > c {
                    alpha[j] = c;
                    alpha[i] = c + diff;
                }
            }
        } else {
            let quad = positive_or_tau(qd[i] + qd[j] - 2.0 * q_ij);
            let delta = (grad[i] - grad[j]) / quad;
            let sum = alpha[i] + alpha[j];
            alpha[i] -= delta;
            alpha[j] += delta;

            if sum > c {
                if alpha[i] > c {
                    alpha[i] = c;
                    alpha[j] = sum - c;
                }
                if alpha[j] > c {
                    alpha[j] = c;
                    alpha[i] = sum - c;
                }
            } else {
                if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = sum;
                }
                if alpha[i] < 0.0 {
                    alpha[i] = 0.0;
                    alpha[j] = sum;
                }
            }
        }

        let delta_i = alpha[i] - old_ai;
        let delta_j = alpha[j] - old_aj;
        for k in 0..l {
            let q_ki = ys[k] * ys[i] * dot(xs[k], xs[i]);
            let q_kj = ys[k] * ys[j] * dot(xs[k], xs[j]);
            grad[k] += q_ki * delta_i + q_kj * delta_j;
        }
    }

    let rho = compute_rho(ys, &alpha, &grad, c);

    let dim = xs.first().map_or(0, |x| x.len());
    let mut weights = vec![0.0; dim];
    let mut support_vectors = 0;
    for ((x, &y), &a) in xs.iter().zip(ys).zip(&alpha) {
        if a > 0.0 {
            support_vectors += 1;
            for (w, v) in weights.iter_mut().zip(x.iter()) {
                *w += a * y * v;
            }
        }
    }

    SolverOutcome {
        svm: LinearSvm { weights, rho },
        iterations,
        converged,
        support_vectors,
    }
}

#[inline]
fn positive_or_tau(quad: f64) -> f64 {
    if quad > 0.0 {
        quad
    } else {
        TAU
    }
}

/// Pick the maximal-violating `i` and the `j` with the best second-order gain
///
/// Returns `None` once the KKT gap drops below `tolerance`.
fn select_working_set(
    xs: &[&[f64]],
    ys: &[f64],
    qd: &[f64],
    alpha: &[f64],
    grad: &[f64],
    c: f64,
    tolerance: f64,
) -> Option<(usize, usize)> {
    let mut gmax = f64::NEG_INFINITY;
    let mut gmax_idx = None;

    for t in 0..ys.len() {
        if ys[t] > 0.0 {
            if alpha[t] < c && -grad[t] >= gmax {
                gmax = -grad[t];
                gmax_idx = Some(t);
            }
        } else if alpha[t] > 0.0 && grad[t] >= gmax {
            gmax = grad[t];
            gmax_idx = Some(t);
        }
    }

    let i = gmax_idx?;
    let mut gmax2 = f64::NEG_INFINITY;
    let mut gmin_idx = None;
    let mut obj_diff_min = f64::INFINITY;

    for j in 0..ys.len() {
        let grad_diff = if ys[j] > 0.0 {
            if alpha[j] <= 0.0 {
                continue;
            }
            gmax2 = gmax2.max(grad[j]);
            gmax + grad[j]
        } else {
            if alpha[j] >= c {
                continue;
            }
            gmax2 = gmax2.max(-grad[j]);
            gmax - grad[j]
        };

        if grad_diff > 0.0 {
            // ||x_i - x_j||^2 whichever side j is on
            let quad = positive_or_tau(qd[i] + qd[j] - 2.0 * dot(xs[i], xs[j]));
            let obj_diff = -(grad_diff * grad_diff) / quad;
            if obj_diff <= obj_diff_min {
                gmin_idx = Some(j);
                obj_diff_min = obj_diff;
            }
        }
    }

    if gmax + gmax2 < tolerance {
        return None;
    }
    gmin_idx.map(|j| (i, j))
}

/// Offset of the hyperplane from the free support vectors
fn compute_rho(ys: &[f64], alpha: &[f64], grad: &[f64], c: f64) -> f64 {
    let mut upper = f64::INFINITY;
    let mut lower = f64::NEG_INFINITY;
    let mut free_count = 0usize;
    let mut free_sum = 0.0;

    for ((&y, &a), &g) in ys.iter().zip(alpha).zip(grad) {
        let yg = y * g;
        if a >= c {
            if y < 0.0 {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        } else if a <= 0.0 {
            if y > 0.0 {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        } else {
            free_count += 1;
            free_sum += yg;
        }
    }

    if free_count > 0 {
        free_sum / free_count as f64
    } else {
        (upper + lower) / 2.0
    }
}
