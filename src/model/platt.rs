//! Probability calibration
//!
//! Each pairwise SVM gets a sigmoid `P(+1 | f) = 1 / (1 + exp(A·f + B))`
//! fitted to its decision values by regularised maximum likelihood. Pairwise
//! probabilities are then combined into one distribution over all classes.

/// Pairwise probabilities are kept away from exactly 0 and 1
const MIN_PROBABILITY: f64 = 1e-7;

const MAX_NEWTON_ITERATIONS: usize = 100;
const MIN_STEP: f64 = 1e-10;
const HESSIAN_RIDGE: f64 = 1e-12;
const GRADIENT_EPS: f64 = 1e-5;

/// Pseudo-count added to each side when smoothing the fit targets
const TARGET_PSEUDO_COUNT: f64 = 0.5;

/// Fitted sigmoid parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlattSigmoid {
    pub a: f64,
    pub b: f64,
}

impl PlattSigmoid {
    /// Fit the sigmoid to decision values and their true sides
    ///
    /// Targets are smoothed with half a pseudo-count per side
    /// (`(N+ + 0.5) / (N+ + 1)` and `0.5 / (N- + 1)`), which keeps the fit
    /// finite on separable data. Newton's method with a backtracking line
    /// search.
    pub fn fit(decision_values: &[f64], positive: &[bool]) -> Self {
        debug_assert_eq!(decision_values.len(), positive.len());

        let prior1 = positive.iter().filter(|&&p| p).count() as f64;
        let prior0 = positive.len() as f64 - prior1;

        let hi_target = (prior1 + TARGET_PSEUDO_COUNT) / (prior1 + 2.0 * TARGET_PSEUDO_COUNT);
        let lo_target = TARGET_PSEUDO_COUNT / (prior0 + 2.0 * TARGET_PSEUDO_COUNT);
        let targets: Vec<f64> = positive
            .iter()
            .map(|&p| if p { hi_target } else { lo_target })
            .collect();

        let mut a = 0.0;
        let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
        let mut fval = objective(decision_values, &targets, a, b);

        for _ in 0..MAX_NEWTON_ITERATIONS {
            let mut h11 = HESSIAN_RIDGE;
            let mut h22 = HESSIAN_RIDGE;
            let mut h21 = 0.0;
            let mut g1 = 0.0;
            let mut g2 = 0.0;

            for (&f, &t) in decision_values.iter().zip(&targets) {
                let f_apb = f * a + b;
                let (p, q) = if f_apb >= 0.0 {
                    let e = (-f_apb).exp();
                    (e / (1.0 + e), 1.0 / (1.0 + e))
                } else {
                    let e = f_apb.exp();
                    (1.0 / (1.0 + e), e / (1.0 + e))
                };
                let d2 = p * q;
                h11 += f * f * d2;
                h22 += d2;
                h21 += f * d2;
                let d1 = t - p;
                g1 += f * d1;
                g2 += d1;
            }

            if g1.abs() < GRADIENT_EPS && g2.abs() < GRADIENT_EPS {
                break;
            }

            let det = h11 * h22 - h21 * h21;
            let da = -(h22 * g1 - h21 * g2) / det;
            let db = -(-h21 * g1 + h11 * g2) / det;
            let gd = g1 * da + g2 * db;

            let mut step = 1.0;
            while step >= MIN_STEP {
                let new_a = a + step * da;
                let new_b = b + step * db;
                let new_f = objective(decision_values, &targets, new_a, new_b);
                if new_f < fval + 1e-4 * step * gd {
                    a = new_a;
                    b = new_b;
                    fval = new_f;
                    break;
                }
                step /= 2.0;
            }

            if step < MIN_STEP {
                // Line search failed; keep the last accepted parameters
                break;
            }
        }

        PlattSigmoid { a, b }
    }

    /// Probability that decision value `f` belongs to the positive side
    pub fn probability(&self, f: f64) -> f64 {
        let f_apb = f * self.a + self.b;
        let p = if f_apb >= 0.0 {
            let e = (-f_apb).exp();
            e / (1.0 + e)
        } else {
            1.0 / (1.0 + f_apb.exp())
        };
        p.clamp(MIN_PROBABILITY, 1.0 - MIN_PROBABILITY)
    }
}

/// Negative log-likelihood of the sigmoid, written to avoid overflow
fn objective(decision_values: &[f64], targets: &[f64], a: f64, b: f64) -> f64 {
    decision_values
        .iter()
        .zip(targets)
        .map(|(&f, &t)| {
            let f_apb = f * a + b;
            if f_apb >= 0.0 {
                t * f_apb + (1.0 + (-f_apb).exp()).ln()
            } else {
                (t - 1.0) * f_apb + (1.0 + f_apb.exp()).ln()
            }
        })
        .sum()
}

/// Combine pairwise probabilities into one distribution
///
/// `r[i][j]` is the probability of class `i` given that the sample is either
/// `i` or `j`, with `r[j][i] = 1 - r[i][j]`. Solves the quadratic coupling
/// problem iteratively; the result sums to one.
pub fn couple_pairwise(r: &[Vec<f64>]) -> Vec<f64> {
    let k = r.len();
    if k == 0 {
        return Vec::new();
    }
    if k == 1 {
        return vec![1.0];
    }

    let max_iterations = k.max(100);
    let eps = 0.005 / k as f64;

    let mut q = vec![vec![0.0; k]; k];
    for t in 0..k {
        for j in 0..k {
            if j == t {
                continue;
            }
            q[t][t] += r[j][t] * r[j][t];
            q[t][j] = -r[j][t] * r[t][j];
        }
    }

    let mut p = vec![1.0 / k as f64; k];
    let mut qp = vec![0.0; k];

    for _ in 0..max_iterations {
        let mut p_qp = 0.0;
        for t in 0..k {
            qp[t] = (0..k).map(|j| q[t][j] * p[j]).sum();
            p_qp += p[t] * qp[t];
        }

        let max_error = qp
            .iter()
            .map(|&v| (v - p_qp).abs())
            .fold(0.0_f64, f64::max);
        if max_error < eps {
            break;
        }

        for t in 0..k {
            let diff = (-qp[t] + p_qp) / q[t][t];
            p[t] += diff;
            p_qp = (p_qp + diff * (diff * q[t][t] + 2.0 * qp[t])) / (1.0 + diff) / (1.0 + diff);
            for j in 0..k {
                qp[j] = (qp[j] + diff * q[t][j]) / (1.0 + diff);
                p[j] /= 1.0 + diff;
            }
        }
    }

    p
}
