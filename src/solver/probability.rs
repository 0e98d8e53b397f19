//! Probability estimates from decision values
//!
//! Pairwise decision values are mapped through Platt sigmoids fitted at
//! training time (Lin, Lin and Weng's numerically stable variant), and the
//! pairwise probabilities are coupled into one distribution over classes
//! with the second method of Wu, Lin and Weng.

use crate::core::{ProbabilityEstimate, Result, SVMError, SparseVector};
use crate::kernel::Kernel;
use crate::solver::decision::{decision_values, first_argmax};
use crate::solver::SvmModel;
use log::warn;

/// Pairwise probabilities are clamped to `[MIN_PROB, 1 - MIN_PROB]`
const MIN_PROB: f64 = 1e-7;

/// Fit sigmoid parameters `(A, B)` so that `1 / (1 + exp(A f + B))`
/// estimates `P(y = +1 | f)`
///
/// `labels` are positive for the first class of the pair.
pub fn sigmoid_train(dec_values: &[f64], labels: &[f64]) -> (f64, f64) {
    const MAX_ITER: usize = 100;
    const MIN_STEP: f64 = 1e-10;
    const SIGMA: f64 = 1e-12;
    const EPS: f64 = 1e-5;

    let prior1 = labels.iter().filter(|&&y| y > 0.0).count() as f64;
    let prior0 = labels.len() as f64 - prior1;

    let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
    let lo_target = 1.0 / (prior0 + 2.0);
    let targets: Vec<f64> = labels
        .iter()
        .map(|&y| if y > 0.0 { hi_target } else { lo_target })
        .collect();

    let objective = |a: f64, b: f64| -> f64 {
        dec_values
            .iter()
            .zip(&targets)
            .map(|(&f, &t)| {
                let f_apb = f * a + b;
                if f_apb >= 0.0 {
                    t * f_apb + (1.0 + (-f_apb).exp()).ln()
                } else {
                    (t - 1.0) * f_apb + (1.0 + f_apb.exp()).ln()
                }
            })
            .sum()
    };

    let mut a = 0.0;
    let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
    let mut fval = objective(a, b);

    let mut iter = 0;
    while iter < MAX_ITER {
        // gradient and Hessian, with H' = H + sigma I
        let (mut h11, mut h22, mut h21) = (SIGMA, SIGMA, 0.0);
        let (mut g1, mut g2) = (0.0, 0.0);
        for (&f, &t) in dec_values.iter().zip(&targets) {
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

        if g1.abs() < EPS && g2.abs() < EPS {
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
            let new_f = objective(new_a, new_b);
            if new_f < fval + 0.0001 * step * gd {
                a = new_a;
                b = new_b;
                fval = new_f;
                break;
            }
            step /= 2.0;
        }

        if step < MIN_STEP {
            warn!("Sigmoid fit line search failed");
            break;
        }
        iter += 1;
    }

    if iter >= MAX_ITER {
        warn!("Sigmoid fit reached the maximum of {MAX_ITER} iterations");
    }

    (a, b)
}

/// Probability of the first class of a pair given its decision value
pub fn sigmoid_predict(dec_value: f64, a: f64, b: f64) -> f64 {
    let f_apb = dec_value * a + b;
    if f_apb >= 0.0 {
        (-f_apb).exp() / (1.0 + (-f_apb).exp())
    } else {
        1.0 / (1.0 + f_apb.exp())
    }
}

/// Couple pairwise probabilities `r[i][j] = P(i | i or j)` into class
/// probabilities summing to one
pub fn multiclass_probability(r: &[Vec<f64>]) -> Vec<f64> {
    let k = r.len();
    let max_iter = k.max(100);
    let eps = 0.005 / k as f64;

    let mut p = vec![1.0 / k as f64; k];
    let mut q = vec![vec![0.0; k]; k];
    for t in 0..k {
        for j in 0..t {
            q[t][t] += r[j][t] * r[j][t];
            q[t][j] = q[j][t];
        }
        for j in (t + 1)..k {
            q[t][t] += r[j][t] * r[j][t];
            q[t][j] = -r[j][t] * r[t][j];
        }
    }

    let mut qp = vec![0.0; k];
    let mut iter = 0;
    while iter < max_iter {
        let mut pqp = 0.0;
        for t in 0..k {
            qp[t] = (0..k).map(|j| q[t][j] * p[j]).sum();
            pqp += p[t] * qp[t];
        }

        let max_error = qp
            .iter()
            .map(|&v| (v - pqp).abs())
            .fold(0.0_f64, f64::max);
        if max_error < eps {
            break;
        }

        for t in 0..k {
            let diff = (-qp[t] + pqp) / q[t][t];
            p[t] += diff;
            pqp = (pqp + diff * (diff * q[t][t] + 2.0 * qp[t])) / (1.0 + diff) / (1.0 + diff);
            for j in 0..k {
                qp[j] = (qp[j] + diff * q[t][j]) / (1.0 + diff);
                p[j] /= 1.0 + diff;
            }
        }
        iter += 1;
    }

    if iter >= max_iter {
        warn!("Probability coupling reached the maximum of {max_iter} iterations");
    }

    p
}

/// Per-class probabilities of `x` under a model trained with probability
/// information
pub fn predict_probability(
    model: &SvmModel,
    kernel: &dyn Kernel,
    x: &SparseVector,
) -> Result<ProbabilityEstimate> {
    let (prob_a, prob_b) = match (&model.prob_a, &model.prob_b) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(SVMError::ProbabilityNotSupported),
    };

    let n_classes = model.n_classes();
    let decision = decision_values(model, kernel, x);

    let mut pairwise = vec![vec![0.0; n_classes]; n_classes];
    let mut p = 0;
    for i in 0..n_classes {
        for j in (i + 1)..n_classes {
            let r = sigmoid_predict(decision.scores[p], prob_a[p], prob_b[p])
                .clamp(MIN_PROB, 1.0 - MIN_PROB);
            pairwise[i][j] = r;
            pairwise[j][i] = 1.0 - r;
            p += 1;
        }
    }

    let probabilities = if n_classes == 2 {
        vec![pairwise[0][1], pairwise[1][0]]
    } else {
        multiclass_probability(&pairwise)
    };

    Ok(ProbabilityEstimate {
        class_index: first_argmax(&probabilities),
        probabilities,
    })
}
