//! Sequential Minimal Optimization (SMO) solver implementation
//!
//! Solves the C-SVC dual
//!
//! ```text
//! min 0.5 a^T Q a - e^T a   s.t.   y^T a = 0,   0 <= a_i <= C
//! ```
//!
//! two variables at a time, picking the pair with the second order working
//! set selection of Fan, Chen and Lin (2005). Multi-class problems are split
//! into one binary problem per pair of classes.

use crate::cache::KernelCache;
use crate::core::{
    Decision, MachineType, ProbabilityEstimate, Result, SVMError, Sample, Solver, SparseVector,
    SvmParameters,
};
use crate::kernel::{Kernel, KernelParams};
use crate::solver::{decision, probability, SvmModel};
use log::{debug, info, warn};

/// Floor for non positive curvature along the working pair
const TAU: f64 = 1e-12;

const DEFAULT_MAX_ITERATIONS: usize = 10_000_000;

/// Folds of the internal cross validation that feeds the Platt sigmoids
const PROBABILITY_FOLDS: usize = 5;

/// Built-in C-SVC solver
///
/// Only `C_SVC` training is available; models of any classification type
/// (e.g. `NU_SVC` models loaded from disk) can be evaluated since they share
/// the same decision function.
#[derive(Debug, Clone)]
pub struct SmoSolver {
    max_iterations: usize,
}

impl Default for SmoSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SmoSolver {
    pub fn new() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Cap the number of SMO steps per binary problem
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Decision values of every sample under a cross-validated binary
    /// classifier, turned into sigmoid parameters
    ///
    /// Fold membership is `position % PROBABILITY_FOLDS`, so results are
    /// reproducible run to run.
    fn cross_validated_sigmoid(
        &self,
        x: &[&SparseVector],
        y: &[f64],
        kernel: &dyn Kernel,
        params: &SvmParameters,
    ) -> (f64, f64) {
        let l = y.len();
        let mut dec_values = vec![0.0; l];

        for fold in 0..PROBABILITY_FOLDS {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..l).partition(|&k| k % PROBABILITY_FOLDS == fold);
            if test.is_empty() {
                continue;
            }

            let n_pos = train.iter().filter(|&&k| y[k] > 0.0).count();
            let n_neg = train.len() - n_pos;

            if n_pos == 0 && n_neg == 0 {
                test.iter().for_each(|&k| dec_values[k] = 0.0);
            } else if n_neg == 0 {
                test.iter().for_each(|&k| dec_values[k] = 1.0);
            } else if n_pos == 0 {
                test.iter().for_each(|&k| dec_values[k] = -1.0);
            } else {
                let problem = BinaryProblem::new(
                    train.iter().map(|&k| x[k]).collect(),
                    train.iter().map(|&k| y[k]).collect(),
                    kernel,
                    params.cost,
                    params.cost,
                );
                let solution = problem.solve(params.eps, params.cache_size, self.max_iterations);
                for &k in &test {
                    dec_values[k] = problem.decision_value(&solution, x[k]);
                }
            }
        }

        probability::sigmoid_train(&dec_values, y)
    }
}

impl Solver for SmoSolver {
    fn train(
        &self,
        params: &SvmParameters,
        samples: &[Sample],
        n_features: usize,
    ) -> Result<SvmModel> {
        params.validate()?;
        if params.machine_type != MachineType::CSvc {
            return Err(SVMError::TrainingError(format!(
                "{} training is not available, only C_SVC",
                params.machine_type
            )));
        }
        if samples.is_empty() {
            return Err(SVMError::InvalidDataset("No training samples".to_string()));
        }

        let kernel_params = KernelParams {
            kernel_type: params.kernel_type,
            degree: params.degree,
            gamma: params.gamma,
            coef0: params.coef0,
        };
        let kernel = kernel_params.build()?;

        // classes in order of first appearance
        let mut labels: Vec<i64> = Vec::new();
        let mut members: Vec<Vec<usize>> = Vec::new();
        for (idx, sample) in samples.iter().enumerate() {
            if !sample.label.is_finite() || sample.label.fract() != 0.0 {
                return Err(SVMError::InvalidDataset(format!(
                    "Sample {idx} has non-integral label {}",
                    sample.label
                )));
            }
            if let Some(max) = sample.features.max_index() {
                if max >= n_features {
                    return Err(SVMError::DimensionMismatch {
                        expected: n_features,
                        actual: max + 1,
                    });
                }
            }

            let label = sample.label as i64;
            match labels.iter().position(|&l| l == label) {
                Some(class) => members[class].push(idx),
                None => {
                    labels.push(label);
                    members.push(vec![idx]);
                }
            }
        }

        let n_classes = labels.len();
        if n_classes < 2 {
            return Err(SVMError::NotEnoughClasses(n_classes));
        }

        let mut nonzero = vec![false; samples.len()];
        let mut pair_alpha = Vec::new();
        let mut rho = Vec::new();
        let mut prob_a = Vec::new();
        let mut prob_b = Vec::new();

        for i in 0..n_classes {
            for j in (i + 1)..n_classes {
                let indices: Vec<usize> = members[i].iter().chain(&members[j]).copied().collect();
                let x: Vec<&SparseVector> =
                    indices.iter().map(|&k| &samples[k].features).collect();
                let y: Vec<f64> = std::iter::repeat(1.0)
                    .take(members[i].len())
                    .chain(std::iter::repeat(-1.0).take(members[j].len()))
                    .collect();

                if params.probability {
                    let (a, b) = self.cross_validated_sigmoid(&x, &y, kernel.as_ref(), params);
                    prob_a.push(a);
                    prob_b.push(b);
                }

                let problem = BinaryProblem::new(x, y, kernel.as_ref(), params.cost, params.cost);
                let solution = problem.solve(params.eps, params.cache_size, self.max_iterations);
                debug!(
                    "Classes {} vs {}: {} iterations, rho = {}",
                    labels[i], labels[j], solution.iterations, solution.rho
                );

                for (pos, &k) in indices.iter().enumerate() {
                    if solution.alpha[pos] != 0.0 {
                        nonzero[k] = true;
                    }
                }
                rho.push(solution.rho);
                pair_alpha.push(solution.alpha);
            }
        }

        // support vectors grouped by class
        let mut n_sv = vec![0; n_classes];
        let mut sv_position = vec![0; samples.len()];
        let mut support_vectors = Vec::new();
        for (class, class_members) in members.iter().enumerate() {
            for &k in class_members {
                if nonzero[k] {
                    sv_position[k] = support_vectors.len();
                    support_vectors.push(samples[k].features.clone());
                    n_sv[class] += 1;
                }
            }
        }

        let mut sv_coef = vec![vec![0.0; support_vectors.len()]; n_classes - 1];
        let mut p = 0;
        for i in 0..n_classes {
            for j in (i + 1)..n_classes {
                let alpha = &pair_alpha[p];
                let offset = members[i].len();
                for (pos, &k) in members[i].iter().enumerate() {
                    if nonzero[k] {
                        sv_coef[j - 1][sv_position[k]] = alpha[pos];
                    }
                }
                for (pos, &k) in members[j].iter().enumerate() {
                    if nonzero[k] {
                        sv_coef[i][sv_position[k]] = alpha[offset + pos];
                    }
                }
                p += 1;
            }
        }

        info!(
            "Trained {}-class model with {} support vectors",
            n_classes,
            support_vectors.len()
        );

        let model = SvmModel {
            machine_type: MachineType::CSvc,
            kernel: kernel_params,
            n_features,
            labels,
            rho,
            prob_a: params.probability.then_some(prob_a),
            prob_b: params.probability.then_some(prob_b),
            n_sv,
            sv_coef,
            support_vectors,
        };
        model.validate()?;
        Ok(model)
    }

    fn predict_decision(&self, model: &SvmModel, x: &SparseVector) -> Result<Decision> {
        let kernel = model.kernel.build()?;
        Ok(decision::decision_values(model, kernel.as_ref(), x))
    }

    fn predict_probability(
        &self,
        model: &SvmModel,
        x: &SparseVector,
    ) -> Result<ProbabilityEstimate> {
        if !model.supports_probability() {
            return Err(SVMError::ProbabilityNotSupported);
        }
        let kernel = model.kernel.build()?;
        probability::predict_probability(model, kernel.as_ref(), x)
    }
}

/// Solution of one binary problem
struct BinarySolution {
    /// `alpha_i * y_i` for every sample of the problem
    alpha: Vec<f64>,
    rho: f64,
    iterations: usize,
}

/// Binary C-SVC dual problem with labels `+1` / `-1`
struct BinaryProblem<'a> {
    x: Vec<&'a SparseVector>,
    norms: Vec<f64>,
    y: Vec<f64>,
    kernel: &'a dyn Kernel,
    c_pos: f64,
    c_neg: f64,
}

impl<'a> BinaryProblem<'a> {
    fn new(
        x: Vec<&'a SparseVector>,
        y: Vec<f64>,
        kernel: &'a dyn Kernel,
        c_pos: f64,
        c_neg: f64,
    ) -> Self {
        let norms = x.iter().map(|v| v.norm_squared()).collect();
        Self {
            x,
            norms,
            y,
            kernel,
            c_pos,
            c_neg,
        }
    }

    fn kernel_value(&self, i: usize, j: usize) -> f64 {
        self.kernel
            .compute_with_norms(self.x[i], self.x[j], self.norms[i], self.norms[j])
    }

    /// Row `i` of `Q = (y_i y_j K(x_i, x_j))`
    fn q_row(&self, i: usize) -> Vec<f64> {
        (0..self.y.len())
            .map(|j| self.y[i] * self.y[j] * self.kernel_value(i, j))
            .collect()
    }

    fn upper_bound(&self, i: usize) -> f64 {
        if self.y[i] > 0.0 {
            self.c_pos
        } else {
            self.c_neg
        }
    }

    fn is_upper(&self, i: usize, alpha: f64) -> bool {
        alpha >= self.upper_bound(i)
    }

    fn is_lower(alpha: f64) -> bool {
        alpha <= 0.0
    }

    fn solve(&self, eps: f64, cache_size: f64, max_iterations: usize) -> BinarySolution {
        let l = self.y.len();
        let mut cache = KernelCache::with_memory_limit(cache_size, l);
        let qd: Vec<f64> = (0..l).map(|i| self.kernel_value(i, i)).collect();

        let mut alpha = vec![0.0; l];
        // gradient of the dual objective, Q a - e
        let mut grad = vec![-1.0; l];

        let mut iterations = 0;
        while iterations < max_iterations {
            let (i, j) = match self.select_working_set(&alpha, &grad, &qd, eps, &mut cache) {
                Some(pair) => pair,
                None => break,
            };
            iterations += 1;

            let q_i = cache.row(i, || self.q_row(i));
            let q_j = cache.row(j, || self.q_row(j));
            let (c_i, c_j) = (self.upper_bound(i), self.upper_bound(j));
            let (old_i, old_j) = (alpha[i], alpha[j]);

            if self.y[i] != self.y[j] {
                let quad = positive_or_tau(qd[i] + qd[j] + 2.0 * q_i[j]);
                let delta = (-grad[i] - grad[j]) / quad;
                let diff = alpha[i] - alpha[j];
                alpha[i] += delta;
                alpha[j] += delta;

                if diff > 0.0 {
                    if alpha[j] < 0.0 {
                        alpha[j] = 0.0;
                        alpha[i] = diff;
                    }
                } else if alpha[i] < 0.0 {
                    alpha[i] = 0.0;
                    alpha[j] = -diff;
                }
                if diff > c_i - c_j {
                    if alpha[i] > c_i {
                        alpha[i] = c_i;
                        alpha[j] = c_i - diff;
                    }
                } else if alpha[j] > c_j {
                    alpha[j] = c_j;
                    alpha[i] = c_j + diff;
                }
            } else {
                let quad = positive_or_tau(qd[i] + qd[j] - 2.0 * q_i[j]);
                let delta = (grad[i] - grad[j]) / quad;
                let sum = alpha[i] + alpha[j];
                alpha[i] -= delta;
                alpha[j] += delta;

                if sum > c_i {
                    if alpha[i] > c_i {
                        alpha[i] = c_i;
                        alpha[j] = sum - c_i;
                    }
                } else if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = sum;
                }
                if sum > c_j {
                    if alpha[j] > c_j {
                        alpha[j] = c_j;
                        alpha[i] = sum - c_j;
                    }
                } else if alpha[i] < 0.0 {
                    alpha[i] = 0.0;
                    alpha[j] = sum;
                }
            }

            let (delta_i, delta_j) = (alpha[i] - old_i, alpha[j] - old_j);
            for k in 0..l {
                grad[k] += q_i[k] * delta_i + q_j[k] * delta_j;
            }
        }

        if iterations >= max_iterations {
            warn!("SMO reached the maximum of {max_iterations} iterations before converging");
        }

        let stats = cache.stats();
        debug!(
            "Kernel cache: {} hits, {} misses, {} of {} rows",
            stats.hits, stats.misses, stats.size, stats.capacity
        );

        let rho = self.calculate_rho(&alpha, &grad);
        for (a, &y) in alpha.iter_mut().zip(&self.y) {
            *a *= y;
        }

        BinarySolution {
            alpha,
            rho,
            iterations,
        }
    }

    /// Maximal violating pair with second order selection of `j`, or `None`
    /// once the KKT conditions hold within `eps`
    fn select_working_set(
        &self,
        alpha: &[f64],
        grad: &[f64],
        qd: &[f64],
        eps: f64,
        cache: &mut KernelCache,
    ) -> Option<(usize, usize)> {
        let l = self.y.len();

        let mut gmax = f64::NEG_INFINITY;
        let mut gmax_idx = None;
        for t in 0..l {
            if self.y[t] > 0.0 {
                if !self.is_upper(t, alpha[t]) && -grad[t] >= gmax {
                    gmax = -grad[t];
                    gmax_idx = Some(t);
                }
            } else if !Self::is_lower(alpha[t]) && grad[t] >= gmax {
                gmax = grad[t];
                gmax_idx = Some(t);
            }
        }

        let i = gmax_idx?;
        let q_i = cache.row(i, || self.q_row(i));

        let mut gmax2 = f64::NEG_INFINITY;
        let mut gmin_idx = None;
        let mut obj_diff_min = f64::INFINITY;
        for j in 0..l {
            let (grad_diff, quad) = if self.y[j] > 0.0 {
                if Self::is_lower(alpha[j]) {
                    continue;
                }
                gmax2 = gmax2.max(grad[j]);
                (gmax + grad[j], qd[i] + qd[j] - 2.0 * self.y[i] * q_i[j])
            } else {
                if self.is_upper(j, alpha[j]) {
                    continue;
                }
                gmax2 = gmax2.max(-grad[j]);
                (gmax - grad[j], qd[i] + qd[j] + 2.0 * self.y[i] * q_i[j])
            };

            if grad_diff > 0.0 {
                let obj_diff = -(grad_diff * grad_diff) / positive_or_tau(quad);
                if obj_diff <= obj_diff_min {
                    gmin_idx = Some(j);
                    obj_diff_min = obj_diff;
                }
            }
        }

        if gmax + gmax2 < eps {
            return None;
        }
        gmin_idx.map(|j| (i, j))
    }

    /// Bias from free variables, or the midpoint of the feasible interval
    /// when every variable sits at a bound
    fn calculate_rho(&self, alpha: &[f64], grad: &[f64]) -> f64 {
        let mut n_free = 0usize;
        let mut sum_free = 0.0;
        let mut ub = f64::INFINITY;
        let mut lb = f64::NEG_INFINITY;

        for (i, (&a, &y)) in alpha.iter().zip(&self.y).enumerate() {
            let y_grad = y * grad[i];
            if self.is_upper(i, a) {
                if y < 0.0 {
                    ub = ub.min(y_grad);
                } else {
                    lb = lb.max(y_grad);
                }
            } else if Self::is_lower(a) {
                if y > 0.0 {
                    ub = ub.min(y_grad);
                } else {
                    lb = lb.max(y_grad);
                }
            } else {
                n_free += 1;
                sum_free += y_grad;
            }
        }

        if n_free > 0 {
            sum_free / n_free as f64
        } else {
            (ub + lb) / 2.0
        }
    }

    /// Decision value `sum_k alpha_k y_k K(x_k, x) - rho`
    fn decision_value(&self, solution: &BinarySolution, x: &SparseVector) -> f64 {
        let x_norm = x.norm_squared();
        let sum: f64 = solution
            .alpha
            .iter()
            .enumerate()
            .filter(|&(_, &a)| a != 0.0)
            .map(|(k, &a)| {
                a * self
                    .kernel
                    .compute_with_norms(self.x[k], x, self.norms[k], x_norm)
            })
            .sum();
        sum - solution.rho
    }
}

fn positive_or_tau(quad: f64) -> f64 {
    if quad > 0.0 {
        quad
    } else {
        TAU
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::KernelType;
    use approx::assert_relative_eq;

    fn sample(x: &[f64], label: f64) -> Sample {
        Sample::new(SparseVector::from_dense(x), label)
    }

    fn blobs() -> Vec<Sample> {
        vec![
            sample(&[2.0, 2.0], 1.0),
            sample(&[2.5, 1.5], 1.0),
            sample(&[1.5, 2.5], 1.0),
            sample(&[3.0, 3.0], 1.0),
            sample(&[-2.0, -2.0], -1.0),
            sample(&[-2.5, -1.5], -1.0),
            sample(&[-1.5, -2.5], -1.0),
            sample(&[-3.0, -3.0], -1.0),
        ]
    }

    fn three_blobs() -> Vec<Sample> {
        let mut samples = Vec::new();
        for (center, label) in [([0.0, 4.0], 7.0), ([4.0, 0.0], 3.0), ([-4.0, -4.0], 5.0)] {
            for offset in [[0.0, 0.0], [0.5, 0.0], [0.0, 0.5], [-0.5, 0.0], [0.0, -0.5]] {
                samples.push(sample(
                    &[center[0] + offset[0], center[1] + offset[1]],
                    label,
                ));
            }
        }
        samples
    }

    fn linear_params() -> SvmParameters {
        SvmParameters {
            kernel_type: KernelType::Linear,
            ..Default::default()
        }
    }

    #[test]
    fn test_binary_linear_separable() {
        let solver = SmoSolver::new();
        let samples = blobs();
        let model = solver.train(&linear_params(), &samples, 2).unwrap();

        assert_eq!(model.labels, vec![1, -1]);
        assert_eq!(model.n_sv.len(), 2);
        assert!(model.total_sv() >= 2);
        assert!(!model.supports_probability());

        for s in &samples {
            let d = solver.predict_decision(&model, &s.features).unwrap();
            assert_eq!(model.labels[d.class_index] as f64, s.label);
            assert_eq!(d.scores.len(), 1);
        }
    }

    #[test]
    fn test_dual_constraints_hold() {
        let samples = blobs();
        let params = SvmParameters {
            kernel_type: KernelType::Rbf,
            gamma: 0.5,
            cost: 0.5,
            ..Default::default()
        };
        let model = SmoSolver::new().train(&params, &samples, 2).unwrap();

        // sum of alpha_i y_i is zero and every |coefficient| is bounded by C
        let coef = &model.sv_coef[0];
        assert_relative_eq!(coef.iter().sum::<f64>(), 0.0, epsilon = 1e-9);
        assert!(coef.iter().all(|c| c.abs() <= params.cost + 1e-12));
    }

    #[test]
    fn test_label_order_follows_first_appearance() {
        let mut samples = blobs();
        samples.reverse();
        let model = SmoSolver::new()
            .train(&linear_params(), &samples, 2)
            .unwrap();
        assert_eq!(model.labels, vec![-1, 1]);
    }

    #[test]
    fn test_multiclass_rbf() {
        let solver = SmoSolver::new();
        let samples = three_blobs();
        let params = SvmParameters {
            gamma: 0.5,
            ..Default::default()
        };
        let model = solver.train(&params, &samples, 2).unwrap();

        assert_eq!(model.labels, vec![7, 3, 5]);
        assert_eq!(model.rho.len(), 3);
        assert_eq!(model.sv_coef.len(), 2);
        model.validate().unwrap();

        for s in &samples {
            let d = solver.predict_decision(&model, &s.features).unwrap();
            assert_eq!(model.labels[d.class_index] as f64, s.label);
            assert_eq!(d.scores.len(), 3);
        }
    }

    #[test]
    fn test_probability_training() {
        let solver = SmoSolver::new();
        let samples = three_blobs();
        let params = SvmParameters {
            gamma: 0.5,
            probability: true,
            ..Default::default()
        };
        let model = solver.train(&params, &samples, 2).unwrap();
        assert!(model.supports_probability());
        assert_eq!(model.prob_a.as_ref().map(Vec::len), Some(3));

        let estimate = solver
            .predict_probability(&model, &SparseVector::from_dense(&[0.0, 4.0]))
            .unwrap();
        assert_eq!(estimate.probabilities.len(), 3);
        assert_relative_eq!(estimate.probabilities.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
        assert!(estimate.probabilities.iter().all(|&p| (0.0..=1.0).contains(&p)));
        assert_eq!(model.labels[estimate.class_index], 7);
    }

    #[test]
    fn test_probability_requires_trained_sigmoids() {
        let solver = SmoSolver::new();
        let model = solver.train(&linear_params(), &blobs(), 2).unwrap();
        assert!(matches!(
            solver.predict_probability(&model, &SparseVector::from_dense(&[1.0, 1.0])),
            Err(SVMError::ProbabilityNotSupported)
        ));
    }

    #[test]
    fn test_training_rejections() {
        let solver = SmoSolver::new();

        let one_class: Vec<Sample> = blobs().into_iter().filter(|s| s.label > 0.0).collect();
        assert!(matches!(
            solver.train(&linear_params(), &one_class, 2),
            Err(SVMError::NotEnoughClasses(1))
        ));

        let nu = SvmParameters {
            machine_type: MachineType::NuSvc,
            ..linear_params()
        };
        assert!(matches!(
            solver.train(&nu, &blobs(), 2),
            Err(SVMError::TrainingError(_))
        ));

        assert!(matches!(
            solver.train(&linear_params(), &blobs(), 1),
            Err(SVMError::DimensionMismatch { .. })
        ));

        let fractional = vec![sample(&[1.0], 0.5), sample(&[2.0], 1.0)];
        assert!(matches!(
            solver.train(&linear_params(), &fractional, 1),
            Err(SVMError::InvalidDataset(_))
        ));
    }

    #[test]
    fn test_iteration_cap_still_yields_model() {
        let solver = SmoSolver::new().with_max_iterations(1);
        assert_eq!(solver.max_iterations(), 1);
        let model = solver.train(&linear_params(), &blobs(), 2).unwrap();
        model.validate().unwrap();
    }
}
