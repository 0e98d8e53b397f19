//! One-vs-one decision function and voting

use crate::core::{Decision, SparseVector};
use crate::kernel::Kernel;
use crate::solver::SvmModel;

/// Evaluate every pairwise classifier of `model` on `x` and vote
///
/// Pair `(i, j)` votes for `i` when its decision value is positive and for
/// `j` otherwise. The winning index is the first class with the most votes.
pub fn decision_values(model: &SvmModel, kernel: &dyn Kernel, x: &SparseVector) -> Decision {
    let x_norm = x.norm_squared();
    let kvalue: Vec<f64> = model
        .support_vectors
        .iter()
        .map(|sv| kernel.compute_with_norms(x, sv, x_norm, sv.norm_squared()))
        .collect();

    let n_classes = model.n_classes();
    let starts = model.sv_starts();
    let mut votes = vec![0usize; n_classes];
    let mut scores = Vec::with_capacity(model.n_pairwise());

    let mut p = 0;
    for i in 0..n_classes {
        for j in (i + 1)..n_classes {
            let (si, sj) = (starts[i], starts[j]);
            let (ci, cj) = (model.n_sv[i], model.n_sv[j]);
            let coef1 = &model.sv_coef[j - 1];
            let coef2 = &model.sv_coef[i];

            let sum: f64 = (si..si + ci).map(|k| coef1[k] * kvalue[k]).sum::<f64>()
                + (sj..sj + cj).map(|k| coef2[k] * kvalue[k]).sum::<f64>();
            let dec = sum - model.rho[p];

            if dec > 0.0 {
                votes[i] += 1;
            } else {
                votes[j] += 1;
            }
            scores.push(dec);
            p += 1;
        }
    }

    Decision {
        class_index: first_argmax(&votes),
        scores,
    }
}

/// Position of the first maximum; 0 for an empty slice
pub(crate) fn first_argmax<T: PartialOrd + Copy>(values: &[T]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::KernelType;
    use crate::kernel::KernelParams;
    use crate::solver::model::tests::linear_binary_model;
    use approx::assert_relative_eq;

    fn linear() -> Box<dyn Kernel> {
        linear_binary_model().kernel.build().unwrap()
    }

    #[test]
    fn test_binary_decision_sign() {
        let model = linear_binary_model();
        let kernel = linear();

        let d = decision_values(&model, kernel.as_ref(), &SparseVector::from_dense(&[3.0, 1.0]));
        assert_eq!(d.class_index, 0);
        assert_relative_eq!(d.scores[0], 1.0);

        let d = decision_values(&model, kernel.as_ref(), &SparseVector::from_dense(&[0.0, 2.0]));
        assert_eq!(d.class_index, 1);
        assert_relative_eq!(d.scores[0], -1.0);

        // a zero decision value goes to the second class of the pair
        let d = decision_values(&model, kernel.as_ref(), &SparseVector::empty());
        assert_eq!(d.class_index, 1);
    }

    #[test]
    fn test_three_class_voting() {
        // one support vector per class on the axes of a 3-d space
        let model = SvmModel {
            machine_type: crate::core::MachineType::CSvc,
            kernel: KernelParams {
                kernel_type: KernelType::Linear,
                degree: 3,
                gamma: 0.0,
                coef0: 0.0,
            },
            n_features: 3,
            labels: vec![1, 2, 3],
            rho: vec![0.0, 0.0, 0.0],
            prob_a: None,
            prob_b: None,
            n_sv: vec![1, 1, 1],
            // pair (i, j) decides on x_i - x_j
            sv_coef: vec![vec![1.0, -1.0, -1.0], vec![1.0, 1.0, -1.0]],
            support_vectors: vec![
                SparseVector::new(vec![0], vec![1.0]),
                SparseVector::new(vec![1], vec![1.0]),
                SparseVector::new(vec![2], vec![1.0]),
            ],
        };
        model.validate().unwrap();
        let kernel = model.kernel.build().unwrap();

        for (x, expected) in [([2.0, 0.0, 0.0], 0), ([0.0, 2.0, 0.0], 1), ([0.0, 0.0, 2.0], 2)] {
            let d = decision_values(&model, kernel.as_ref(), &SparseVector::from_dense(&x));
            assert_eq!(d.class_index, expected, "input {x:?}");
            assert_eq!(d.scores.len(), 3);
        }
    }

    #[test]
    fn test_first_argmax_prefers_lowest_index() {
        assert_eq!(first_argmax(&[1, 3, 3]), 1);
        assert_eq!(first_argmax(&[2, 2, 2]), 0);
        assert_eq!(first_argmax::<usize>(&[]), 0);
    }
}
