//! Trained model representation

use crate::core::{MachineType, Result, SVMError, SparseVector};
use crate::kernel::KernelParams;
use crate::utils::n_pairwise_scores;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A trained one-vs-one SVM model
///
/// Layout follows LIBSVM: support vectors are grouped by class in `labels`
/// order, `n_sv[c]` of them for class `c`, and `sv_coef` holds
/// `n_classes - 1` coefficient rows with one entry per support vector.
/// Pairwise quantities (`rho`, `prob_a`, `prob_b`) are ordered
/// `(0,1), (0,2), ..., (1,2), ...`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvmModel {
    pub machine_type: MachineType,
    pub kernel: KernelParams,
    /// Dimensionality of the feature space the model was trained in
    pub n_features: usize,
    /// Class labels in model order
    pub labels: Vec<i64>,
    /// Pairwise bias terms
    pub rho: Vec<f64>,
    /// Pairwise Platt sigmoid parameters, present when probability
    /// estimates were trained
    pub prob_a: Option<Vec<f64>>,
    pub prob_b: Option<Vec<f64>>,
    /// Number of support vectors per class
    pub n_sv: Vec<usize>,
    pub sv_coef: Vec<Vec<f64>>,
    pub support_vectors: Vec<SparseVector>,
}

impl SvmModel {
    pub fn n_classes(&self) -> usize {
        self.labels.len()
    }

    pub fn total_sv(&self) -> usize {
        self.support_vectors.len()
    }

    /// Number of decision values produced per input
    pub fn n_pairwise(&self) -> usize {
        n_pairwise_scores(self.n_classes())
    }

    pub fn supports_probability(&self) -> bool {
        self.prob_a.is_some() && self.prob_b.is_some()
    }

    /// Index of the first support vector of each class
    pub fn sv_starts(&self) -> Vec<usize> {
        let mut starts = Vec::with_capacity(self.n_sv.len());
        let mut acc = 0;
        for &n in &self.n_sv {
            starts.push(acc);
            acc += n;
        }
        starts
    }

    /// Check that all arrays agree with the class and support vector counts
    pub fn validate(&self) -> Result<()> {
        let n_classes = self.n_classes();
        if n_classes < 2 {
            return Err(SVMError::InvalidModel(format!(
                "Classification models need at least two classes, got {n_classes}"
            )));
        }

        let n_pairs = self.n_pairwise();
        check_count("rho", n_pairs, self.rho.len())?;
        check_count("nr_sv", n_classes, self.n_sv.len())?;

        let declared: usize = self.n_sv.iter().sum();
        check_count("support vectors", declared, self.total_sv())?;
        check_count("sv_coef rows", n_classes - 1, self.sv_coef.len())?;
        for row in &self.sv_coef {
            check_count("sv_coef entries", self.total_sv(), row.len())?;
        }

        match (&self.prob_a, &self.prob_b) {
            (Some(a), Some(b)) => {
                check_count("probA", n_pairs, a.len())?;
                check_count("probB", n_pairs, b.len())?;
            }
            (None, None) => {}
            _ => {
                return Err(SVMError::InvalidModel(
                    "probA and probB must be given together".to_string(),
                ))
            }
        }

        if self.total_sv() == 0 {
            return Err(SVMError::InvalidModel(
                "Model has no support vectors".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(n_classes);
        if let Some(label) = self.labels.iter().find(|&&label| !seen.insert(label)) {
            return Err(SVMError::InvalidModel(format!("Duplicate class label {label}")));
        }

        for (i, sv) in self.support_vectors.iter().enumerate() {
            self.check_support_vector(i, sv)?;
        }

        Ok(())
    }

    /// Indices strictly increasing, one value each, all inside the input
    fn check_support_vector(&self, i: usize, sv: &SparseVector) -> Result<()> {
        if sv.indices.len() != sv.values.len() {
            return Err(SVMError::InvalidModel(format!(
                "Support vector {i} has {} indices but {} values",
                sv.indices.len(),
                sv.values.len()
            )));
        }
        if sv.indices.windows(2).any(|w| w[0] >= w[1]) {
            return Err(SVMError::InvalidModel(format!(
                "Support vector {i} indices are not strictly increasing"
            )));
        }
        if let Some(index) = sv.indices.iter().find(|&&index| index >= self.n_features) {
            return Err(SVMError::InvalidModel(format!(
                "Support vector {i} index {} exceeds input size {}",
                index + 1,
                self.n_features
            )));
        }
        Ok(())
    }
}

fn check_count(what: &str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(SVMError::InvalidModel(format!(
            "Expected {expected} {what}, found {actual}"
        )));
    }
    Ok(())
}
