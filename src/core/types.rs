//! Core type definitions shared by machines, trainers and solvers

use crate::core::{Result, SVMError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sparse vector representation with sorted indices
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    /// Sorted, 0-based indices of stored elements
    pub indices: Vec<usize>,
    /// Values corresponding to indices
    pub values: Vec<f64>,
}

impl SparseVector {
    /// Create a new sparse vector, ensuring indices are sorted
    pub fn new(indices: Vec<usize>, values: Vec<f64>) -> Self {
        assert_eq!(
            indices.len(),
            values.len(),
            "Indices and values must have same length"
        );

        let mut pairs: Vec<_> = indices.into_iter().zip(values).collect();
        pairs.sort_by_key(|&(idx, _)| idx);

        let (indices, values): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        Self { indices, values }
    }

    /// Build from a dense slice, suppressing zeros
    pub fn from_dense(values: &[f64]) -> Self {
        let (indices, values) = values
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v != 0.0)
            .map(|(i, &v)| (i, v))
            .unzip();
        Self { indices, values }
    }

    /// Create an empty sparse vector
    pub fn empty() -> Self {
        Self {
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Get the value at a specific index (0 if not present)
    pub fn get(&self, index: usize) -> f64 {
        match self.indices.binary_search(&index) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    /// Expand into a dense vector of the given length; indices past `len` are dropped
    pub fn to_dense(&self, len: usize) -> Vec<f64> {
        let mut dense = vec![0.0; len];
        for (&i, &v) in self.indices.iter().zip(&self.values) {
            if i < len {
                dense[i] = v;
            }
        }
        dense
    }

    /// Largest stored index, if any
    pub fn max_index(&self) -> Option<usize> {
        self.indices.last().copied()
    }

    /// Compute squared L2 norm
    pub fn norm_squared(&self) -> f64 {
        self.values.iter().map(|&v| v * v).sum()
    }

    /// Number of stored elements
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Training sample with features and solver label
#[derive(Clone, Debug)]
pub struct Sample {
    pub features: SparseVector,
    pub label: f64,
}

impl Sample {
    pub fn new(features: SparseVector, label: f64) -> Self {
        Self { features, label }
    }
}

/// SVM formulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MachineType {
    #[serde(rename = "C_SVC")]
    CSvc,
    #[serde(rename = "NU_SVC")]
    NuSvc,
    #[serde(rename = "ONE_CLASS")]
    OneClass,
    #[serde(rename = "EPSILON_SVR")]
    EpsilonSvr,
    #[serde(rename = "NU_SVR")]
    NuSvr,
}

// (variant, user-facing name, LIBSVM model file name)
const MACHINE_TYPE_NAMES: [(MachineType, &str, &str); 5] = [
    (MachineType::CSvc, "C_SVC", "c_svc"),
    (MachineType::NuSvc, "NU_SVC", "nu_svc"),
    (MachineType::OneClass, "ONE_CLASS", "one_class"),
    (MachineType::EpsilonSvr, "EPSILON_SVR", "epsilon_svr"),
    (MachineType::NuSvr, "NU_SVR", "nu_svr"),
];

impl MachineType {
    pub fn as_str(&self) -> &'static str {
        MACHINE_TYPE_NAMES
            .iter()
            .find(|(t, _, _)| t == self)
            .map_or("C_SVC", |(_, name, _)| name)
    }

    /// Name used by the LIBSVM text model format
    pub fn libsvm_name(&self) -> &'static str {
        MACHINE_TYPE_NAMES
            .iter()
            .find(|(t, _, _)| t == self)
            .map_or("c_svc", |(_, _, file_name)| file_name)
    }

    /// Whether machines of this type output class labels
    pub fn is_classification(&self) -> bool {
        matches!(self, MachineType::CSvc | MachineType::NuSvc)
    }
}

impl FromStr for MachineType {
    type Err = SVMError;

    fn from_str(s: &str) -> Result<Self> {
        MACHINE_TYPE_NAMES
            .iter()
            .find(|(_, name, file_name)| {
                s.eq_ignore_ascii_case(name) || s.eq_ignore_ascii_case(file_name)
            })
            .map(|(t, _, _)| *t)
            .ok_or_else(|| SVMError::UnknownMachineType(s.to_string()))
    }
}

impl fmt::Display for MachineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kernel family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KernelType {
    #[serde(rename = "LINEAR")]
    Linear,
    #[serde(rename = "POLY")]
    Polynomial,
    #[serde(rename = "RBF")]
    Rbf,
    #[serde(rename = "SIGMOID")]
    Sigmoid,
    #[serde(rename = "PRECOMPUTED")]
    Precomputed,
}

const KERNEL_TYPE_NAMES: [(KernelType, &str, &str); 5] = [
    (KernelType::Linear, "LINEAR", "linear"),
    (KernelType::Polynomial, "POLY", "polynomial"),
    (KernelType::Rbf, "RBF", "rbf"),
    (KernelType::Sigmoid, "SIGMOID", "sigmoid"),
    (KernelType::Precomputed, "PRECOMPUTED", "precomputed"),
];

impl KernelType {
    pub fn as_str(&self) -> &'static str {
        KERNEL_TYPE_NAMES
            .iter()
            .find(|(t, _, _)| t == self)
            .map_or("RBF", |(_, name, _)| name)
    }

    /// Name used by the LIBSVM text model format
    pub fn libsvm_name(&self) -> &'static str {
        KERNEL_TYPE_NAMES
            .iter()
            .find(|(t, _, _)| t == self)
            .map_or("rbf", |(_, _, file_name)| file_name)
    }

    pub fn uses_degree(&self) -> bool {
        matches!(self, KernelType::Polynomial)
    }

    pub fn uses_gamma(&self) -> bool {
        matches!(
            self,
            KernelType::Polynomial | KernelType::Rbf | KernelType::Sigmoid
        )
    }

    pub fn uses_coef0(&self) -> bool {
        matches!(self, KernelType::Polynomial | KernelType::Sigmoid)
    }
}

impl FromStr for KernelType {
    type Err = SVMError;

    fn from_str(s: &str) -> Result<Self> {
        KERNEL_TYPE_NAMES
            .iter()
            .find(|(_, name, file_name)| {
                s.eq_ignore_ascii_case(name) || s.eq_ignore_ascii_case(file_name)
            })
            .map(|(t, _, _)| *t)
            .ok_or_else(|| SVMError::UnknownKernelType(s.to_string()))
    }
}

impl fmt::Display for KernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Solver and kernel parametrization
///
/// Defaults follow the `svm-train` command line utility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvmParameters {
    pub machine_type: MachineType,
    pub kernel_type: KernelType,
    /// Polynomial degree
    pub degree: i32,
    /// Kernel gamma; 0 means `1 / n_features` at training time
    pub gamma: f64,
    pub coef0: f64,
    /// Kernel cache size in megabytes
    pub cache_size: f64,
    /// Stopping tolerance
    pub eps: f64,
    /// Penalty cost C
    pub cost: f64,
    pub nu: f64,
    /// Epsilon of the epsilon-SVR loss function
    pub loss_epsilon: f64,
    pub shrinking: bool,
    pub probability: bool,
}

impl Default for SvmParameters {
    fn default() -> Self {
        Self {
            machine_type: MachineType::CSvc,
            kernel_type: KernelType::Rbf,
            degree: 3,
            gamma: 0.0,
            coef0: 0.0,
            cache_size: 100.0,
            eps: 1e-3,
            cost: 1.0,
            nu: 0.5,
            loss_epsilon: 0.1,
            shrinking: true,
            probability: false,
        }
    }
}

impl SvmParameters {
    /// Reject values no solver can work with
    pub fn validate(&self) -> Result<()> {
        fn invalid(message: String) -> Result<()> {
            Err(SVMError::InvalidParameter(message))
        }

        if !(self.cost > 0.0) {
            return invalid(format!("cost must be positive, got {}", self.cost));
        }
        if !(self.eps > 0.0) {
            return invalid(format!("eps must be positive, got {}", self.eps));
        }
        if !(self.cache_size > 0.0) {
            return invalid(format!("cache_size must be positive, got {}", self.cache_size));
        }
        if !(self.nu > 0.0 && self.nu <= 1.0) {
            return invalid(format!("nu must lie in (0, 1], got {}", self.nu));
        }
        if !(self.loss_epsilon >= 0.0) {
            return invalid(format!(
                "loss_epsilon must not be negative, got {}",
                self.loss_epsilon
            ));
        }
        if !(self.gamma >= 0.0 && self.gamma.is_finite()) {
            return invalid(format!("gamma must be finite and >= 0, got {}", self.gamma));
        }
        if self.kernel_type.uses_degree() && self.degree < 0 {
            return invalid(format!("degree must not be negative, got {}", self.degree));
        }
        Ok(())
    }
}

/// Class index and one-vs-one decision values for a single input
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub class_index: usize,
    pub scores: Vec<f64>,
}

/// Class index and per-class probabilities for a single input
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityEstimate {
    pub class_index: usize,
    pub probabilities: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_vector_creation() {
        let sv = SparseVector::new(vec![2, 0, 4], vec![2.0, 1.0, 3.0]);

        assert_eq!(sv.indices, vec![0, 2, 4]);
        assert_eq!(sv.values, vec![1.0, 2.0, 3.0]);
        assert_eq!(sv.max_index(), Some(4));
    }

    #[test]
    fn test_sparse_vector_dense_conversions() {
        let sv = SparseVector::from_dense(&[0.0, 1.5, 0.0, -2.0]);
        assert_eq!(sv.indices, vec![1, 3]);
        assert_eq!(sv.values, vec![1.5, -2.0]);
        assert_eq!(sv.get(0), 0.0);
        assert_eq!(sv.get(3), -2.0);
        assert_eq!(sv.to_dense(5), vec![0.0, 1.5, 0.0, -2.0, 0.0]);
        assert_eq!(sv.norm_squared(), 6.25);

        let empty = SparseVector::from_dense(&[0.0, 0.0]);
        assert!(empty.is_empty());
        assert_eq!(empty.max_index(), None);
    }

    #[test]
    #[should_panic(expected = "Indices and values must have same length")]
    fn test_sparse_vector_length_mismatch() {
        SparseVector::new(vec![0, 1], vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_machine_type_names() {
        for t in [
            MachineType::CSvc,
            MachineType::NuSvc,
            MachineType::OneClass,
            MachineType::EpsilonSvr,
            MachineType::NuSvr,
        ] {
            assert_eq!(t.as_str().parse::<MachineType>().unwrap(), t);
            assert_eq!(t.libsvm_name().parse::<MachineType>().unwrap(), t);
        }
        assert_eq!("c_svc".parse::<MachineType>().unwrap(), MachineType::CSvc);
        assert!(MachineType::NuSvc.is_classification());
        assert!(!MachineType::NuSvr.is_classification());
        assert!(matches!(
            "SVM_X".parse::<MachineType>(),
            Err(SVMError::UnknownMachineType(_))
        ));
    }

    #[test]
    fn test_kernel_type_names() {
        assert_eq!("POLY".parse::<KernelType>().unwrap(), KernelType::Polynomial);
        assert_eq!(
            "polynomial".parse::<KernelType>().unwrap(),
            KernelType::Polynomial
        );
        assert_eq!("rbf".parse::<KernelType>().unwrap(), KernelType::Rbf);
        assert_eq!(KernelType::Sigmoid.to_string(), "SIGMOID");
        assert_eq!(KernelType::Polynomial.libsvm_name(), "polynomial");
        assert!(matches!(
            "gaussian".parse::<KernelType>(),
            Err(SVMError::UnknownKernelType(_))
        ));
    }

    #[test]
    fn test_svm_parameters_default() {
        let params = SvmParameters::default();
        assert_eq!(params.machine_type, MachineType::CSvc);
        assert_eq!(params.kernel_type, KernelType::Rbf);
        assert_eq!(params.degree, 3);
        assert_eq!(params.gamma, 0.0);
        assert_eq!(params.cache_size, 100.0);
        assert_eq!(params.eps, 0.001);
        assert_eq!(params.cost, 1.0);
        assert!(params.shrinking);
        assert!(!params.probability);
    }

    #[test]
    fn test_svm_parameters_validate() {
        SvmParameters::default().validate().unwrap();

        let bad = [
            SvmParameters {
                cost: 0.0,
                ..Default::default()
            },
            SvmParameters {
                eps: -1.0,
                ..Default::default()
            },
            SvmParameters {
                nu: 1.5,
                ..Default::default()
            },
            SvmParameters {
                gamma: f64::NAN,
                ..Default::default()
            },
            SvmParameters {
                kernel_type: KernelType::Polynomial,
                degree: -2,
                ..Default::default()
            },
        ];
        for params in bad {
            assert!(matches!(
                params.validate(),
                Err(SVMError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_svm_parameters_from_partial_json() {
        let params: SvmParameters =
            serde_json::from_str(r#"{"kernel_type": "LINEAR", "cost": 10.0}"#).unwrap();
        assert_eq!(params.kernel_type, KernelType::Linear);
        assert_eq!(params.cost, 10.0);
        assert_eq!(params.eps, 0.001);
    }
}
