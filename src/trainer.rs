//! Training orchestration
//!
//! A [`Trainer`] takes one 2D array per class, assigns class labels,
//! normalizes and flattens the rows, hands them to its [`Solver`] and wraps
//! the resulting model in a [`Machine`].
//!
//! Label assignment: two groups become `-1` and `+1` (in that order), more
//! groups become `1..=N` in input order.
//!
//! ```rust,no_run
//! use ndarray::array;
//! use svmachine::{KernelType, Trainer};
//!
//! # fn main() -> svmachine::Result<()> {
//! let negatives = array![[0.0, 0.1], [0.2, 0.0]];
//! let positives = array![[1.0, 0.9], [0.8, 1.0]];
//!
//! let machine = Trainer::new()
//!     .with_kernel_type(KernelType::Linear)
//!     .with_cost(10.0)
//!     .train(&[negatives, positives])?;
//! assert_eq!(machine.labels(), &[-1, 1]);
//! # Ok(())
//! # }
//! ```

use crate::core::{KernelType, MachineType, Result, SVMError, Sample, Solver, SparseVector, SvmParameters};
use crate::machine::Machine;
use crate::solver::SmoSolver;
use crate::utils::scaling::Normalization;
use log::{debug, info};
use ndarray::Array2;

/// Builds machines from per-class groups of samples
#[derive(Debug, Clone)]
pub struct Trainer<S: Solver = SmoSolver> {
    params: SvmParameters,
    solver: S,
}

impl Trainer<SmoSolver> {
    /// Trainer with `svm-train` default parameters
    pub fn new() -> Self {
        Self::with_params(SvmParameters::default())
    }

    pub fn with_params(params: SvmParameters) -> Self {
        Self::with_solver(params, SmoSolver::new())
    }
}

impl Default for Trainer<SmoSolver> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Solver + Clone> Trainer<S> {
    pub fn with_solver(params: SvmParameters, solver: S) -> Self {
        Self { params, solver }
    }

    pub fn with_machine_type(mut self, machine_type: MachineType) -> Self {
        self.params.machine_type = machine_type;
        self
    }

    pub fn with_kernel_type(mut self, kernel_type: KernelType) -> Self {
        self.params.kernel_type = kernel_type;
        self
    }

    pub fn with_degree(mut self, degree: i32) -> Self {
        self.params.degree = degree;
        self
    }

    /// Kernel gamma; 0 means `1 / n_features`
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.params.gamma = gamma;
        self
    }

    pub fn with_coef0(mut self, coef0: f64) -> Self {
        self.params.coef0 = coef0;
        self
    }

    /// Kernel cache size in megabytes
    pub fn with_cache_size(mut self, cache_size: f64) -> Self {
        self.params.cache_size = cache_size;
        self
    }

    /// Stopping tolerance
    pub fn with_eps(mut self, eps: f64) -> Self {
        self.params.eps = eps;
        self
    }

    /// Set regularization parameter C
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.params.cost = cost;
        self
    }

    pub fn with_nu(mut self, nu: f64) -> Self {
        self.params.nu = nu;
        self
    }

    pub fn with_loss_epsilon(mut self, loss_epsilon: f64) -> Self {
        self.params.loss_epsilon = loss_epsilon;
        self
    }

    pub fn with_shrinking(mut self, shrinking: bool) -> Self {
        self.params.shrinking = shrinking;
        self
    }

    /// Train Platt sigmoids so machines can output probabilities
    pub fn with_probability(mut self, probability: bool) -> Self {
        self.params.probability = probability;
        self
    }

    pub fn params(&self) -> &SvmParameters {
        &self.params
    }

    pub fn set_params(&mut self, params: SvmParameters) {
        self.params = params;
    }

    pub fn machine_type(&self) -> MachineType {
        self.params.machine_type
    }

    pub fn set_machine_type(&mut self, machine_type: MachineType) {
        self.params.machine_type = machine_type;
    }

    /// Set the machine type by name, e.g. `"C_SVC"` or `"nu_svc"`
    pub fn set_machine_type_str(&mut self, name: &str) -> Result<()> {
        self.params.machine_type = name.parse()?;
        Ok(())
    }

    pub fn kernel_type(&self) -> KernelType {
        self.params.kernel_type
    }

    pub fn set_kernel_type(&mut self, kernel_type: KernelType) {
        self.params.kernel_type = kernel_type;
    }

    /// Set the kernel type by name, e.g. `"RBF"` or `"polynomial"`
    pub fn set_kernel_type_str(&mut self, name: &str) -> Result<()> {
        self.params.kernel_type = name.parse()?;
        Ok(())
    }

    pub fn degree(&self) -> i32 {
        self.params.degree
    }

    pub fn set_degree(&mut self, degree: i32) {
        self.params.degree = degree;
    }

    pub fn gamma(&self) -> f64 {
        self.params.gamma
    }

    pub fn set_gamma(&mut self, gamma: f64) {
        self.params.gamma = gamma;
    }

    pub fn coef0(&self) -> f64 {
        self.params.coef0
    }

    pub fn set_coef0(&mut self, coef0: f64) {
        self.params.coef0 = coef0;
    }

    pub fn cache_size(&self) -> f64 {
        self.params.cache_size
    }

    pub fn set_cache_size(&mut self, cache_size: f64) {
        self.params.cache_size = cache_size;
    }

    pub fn eps(&self) -> f64 {
        self.params.eps
    }

    pub fn set_eps(&mut self, eps: f64) {
        self.params.eps = eps;
    }

    pub fn cost(&self) -> f64 {
        self.params.cost
    }

    pub fn set_cost(&mut self, cost: f64) {
        self.params.cost = cost;
    }

    pub fn nu(&self) -> f64 {
        self.params.nu
    }

    pub fn set_nu(&mut self, nu: f64) {
        self.params.nu = nu;
    }

    pub fn loss_epsilon(&self) -> f64 {
        self.params.loss_epsilon
    }

    pub fn set_loss_epsilon(&mut self, loss_epsilon: f64) {
        self.params.loss_epsilon = loss_epsilon;
    }

    pub fn shrinking(&self) -> bool {
        self.params.shrinking
    }

    pub fn set_shrinking(&mut self, shrinking: bool) {
        self.params.shrinking = shrinking;
    }

    pub fn probability(&self) -> bool {
        self.params.probability
    }

    pub fn set_probability(&mut self, probability: bool) {
        self.params.probability = probability;
    }

    /// Train on one array per class, without normalization
    pub fn train(&self, groups: &[Array2<f64>]) -> Result<Machine<S>> {
        self.train_with(groups, None, None)
    }

    /// Train on one array per class, normalizing every row with
    /// `(x - subtract) / divide`
    pub fn train_normalized(
        &self,
        groups: &[Array2<f64>],
        subtract: &[f64],
        divide: &[f64],
    ) -> Result<Machine<S>> {
        self.train_with(groups, Some(subtract), Some(divide))
    }

    /// Train with optional normalization; `subtract` and `divide` must be
    /// given together
    pub fn train_with(
        &self,
        groups: &[Array2<f64>],
        subtract: Option<&[f64]>,
        divide: Option<&[f64]>,
    ) -> Result<Machine<S>> {
        if !self.params.machine_type.is_classification() {
            return Err(SVMError::UnsupportedMachineType(
                self.params.machine_type.to_string(),
            ));
        }
        if groups.len() < 2 {
            return Err(SVMError::NotEnoughClasses(groups.len()));
        }
        let policy = match (subtract, divide) {
            (Some(subtract), Some(divide)) => Some((subtract, divide)),
            (None, None) => None,
            (Some(_), None) => {
                return Err(SVMError::MissingNormalization {
                    provided: "subtract",
                })
            }
            (None, Some(_)) => {
                return Err(SVMError::MissingNormalization { provided: "divide" })
            }
        };
        self.params.validate()?;

        let n_features = groups[0].ncols();
        for (i, group) in groups.iter().enumerate() {
            if group.nrows() == 0 {
                return Err(SVMError::InvalidDataset(format!("Class group {i} is empty")));
            }
            if group.ncols() != n_features {
                return Err(SVMError::DimensionMismatch {
                    expected: n_features,
                    actual: group.ncols(),
                });
            }
        }
        if n_features == 0 {
            return Err(SVMError::InvalidDataset(
                "Training samples have no features".to_string(),
            ));
        }

        let normalization = match policy {
            Some((subtract, divide)) => {
                let normalization = Normalization::new(subtract.to_vec(), divide.to_vec())?;
                if normalization.input_size() != n_features {
                    return Err(SVMError::DimensionMismatch {
                        expected: n_features,
                        actual: normalization.input_size(),
                    });
                }
                normalization
            }
            None => Normalization::identity(n_features),
        };

        let labels = assign_labels(groups.len());
        let mut samples = Vec::with_capacity(groups.iter().map(|g| g.nrows()).sum());
        for (group, &label) in groups.iter().zip(&labels) {
            for row in group.rows() {
                let scaled = normalization.apply(&row.to_vec())?;
                samples.push(Sample::new(SparseVector::from_dense(&scaled), label as f64));
            }
        }

        let mut params = self.params.clone();
        if params.gamma == 0.0 {
            params.gamma = 1.0 / n_features as f64;
            debug!("Using gamma = 1/{} = {}", n_features, params.gamma);
        }

        info!(
            "Training {} machine with {} kernel on {} samples in {} classes",
            params.machine_type,
            params.kernel_type,
            samples.len(),
            groups.len()
        );

        let model = self
            .solver
            .train(&params, &samples, n_features)
            .map_err(|e| match e {
                SVMError::TrainingError(_) => e,
                other => SVMError::TrainingError(other.to_string()),
            })?;

        if model.labels != labels {
            return Err(SVMError::TrainingError(format!(
                "Solver returned classes {:?}, expected {:?}",
                model.labels, labels
            )));
        }

        let machine = Machine::with_solver(model, normalization, self.solver.clone())
            .map_err(|e| SVMError::TrainingError(e.to_string()))?
            .with_training_params(params);

        info!(
            "Trained machine with {} support vectors",
            machine.n_support_vectors()
        );
        Ok(machine)
    }
}

/// `[-1, +1]` for two classes, `1..=N` otherwise
fn assign_labels(n_groups: usize) -> Vec<i64> {
    if n_groups == 2 {
        vec![-1, 1]
    } else {
        (1..=n_groups as i64).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn groups() -> Vec<Array2<f64>> {
        vec![
            array![[-2.0, -2.0], [-2.5, -1.5], [-1.5, -2.5]],
            array![[2.0, 2.0], [2.5, 1.5], [1.5, 2.5]],
        ]
    }

    #[test]
    fn test_assign_labels() {
        assert_eq!(assign_labels(2), vec![-1, 1]);
        assert_eq!(assign_labels(3), vec![1, 2, 3]);
        assert_eq!(assign_labels(4), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_builder_and_accessors() {
        let mut trainer = Trainer::new()
            .with_kernel_type(KernelType::Polynomial)
            .with_degree(2)
            .with_cost(10.0)
            .with_probability(true);

        assert_eq!(trainer.kernel_type(), KernelType::Polynomial);
        assert_eq!(trainer.degree(), 2);
        assert_eq!(trainer.cost(), 10.0);
        assert!(trainer.probability());
        assert_eq!(trainer.cache_size(), 100.0);

        trainer.set_machine_type_str("nu_svc").unwrap();
        assert_eq!(trainer.machine_type(), MachineType::NuSvc);
        trainer.set_kernel_type_str("RBF").unwrap();
        assert_eq!(trainer.kernel_type(), KernelType::Rbf);

        assert!(matches!(
            trainer.set_kernel_type_str("quadratic"),
            Err(SVMError::UnknownKernelType(_))
        ));
        assert!(matches!(
            trainer.set_machine_type_str("C_SVX"),
            Err(SVMError::UnknownMachineType(_))
        ));
        // a failed string setter leaves the value alone
        assert_eq!(trainer.kernel_type(), KernelType::Rbf);
    }

    #[test]
    fn test_train_binary() {
        let trainer = Trainer::new().with_kernel_type(KernelType::Linear);
        let machine = trainer.train(&groups()).unwrap();

        assert_eq!(machine.labels(), &[-1, 1]);
        assert_eq!(machine.shape(), (2, 1));
        assert_eq!(machine.predict_class(&[-3.0, -2.0]).unwrap(), -1);
        assert_eq!(machine.predict_class(&[3.0, 2.0]).unwrap(), 1);
        assert_eq!(
            machine.training_params().map(|p| p.kernel_type),
            Some(KernelType::Linear)
        );
    }

    #[test]
    fn test_gamma_zero_resolves_to_inverse_feature_count() {
        let machine = Trainer::new().train(&groups()).unwrap();
        assert_eq!(machine.gamma(), 0.5);
        assert_eq!(machine.training_params().map(|p| p.gamma), Some(0.5));
    }

    #[test]
    fn test_train_normalized_records_policy() {
        let machine = Trainer::new()
            .with_kernel_type(KernelType::Linear)
            .train_normalized(&groups(), &[1.0, 1.0], &[2.0, 2.0])
            .unwrap();

        assert_eq!(machine.input_subtract(), &[1.0, 1.0]);
        assert_eq!(machine.input_divide(), &[2.0, 2.0]);
        assert_eq!(machine.predict_class(&[3.0, 2.0]).unwrap(), 1);
    }

    #[test]
    fn test_configuration_errors() {
        let trainer = Trainer::new();

        assert!(matches!(
            trainer.train(&groups()[..1]),
            Err(SVMError::NotEnoughClasses(1))
        ));
        assert!(matches!(
            trainer.train_with(&groups(), Some(&[0.0, 0.0]), None),
            Err(SVMError::MissingNormalization {
                provided: "subtract"
            })
        ));
        assert!(matches!(
            trainer.train_with(&groups(), None, Some(&[1.0, 1.0])),
            Err(SVMError::MissingNormalization { provided: "divide" })
        ));
        assert!(matches!(
            trainer.train_normalized(&groups(), &[0.0], &[1.0]),
            Err(SVMError::DimensionMismatch { .. })
        ));

        let regression = Trainer::new().with_machine_type(MachineType::EpsilonSvr);
        assert!(matches!(
            regression.train(&groups()),
            Err(SVMError::UnsupportedMachineType(_))
        ));

        let bad_cost = Trainer::new().with_cost(-1.0);
        assert!(matches!(
            bad_cost.train(&groups()),
            Err(SVMError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_malformed_groups() {
        let trainer = Trainer::new();

        let mut ragged = groups();
        ragged.push(array![[1.0, 2.0, 3.0]]);
        assert!(matches!(
            trainer.train(&ragged),
            Err(SVMError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));

        let mut with_empty = groups();
        with_empty.push(Array2::zeros((0, 2)));
        assert!(matches!(
            trainer.train(&with_empty),
            Err(SVMError::InvalidDataset(_))
        ));
    }

    #[test]
    fn test_solver_rejection_is_training_error() {
        let trainer = Trainer::new().with_machine_type(MachineType::NuSvc);
        assert!(matches!(
            trainer.train(&groups()),
            Err(SVMError::TrainingError(_))
        ));
    }
}
