//! Multi-class classification machine
//!
//! A [`Machine`] couples a trained [`SvmModel`] with the input
//! [`Normalization`] applied before every call into the solver, and exposes
//! class, score and probability predictions for single inputs and batches.
//!
//! ```rust,no_run
//! use svmachine::{Machine, ModelFormat};
//!
//! # fn main() -> svmachine::Result<()> {
//! let machine = Machine::from_model_file("heart.model")?;
//! let label = machine.predict_class(&[0.5; 13])?;
//! println!("{} -> {label}", machine.n_classes());
//! machine.save("heart.json", ModelFormat::State)?;
//! # Ok(())
//! # }
//! ```

use crate::core::{
    Decision, KernelType, MachineType, ProbabilityEstimate, Result, SVMError, Solver,
    SparseVector, SvmParameters,
};
use crate::persistence::{load_model, save_model, MachineState, ModelFormat};
use crate::solver::{SmoSolver, SvmModel};
use crate::utils::n_pairwise_scores;
use crate::utils::scaling::Normalization;
use log::{debug, warn};
use ndarray::{Array2, ArrayView2};
use std::path::Path;

/// Trained classifier with its input normalization
#[derive(Debug, Clone)]
pub struct Machine<S: Solver = SmoSolver> {
    model: SvmModel,
    normalization: Normalization,
    solver: S,
    training_params: Option<SvmParameters>,
}

impl Machine<SmoSolver> {
    /// Load a LIBSVM model file; normalization is the identity since the
    /// format does not record one
    pub fn from_model_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let model = load_model(path)?;
        let normalization = Normalization::identity(model.n_features);
        Self::with_solver(model, normalization, SmoSolver::new())
    }

    /// Load a state container written by [`Machine::save`] with
    /// [`ModelFormat::State`]
    pub fn from_state_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_state(MachineState::load_from_file(path)?)
    }

    pub fn from_state(state: MachineState) -> Result<Self> {
        let normalization = state.normalization()?;
        let mut machine = Self::with_solver(state.model, normalization, SmoSolver::new())?;
        machine.training_params = state.training_params;
        Ok(machine)
    }

    pub fn new(model: SvmModel, normalization: Normalization) -> Result<Self> {
        Self::with_solver(model, normalization, SmoSolver::new())
    }
}

impl<S: Solver> Machine<S> {
    /// Wrap `model`, evaluated through `solver`
    ///
    /// Fails unless the model is a consistent classification model whose
    /// input size matches `normalization`.
    pub fn with_solver(model: SvmModel, normalization: Normalization, solver: S) -> Result<Self> {
        if !model.machine_type.is_classification() {
            return Err(SVMError::UnsupportedMachineType(
                model.machine_type.to_string(),
            ));
        }
        if model.kernel.kernel_type == KernelType::Precomputed {
            return Err(SVMError::UnsupportedKernelType(
                model.kernel.kernel_type.to_string(),
            ));
        }
        model.validate()?;
        model.kernel.build()?;

        if normalization.input_size() != model.n_features {
            return Err(SVMError::DimensionMismatch {
                expected: model.n_features,
                actual: normalization.input_size(),
            });
        }

        debug!(
            "Machine ready: {} classes, {} support vectors, input size {}",
            model.n_classes(),
            model.total_sv(),
            model.n_features
        );

        Ok(Self {
            model,
            normalization,
            solver,
            training_params: None,
        })
    }

    pub(crate) fn with_training_params(mut self, params: SvmParameters) -> Self {
        self.training_params = Some(params);
        self
    }

    pub fn input_size(&self) -> usize {
        self.model.n_features
    }

    /// 1 for binary machines, the number of classes otherwise
    pub fn output_size(&self) -> usize {
        match self.n_classes() {
            2 => 1,
            n => n,
        }
    }

    /// `(input_size, output_size)`
    pub fn shape(&self) -> (usize, usize) {
        (self.input_size(), self.output_size())
    }

    pub fn n_classes(&self) -> usize {
        self.model.n_classes()
    }

    /// Class labels; position `i` is the label of class index `i`
    pub fn labels(&self) -> &[i64] {
        &self.model.labels
    }

    pub fn machine_type(&self) -> MachineType {
        self.model.machine_type
    }

    pub fn kernel_type(&self) -> KernelType {
        self.model.kernel.kernel_type
    }

    pub fn degree(&self) -> i32 {
        self.model.kernel.degree
    }

    pub fn gamma(&self) -> f64 {
        self.model.kernel.gamma
    }

    pub fn coef0(&self) -> f64 {
        self.model.kernel.coef0
    }

    pub fn supports_probability(&self) -> bool {
        self.model.supports_probability()
    }

    /// Number of pairwise scores per input
    pub fn n_scores(&self) -> usize {
        n_pairwise_scores(self.n_classes())
    }

    pub fn n_support_vectors(&self) -> usize {
        self.model.total_sv()
    }

    pub fn model(&self) -> &SvmModel {
        &self.model
    }

    /// Parameters the machine was trained with, when known
    pub fn training_params(&self) -> Option<&SvmParameters> {
        self.training_params.as_ref()
    }

    pub fn normalization(&self) -> &Normalization {
        &self.normalization
    }

    pub fn input_subtract(&self) -> &[f64] {
        self.normalization.subtract()
    }

    pub fn input_divide(&self) -> &[f64] {
        self.normalization.divide()
    }

    pub fn set_input_subtract(&mut self, subtract: Vec<f64>) -> Result<()> {
        self.normalization.set_subtract(subtract)
    }

    pub fn set_input_divide(&mut self, divide: Vec<f64>) -> Result<()> {
        self.normalization.set_divide(divide)
    }

    pub fn set_normalization(&mut self, normalization: Normalization) -> Result<()> {
        if normalization.input_size() != self.input_size() {
            return Err(SVMError::DimensionMismatch {
                expected: self.input_size(),
                actual: normalization.input_size(),
            });
        }
        self.normalization = normalization;
        Ok(())
    }

    /// Predicted label of a single input
    pub fn predict_class(&self, input: &[f64]) -> Result<i64> {
        let decision = self.decide(input)?;
        Ok(self.model.labels[decision.class_index])
    }

    /// Predicted label and pairwise scores of a single input
    pub fn predict_class_and_scores(&self, input: &[f64]) -> Result<(i64, Vec<f64>)> {
        let decision = self.decide(input)?;
        Ok((self.model.labels[decision.class_index], decision.scores))
    }

    /// Like [`predict_class_and_scores`](Self::predict_class_and_scores),
    /// writing the scores into `scores`, which must hold exactly
    /// [`n_scores`](Self::n_scores) values
    pub fn predict_class_and_scores_into(&self, input: &[f64], scores: &mut [f64]) -> Result<i64> {
        self.check_input(input)?;
        check_output("scores", self.n_scores(), scores.len())?;

        let (label, values) = self.predict_class_and_scores(input)?;
        scores.copy_from_slice(&values);
        Ok(label)
    }

    /// Predicted label and per-class probabilities, ordered like
    /// [`labels`](Self::labels)
    pub fn predict_class_and_probabilities(&self, input: &[f64]) -> Result<(i64, Vec<f64>)> {
        let estimate = self.estimate(input)?;
        Ok((
            self.model.labels[estimate.class_index],
            estimate.probabilities,
        ))
    }

    pub fn predict_class_and_probabilities_into(
        &self,
        input: &[f64],
        probabilities: &mut [f64],
    ) -> Result<i64> {
        self.check_probability()?;
        self.check_input(input)?;
        check_output("probabilities", self.n_classes(), probabilities.len())?;

        let (label, values) = self.predict_class_and_probabilities(input)?;
        probabilities.copy_from_slice(&values);
        Ok(label)
    }

    /// Predicted labels of every row of `inputs`
    pub fn predict_classes(&self, inputs: ArrayView2<f64>) -> Result<Vec<i64>> {
        let mut labels = vec![0; inputs.nrows()];
        self.predict_classes_into(inputs, &mut labels)?;
        Ok(labels)
    }

    pub fn predict_classes_into(&self, inputs: ArrayView2<f64>, labels: &mut [i64]) -> Result<()> {
        self.check_batch(inputs)?;
        check_output("labels", inputs.nrows(), labels.len())?;

        for (row, label) in inputs.rows().into_iter().zip(labels.iter_mut()) {
            *label = self.predict_class(&row.to_vec())?;
        }
        Ok(())
    }

    /// Labels and a `rows x n_scores` score matrix
    pub fn predict_classes_and_scores(
        &self,
        inputs: ArrayView2<f64>,
    ) -> Result<(Vec<i64>, Array2<f64>)> {
        self.check_batch(inputs)?;

        let mut labels = Vec::with_capacity(inputs.nrows());
        let mut scores = Array2::zeros((inputs.nrows(), self.n_scores()));
        for (row, mut out) in inputs.rows().into_iter().zip(scores.rows_mut()) {
            let (label, values) = self.predict_class_and_scores(&row.to_vec())?;
            labels.push(label);
            out.iter_mut().zip(values).for_each(|(o, v)| *o = v);
        }
        Ok((labels, scores))
    }

    /// Labels and a `rows x n_classes` probability matrix
    pub fn predict_classes_and_probabilities(
        &self,
        inputs: ArrayView2<f64>,
    ) -> Result<(Vec<i64>, Array2<f64>)> {
        self.check_probability()?;
        self.check_batch(inputs)?;

        let mut labels = Vec::with_capacity(inputs.nrows());
        let mut probabilities = Array2::zeros((inputs.nrows(), self.n_classes()));
        for (row, mut out) in inputs.rows().into_iter().zip(probabilities.rows_mut()) {
            let (label, values) = self.predict_class_and_probabilities(&row.to_vec())?;
            labels.push(label);
            out.iter_mut().zip(values).for_each(|(o, v)| *o = v);
        }
        Ok((labels, probabilities))
    }

    /// Write the machine to `path`
    ///
    /// [`ModelFormat::Native`] keeps only the model; a non-identity
    /// normalization is lost and a warning is logged.
    pub fn save<P: AsRef<Path>>(&self, path: P, format: ModelFormat) -> Result<()> {
        match format {
            ModelFormat::Native => {
                if !self.normalization.is_identity() {
                    warn!("Input normalization is not stored in LIBSVM model files");
                }
                save_model(&self.model, path)
            }
            ModelFormat::State => self.to_state().save_to_file(path),
        }
    }

    /// State container for this machine
    pub fn to_state(&self) -> MachineState {
        let state = MachineState::new(self.model.clone(), &self.normalization);
        match &self.training_params {
            Some(params) => state.with_training_params(params.clone()),
            None => state,
        }
    }

    fn check_input(&self, input: &[f64]) -> Result<()> {
        if input.len() != self.input_size() {
            return Err(SVMError::DimensionMismatch {
                expected: self.input_size(),
                actual: input.len(),
            });
        }
        Ok(())
    }

    fn check_batch(&self, inputs: ArrayView2<f64>) -> Result<()> {
        if inputs.ncols() != self.input_size() {
            return Err(SVMError::DimensionMismatch {
                expected: self.input_size(),
                actual: inputs.ncols(),
            });
        }
        Ok(())
    }

    fn check_probability(&self) -> Result<()> {
        if !self.supports_probability() {
            return Err(SVMError::ProbabilityNotSupported);
        }
        Ok(())
    }

    /// Normalized sparse form of `input`
    fn prepare(&self, input: &[f64]) -> Result<SparseVector> {
        self.check_input(input)?;
        let scaled = self.normalization.apply(input)?;
        Ok(SparseVector::from_dense(&scaled))
    }

    fn decide(&self, input: &[f64]) -> Result<Decision> {
        let x = self.prepare(input)?;
        let decision = self.solver.predict_decision(&self.model, &x)?;

        check_output("scores", self.n_scores(), decision.scores.len())?;
        self.check_class_index(decision.class_index)?;
        Ok(decision)
    }

    fn estimate(&self, input: &[f64]) -> Result<ProbabilityEstimate> {
        self.check_probability()?;
        let x = self.prepare(input)?;
        let estimate = self.solver.predict_probability(&self.model, &x)?;

        check_output("probabilities", self.n_classes(), estimate.probabilities.len())?;
        self.check_class_index(estimate.class_index)?;
        Ok(estimate)
    }

    fn check_class_index(&self, class_index: usize) -> Result<()> {
        if class_index >= self.n_classes() {
            return Err(SVMError::ShapeMismatch {
                what: "class index",
                expected: self.n_classes(),
                actual: class_index,
            });
        }
        Ok(())
    }
}

fn check_output(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(SVMError::ShapeMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}
