//! Core traits

use crate::core::{Decision, ProbabilityEstimate, Result, Sample, SparseVector, SvmParameters};
use crate::solver::SvmModel;

/// The optimization backend machines and trainers delegate to
///
/// Implementations train a model from flattened labeled samples and evaluate
/// its decision function. Machines and trainers never look inside the
/// optimization itself, so any backend (or a test double) can be plugged in.
pub trait Solver: Send + Sync {
    /// Train a model on `samples` whose features live in `n_features` dimensions
    ///
    /// The class order of the returned model follows the order in which labels
    /// first appear in `samples`.
    fn train(
        &self,
        params: &SvmParameters,
        samples: &[Sample],
        n_features: usize,
    ) -> Result<SvmModel>;

    /// Winning class index and the one-vs-one decision values, in the order
    /// `(0,1), (0,2), ..., (1,2), ...`
    fn predict_decision(&self, model: &SvmModel, x: &SparseVector) -> Result<Decision>;

    /// Winning class index and one probability per class
    fn predict_probability(
        &self,
        model: &SvmModel,
        x: &SparseVector,
    ) -> Result<ProbabilityEstimate>;
}
