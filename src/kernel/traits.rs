//! Kernel trait definition

use crate::core::SparseVector;

/// Kernel function trait
///
/// Solvers evaluate every kernel family through this interface, both while
/// training and when computing decision values for new inputs.
pub trait Kernel: Send + Sync {
    /// Compute kernel value K(x, y)
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64;

    /// Compute K(x, y) using precomputed squared norms
    ///
    /// Only distance-based kernels (RBF) benefit; the default ignores the norms.
    fn compute_with_norms(
        &self,
        x: &SparseVector,
        y: &SparseVector,
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        let _ = (x_norm_sq, y_norm_sq);
        self.compute(x, y)
    }
}
