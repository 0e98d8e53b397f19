//! Polynomial kernel implementation
//!
//! K(x, y) = (γ * <x, y> + coef0)^degree

use crate::core::SparseVector;
use crate::kernel::linear::dot_product_sparse;
use crate::kernel::Kernel;

#[derive(Debug, Clone, Copy)]
pub struct PolynomialKernel {
    pub degree: i32,
    pub gamma: f64,
    pub coef0: f64,
}

impl PolynomialKernel {
    pub fn new(degree: i32, gamma: f64, coef0: f64) -> Self {
        Self {
            degree,
            gamma,
            coef0,
        }
    }
}

impl Kernel for PolynomialKernel {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        // negative bases are kept: odd degrees legitimately produce negative values
        (self.gamma * dot_product_sparse(x, y) + self.coef0).powi(self.degree)
    }
}
