//! Kernel functions for SVM

pub mod linear;
pub mod polynomial;
pub mod rbf;
pub mod sigmoid;
pub mod traits;

pub use self::linear::*;
pub use self::polynomial::*;
pub use self::rbf::*;
pub use self::sigmoid::*;
pub use self::traits::*;

use crate::core::{KernelType, Result, SVMError};

/// Kernel family and its hyperparameters, as recorded in a model
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct KernelParams {
    pub kernel_type: KernelType,
    pub degree: i32,
    pub gamma: f64,
    pub coef0: f64,
}

impl KernelParams {
    /// Instantiate the kernel function these parameters describe
    pub fn build(&self) -> Result<Box<dyn Kernel>> {
        if self.kernel_type.uses_gamma() && !self.gamma.is_finite() {
            return Err(SVMError::InvalidParameter(format!(
                "Kernel gamma must be finite, got {}",
                self.gamma
            )));
        }

        match self.kernel_type {
            KernelType::Linear => Ok(Box::new(LinearKernel::new())),
            KernelType::Polynomial => {
                if self.degree < 0 {
                    return Err(SVMError::InvalidParameter(format!(
                        "Polynomial degree must not be negative, got {}",
                        self.degree
                    )));
                }
                Ok(Box::new(PolynomialKernel::new(
                    self.degree,
                    self.gamma,
                    self.coef0,
                )))
            }
            KernelType::Rbf => Ok(Box::new(RBFKernel::new(self.gamma))),
            KernelType::Sigmoid => Ok(Box::new(SigmoidKernel::new(self.gamma, self.coef0))),
            KernelType::Precomputed => Err(SVMError::UnsupportedKernelType(
                KernelType::Precomputed.to_string(),
            )),
        }
    }
}
