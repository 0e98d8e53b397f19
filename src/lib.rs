//! Multi-class Support Vector Machine classification
//!
//! The crate wraps a LIBSVM compatible solver behind a small classification
//! layer:
//!
//! - [`LibsvmFile`] reads LIBSVM sparse text data into dense rows
//! - [`Trainer`] turns one array per class into a trained [`Machine`]
//! - [`Machine`] normalizes inputs and predicts labels, decision scores and
//!   probabilities, one sample at a time or in batches
//! - [`persistence`] saves machines as LIBSVM model files or JSON state

pub mod cache;
pub mod core;
pub mod data;
pub mod kernel;
pub mod machine;
pub mod persistence;
pub mod solver;
pub mod trainer;
pub mod utils;

// Re-export main types for convenience
pub use crate::cache::{CacheStats, KernelCache};
pub use crate::core::error::*;
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::data::{LabeledRow, LibsvmFile};
pub use crate::kernel::{Kernel, KernelParams};
pub use crate::machine::Machine;
pub use crate::persistence::{MachineState, ModelFormat};
pub use crate::solver::{SmoSolver, SvmModel};
pub use crate::trainer::Trainer;
pub use crate::utils::scaling::Normalization;

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
