//! SVM solver implementations
//!
//! [`SmoSolver`] is the built-in backend behind [`crate::core::Solver`]:
//! SMO training of C-SVC models, one-vs-one decision values and Platt
//! probability estimates.

pub mod decision;
pub mod model;
pub mod probability;
pub mod smo;

pub use self::model::SvmModel;
pub use self::smo::SmoSolver;
