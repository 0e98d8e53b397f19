//! Data loading
//!
//! Readers for the sparse LIBSVM text format.

pub mod libsvm;

pub use self::libsvm::*;
