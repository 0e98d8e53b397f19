//! Linear kernel, `K(x, y) = <x, y>`

use crate::core::SparseVector;
use crate::kernel::Kernel;

#[derive(Debug, Clone, Copy, Default)]
pub struct LinearKernel;

impl LinearKernel {
    pub fn new() -> Self {
        Self
    }
}

impl Kernel for LinearKernel {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        dot_product_sparse(x, y)
    }
}

/// Inner product of two sparse vectors with strictly increasing indices
///
/// Only indices stored in both vectors contribute.
pub(crate) fn dot_product_sparse(x: &SparseVector, y: &SparseVector) -> f64 {
    let (mut a, mut b) = (x.indices.iter().zip(&x.values), y.indices.iter().zip(&y.values));
    let (mut left, mut right) = (a.next(), b.next());
    let mut sum = 0.0;

    while let (Some((&i, &u)), Some((&j, &v))) = (left, right) {
        match i.cmp(&j) {
            std::cmp::Ordering::Equal => {
                sum += u * v;
                left = a.next();
                right = b.next();
            }
            std::cmp::Ordering::Less => left = a.next(),
            std::cmp::Ordering::Greater => right = b.next(),
        }
    }
    sum
}
