//! Utility functions for SVM operations

/// Number of one-vs-one decision values produced for `n_classes` classes
pub fn n_pairwise_scores(n_classes: usize) -> usize {
    if n_classes < 2 {
        n_classes
    } else {
        n_classes * (n_classes - 1) / 2
    }
}

/// Input normalization
pub mod scaling {
    use crate::core::{Result, SVMError};
    use ndarray::ArrayView2;

    /// Per-feature affine transform `(x - subtract) / divide`
    ///
    /// The same policy is applied to every vector handed to a solver, both
    /// when training and when predicting.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Normalization {
        subtract: Vec<f64>,
        divide: Vec<f64>,
    }

    impl Normalization {
        /// Identity transform: subtract zeros, divide by ones
        pub fn identity(input_size: usize) -> Self {
            Self {
                subtract: vec![0.0; input_size],
                divide: vec![1.0; input_size],
            }
        }

        pub fn new(subtract: Vec<f64>, divide: Vec<f64>) -> Result<Self> {
            if subtract.len() != divide.len() {
                return Err(SVMError::DimensionMismatch {
                    expected: subtract.len(),
                    actual: divide.len(),
                });
            }
            check_divide(&divide)?;
            Ok(Self { subtract, divide })
        }

        /// Z-score policy fitted on `rows` (samples by features)
        ///
        /// Features with zero spread get a divisor of 1.
        pub fn fit(rows: ArrayView2<f64>) -> Result<Self> {
            if rows.nrows() == 0 {
                return Err(SVMError::InvalidDataset(
                    "Cannot fit normalization on zero rows".to_string(),
                ));
            }

            let n = rows.nrows() as f64;
            let mut subtract = Vec::with_capacity(rows.ncols());
            let mut divide = Vec::with_capacity(rows.ncols());

            for column in rows.columns() {
                let mean = column.sum() / n;
                let variance = column.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / n;
                let std = variance.sqrt();
                subtract.push(mean);
                divide.push(if std > 0.0 { std } else { 1.0 });
            }

            Ok(Self { subtract, divide })
        }

        pub fn input_size(&self) -> usize {
            self.subtract.len()
        }

        pub fn subtract(&self) -> &[f64] {
            &self.subtract
        }

        pub fn divide(&self) -> &[f64] {
            &self.divide
        }

        pub fn set_subtract(&mut self, subtract: Vec<f64>) -> Result<()> {
            check_len(self.input_size(), subtract.len())?;
            self.subtract = subtract;
            Ok(())
        }

        pub fn set_divide(&mut self, divide: Vec<f64>) -> Result<()> {
            check_len(self.input_size(), divide.len())?;
            check_divide(&divide)?;
            self.divide = divide;
            Ok(())
        }

        pub fn is_identity(&self) -> bool {
            self.subtract.iter().all(|&s| s == 0.0) && self.divide.iter().all(|&d| d == 1.0)
        }

        pub fn apply(&self, input: &[f64]) -> Result<Vec<f64>> {
            let mut output = vec![0.0; input.len()];
            self.apply_into(input, &mut output)?;
            Ok(output)
        }

        pub fn apply_into(&self, input: &[f64], output: &mut [f64]) -> Result<()> {
            check_len(self.input_size(), input.len())?;
            if output.len() != input.len() {
                return Err(SVMError::ShapeMismatch {
                    what: "output",
                    expected: input.len(),
                    actual: output.len(),
                });
            }

            for (((out, &x), &s), &d) in output
                .iter_mut()
                .zip(input)
                .zip(&self.subtract)
                .zip(&self.divide)
            {
                *out = (x - s) / d;
            }
            Ok(())
        }
    }

    fn check_len(expected: usize, actual: usize) -> Result<()> {
        if expected != actual {
            return Err(SVMError::DimensionMismatch { expected, actual });
        }
        Ok(())
    }

    fn check_divide(divide: &[f64]) -> Result<()> {
        if let Some(pos) = divide.iter().position(|&d| d == 0.0 || !d.is_finite()) {
            return Err(SVMError::InvalidParameter(format!(
                "Division factor at position {pos} must be finite and non-zero, got {}",
                divide[pos]
            )));
        }
        Ok(())
    }
}
