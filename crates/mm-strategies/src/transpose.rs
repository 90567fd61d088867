use mm_core::kernel::{dot, dot_simd};
use mm_core::{Matrix, MultiplyStrategy, Result, Validation};
use tracing::debug;

/// Sequential multiplication against a transposed copy of B.
///
/// After one transpose both dot-product operands are contiguous rows, so
/// the inner loop streams through memory. The vectorized variant runs the
/// same loop through the SIMD micro-kernel.
#[derive(Debug, Clone)]
pub struct TransposeStrategy {
    simd: bool,
    validation: Validation,
}

impl TransposeStrategy {
    /// Scalar inner loop.
    pub fn new() -> Self {
        TransposeStrategy {
            simd: false,
            validation: Validation::Always,
        }
    }

    /// Inner loop through [`dot_simd`].
    pub fn simd() -> Self {
        TransposeStrategy {
            simd: true,
            validation: Validation::Always,
        }
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }
}

impl Default for TransposeStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiplyStrategy for TransposeStrategy {
    fn name(&self) -> &str {
        if self.simd {
            "transpose-simd"
        } else {
            "transpose"
        }
    }

    fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        self.validation.check(a, b)?;
        let m = a.rows();
        let p = b.cols();
        debug!(m, n = a.cols(), p, simd = self.simd, "transpose multiply");

        let bt = b.transpose();
        let mut c = Matrix::zeros(m, p);
        for i in 0..m {
            let a_row = a.row(i);
            let out = c.row_mut(i);
            for (j, cell) in out.iter_mut().enumerate() {
                *cell = if self.simd {
                    dot_simd(a_row, bt.row(j))
                } else {
                    dot(a_row, bt.row(j))
                };
            }
        }
        Ok(c)
    }
}
