use tracing::debug;

use crate::error::Result;
use crate::matrix::Matrix;
use crate::strategy::{check_dims, MultiplyStrategy};

/// Textbook i-j-k multiplication.
///
/// Optimized for nothing; every other strategy is checked against it.
#[derive(Debug, Clone)]
pub struct NaiveStrategy;

impl NaiveStrategy {
    pub fn new() -> Self {
        NaiveStrategy
    }
}

impl Default for NaiveStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiplyStrategy for NaiveStrategy {
    fn name(&self) -> &str {
        "naive"
    }

    fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        check_dims(a, b)?;
        let (m, n) = a.dims();
        let p = b.cols();
        debug!(m, n, p, "naive multiply");

        let a = a.data();
        let b = b.data();
        let mut c = Matrix::zeros(m, p);
        let out = c.data_mut();
        for i in 0..m {
            for j in 0..p {
                let mut sum = 0.0;
                for k in 0..n {
                    sum += a[i * n + k] * b[k * p + j];
                }
                out[i * p + j] = sum;
            }
        }
        Ok(c)
    }
}
