use mm_core::kernel::dot_simd;
use mm_core::{Matrix, MultiplyStrategy, Result, Validation};
use rayon::prelude::*;
use tracing::debug;

use crate::worker::catch_worker_panic;

/// Rows of C filled through a rayon parallel iterator.
///
/// rayon decides the split; each row is computed with the SIMD kernel
/// against the transposed right operand.
#[derive(Debug, Clone, Default)]
pub struct ParallelRowsSimdStrategy {
    validation: Validation,
}

impl ParallelRowsSimdStrategy {
    pub fn new() -> Self {
        ParallelRowsSimdStrategy {
            validation: Validation::Always,
        }
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }
}

impl MultiplyStrategy for ParallelRowsSimdStrategy {
    fn name(&self) -> &str {
        "parallel-rows-simd"
    }

    fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        self.validation.check(a, b)?;
        let m = a.rows();
        let p = b.cols();
        debug!(m, n = a.cols(), p, "parallel-rows multiply");

        let mut c = Matrix::zeros(m, p);
        if c.is_empty() {
            return Ok(c);
        }

        let bt = b.transpose();
        catch_worker_panic(self.name(), || {
            c.data_mut()
                .par_chunks_mut(p)
                .enumerate()
                .for_each(|(i, out_row)| {
                    let a_row = a.row(i);
                    for (j, cell) in out_row.iter_mut().enumerate() {
                        *cell = dot_simd(a_row, bt.row(j));
                    }
                })
        })?;
        Ok(c)
    }
}
