use mm_core::kernel::dot_column;
use mm_core::{Matrix, MultiplyStrategy, Result, Validation};
use tracing::debug;

use crate::worker::catch_worker_panic;

/// One statically assigned task per output row.
///
/// A concurrency baseline: the task count grows with the row count, but the
/// tasks run on rayon's bounded global pool rather than one thread each.
#[derive(Debug, Clone, Default)]
pub struct PerRowStrategy {
    validation: Validation,
}

impl PerRowStrategy {
    pub fn new() -> Self {
        PerRowStrategy {
            validation: Validation::Always,
        }
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }
}

impl MultiplyStrategy for PerRowStrategy {
    fn name(&self) -> &str {
        "per-row"
    }

    fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        self.validation.check(a, b)?;
        let m = a.rows();
        let p = b.cols();
        debug!(m, n = a.cols(), p, "per-row multiply");

        let mut c = Matrix::zeros(m, p);
        if c.is_empty() {
            return Ok(c);
        }

        let b_data = b.data();
        catch_worker_panic(self.name(), || {
            rayon::scope(|s| {
                for (i, row) in c.data_mut().chunks_mut(p).enumerate() {
                    s.spawn(move |_| {
                        let a_row = a.row(i);
                        for (j, cell) in row.iter_mut().enumerate() {
                            *cell = dot_column(a_row, b_data, p, j);
                        }
                    });
                }
            })
        })?;
        Ok(c)
    }
}
