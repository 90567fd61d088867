use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use mm_core::kernel::dot_column;
use mm_core::{Matrix, MultiplyStrategy, Result, Validation};
use tracing::debug;

use crate::config::{available_parallelism, EngineConfig};
use crate::output::SharedOutput;
use crate::worker::join_all;

/// Fixed set of worker threads that claim rows from a shared counter.
///
/// Each worker repeatedly does `fetch_add(1)` on the row counter and
/// computes the claimed row, until the counter passes the last row. Rows
/// are claimed exactly once, so cheap and expensive rows balance without a
/// static assignment.
#[derive(Debug, Clone)]
pub struct RowStealingStrategy {
    threads: usize,
    validation: Validation,
}

impl RowStealingStrategy {
    pub fn new(threads: usize) -> Self {
        RowStealingStrategy {
            threads: threads.max(1),
            validation: Validation::Always,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.threads).with_validation(config.validation)
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }

    pub fn threads(&self) -> usize {
        self.threads
    }
}

impl Default for RowStealingStrategy {
    fn default() -> Self {
        Self::new(available_parallelism())
    }
}

impl MultiplyStrategy for RowStealingStrategy {
    fn name(&self) -> &str {
        "row-stealing"
    }

    fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        self.validation.check(a, b)?;
        let m = a.rows();
        let p = b.cols();
        let mut c = Matrix::zeros(m, p);
        if c.is_empty() {
            return Ok(c);
        }

        // Surplus workers would only observe an exhausted counter.
        let workers = self.threads.min(m);
        let next_row = AtomicUsize::new(0);
        let b_data = b.data();
        let out = SharedOutput::new(&mut c);

        let claimed: Vec<usize> = thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    s.spawn(|| {
                        let mut rows_done = 0;
                        loop {
                            let i = next_row.fetch_add(1, Ordering::Relaxed);
                            if i >= m {
                                break;
                            }
                            // SAFETY: fetch_add hands out each row index once.
                            let row = unsafe { out.row_segment(i, 0..p) };
                            let a_row = a.row(i);
                            for (j, cell) in row.iter_mut().enumerate() {
                                *cell = dot_column(a_row, b_data, p, j);
                            }
                            rows_done += 1;
                        }
                        rows_done
                    })
                })
                .collect();

            join_all(self.name(), handles)
        })?;

        debug!(m, n = a.cols(), p, workers, ?claimed, "row-stealing multiply");
        Ok(c)
    }
}
