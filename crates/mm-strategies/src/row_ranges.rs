use std::ops::Range;

use mm_core::kernel::dot_simd;
use mm_core::{MatmulError, Matrix, MultiplyStrategy, Result, Validation};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::config::{available_parallelism, EngineConfig};
use crate::partition::row_ranges;
use crate::worker::catch_worker_panic;

/// Static row ranges on a persistent pool, SIMD kernel inside each range.
///
/// The pool is built once with the strategy and reused by every call. Rows
/// are cut into one contiguous range per worker (see [`row_ranges`]); each
/// range becomes a single task that owns its slice of the output and runs
/// [`dot_simd`] against the transposed right operand.
#[derive(Debug)]
pub struct RowRangeStrategy {
    pool: ThreadPool,
    threads: usize,
    validation: Validation,
}

impl RowRangeStrategy {
    /// Build the strategy and its `threads`-wide pool.
    ///
    /// # Errors
    /// Returns [`MatmulError::ThreadPool`] if the pool cannot be created.
    pub fn new(threads: usize) -> Result<Self> {
        let threads = threads.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("mm-row-range-{i}"))
            .build()
            .map_err(|e| MatmulError::ThreadPool(e.to_string()))?;
        Ok(RowRangeStrategy {
            pool,
            threads,
            validation: Validation::Always,
        })
    }

    /// One worker per available hardware thread.
    pub fn with_default_threads() -> Result<Self> {
        Self::new(available_parallelism())
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Ok(Self::new(config.threads)?.with_validation(config.validation))
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }

    pub fn threads(&self) -> usize {
        self.threads
    }
}

impl MultiplyStrategy for RowRangeStrategy {
    fn name(&self) -> &str {
        "row-ranges-simd"
    }

    fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        self.validation.check(a, b)?;
        let m = a.rows();
        let p = b.cols();
        let mut c = Matrix::zeros(m, p);
        if c.is_empty() {
            return Ok(c);
        }

        let bt = b.transpose();
        let ranges = row_ranges(m, self.threads);
        debug!(m, n = a.cols(), p, ?ranges, "row-range multiply");

        // Ranges are contiguous and ordered, so the output splits front to back.
        let mut tasks = Vec::with_capacity(ranges.len());
        let mut rest = c.data_mut();
        for range in ranges {
            let (chunk, tail) = std::mem::take(&mut rest).split_at_mut(range.len() * p);
            rest = tail;
            tasks.push((chunk, range));
        }

        let bt = &bt;
        catch_worker_panic(self.name(), || {
            self.pool.scope(|s| {
                for (chunk, range) in tasks {
                    s.spawn(move |_| fill_rows(a, bt, chunk, range));
                }
            })
        })?;
        Ok(c)
    }
}

/// Compute output rows `rows` into `out`, which holds exactly those rows.
fn fill_rows(a: &Matrix, bt: &Matrix, out: &mut [f64], rows: Range<usize>) {
    let p = bt.rows();
    for (out_row, i) in out.chunks_mut(p).zip(rows) {
        let a_row = a.row(i);
        for (j, cell) in out_row.iter_mut().enumerate() {
            *cell = dot_simd(a_row, bt.row(j));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mm_core::{self_test, NaiveStrategy};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_basic() {
        let s = RowRangeStrategy::new(2).unwrap();
        let a = Matrix::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let b = Matrix::new(2, 2, vec![5.0, 6.0, 7.0, 8.0]).unwrap();
        assert_eq!(s.multiply(&a, &b).unwrap().data(), &[19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_pool_reused_across_calls() {
        let s = RowRangeStrategy::new(3).unwrap();
        let mut rng = StdRng::seed_from_u64(21);
        for rows in [1, 2, 3, 10, 47] {
            let a = Matrix::random(rows, 9, &mut rng);
            let b = Matrix::random(9, 5, &mut rng);
            let expected = NaiveStrategy::new().multiply(&a, &b).unwrap();
            let c = s.multiply(&a, &b).unwrap();
            for (x, y) in c.data().iter().zip(expected.data()) {
                assert_relative_eq!(*x, *y, max_relative = 1e-12);
            }
        }
    }

    #[test]
    fn test_more_workers_than_rows() {
        let s = RowRangeStrategy::new(16).unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        let a = Matrix::random(3, 40, &mut rng);
        let b = Matrix::random(40, 3, &mut rng);
        self_test(&s, &a, &b).unwrap();
    }

    #[test]
    fn test_from_config() {
        let cfg = EngineConfig {
            threads: 5,
            ..EngineConfig::default()
        };
        assert_eq!(RowRangeStrategy::from_config(&cfg).unwrap().threads(), 5);
    }
}
