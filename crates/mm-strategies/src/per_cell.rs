use mm_core::kernel::dot_column;
use mm_core::{Matrix, MultiplyStrategy, Result, Validation};
use tracing::debug;

use crate::worker::catch_worker_panic;

/// One task per output cell.
///
/// Tasks are spawned into a `rayon::scope` on the global pool, so the number
/// of OS threads stays bounded while task count grows with `rows * cols`.
/// Each task owns exactly one `&mut f64`. Only sensible for small matrices.
#[derive(Debug, Clone, Default)]
pub struct PerCellStrategy {
    validation: Validation,
}

impl PerCellStrategy {
    pub fn new() -> Self {
        PerCellStrategy {
            validation: Validation::Always,
        }
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }
}

impl MultiplyStrategy for PerCellStrategy {
    fn name(&self) -> &str {
        "per-cell"
    }

    fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        self.validation.check(a, b)?;
        let m = a.rows();
        let p = b.cols();
        debug!(m, n = a.cols(), p, tasks = m * p, "per-cell multiply");

        let mut c = Matrix::zeros(m, p);
        if c.is_empty() {
            return Ok(c);
        }

        let b_data = b.data();
        catch_worker_panic(self.name(), || {
            rayon::scope(|s| {
                for (idx, cell) in c.data_mut().iter_mut().enumerate() {
                    s.spawn(move |_| {
                        let (i, j) = (idx / p, idx % p);
                        *cell = dot_column(a.row(i), b_data, p, j);
                    });
                }
            })
        })?;
        Ok(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mm_core::NaiveStrategy;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_basic() {
        let a = Matrix::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let b = Matrix::new(2, 2, vec![5.0, 6.0, 7.0, 8.0]).unwrap();
        let c = PerCellStrategy::new().multiply(&a, &b).unwrap();
        assert_eq!(c.data(), &[19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_matches_reference() {
        let mut rng = StdRng::seed_from_u64(3);
        let a = Matrix::random(17, 5, &mut rng);
        let b = Matrix::random(5, 23, &mut rng);
        let expected = NaiveStrategy::new().multiply(&a, &b).unwrap();
        let c = PerCellStrategy::new().multiply(&a, &b).unwrap();
        // Same accumulation order as the reference.
        assert_eq!(c, expected);
        assert_relative_eq!(c.get(16, 22), expected.get(16, 22));
    }

    #[test]
    fn test_empty_output() {
        let c = PerCellStrategy::new()
            .multiply(&Matrix::zeros(0, 3), &Matrix::zeros(3, 4))
            .unwrap();
        assert_eq!(c.dims(), (0, 4));
    }
}
