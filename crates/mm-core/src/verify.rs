use tracing::info;

use crate::error::{MatmulError, Result};
use crate::matrix::Matrix;
use crate::reference::NaiveStrategy;
use crate::strategy::{check_dims, MultiplyStrategy};

/// Largest accepted per-element relative error, in percent.
pub const MAX_RELATIVE_ERROR_PCT: f64 = 2.0;

/// Element-wise error of a product against the reference product.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorReport {
    /// Largest per-element relative error, in percent.
    pub max_error_pct: f64,
    /// Mean per-element relative error, in percent.
    pub avg_error_pct: f64,
}

impl ErrorReport {
    /// False when the maximum exceeds the threshold or is not finite.
    pub fn passes(&self) -> bool {
        self.max_error_pct.is_finite() && self.max_error_pct <= MAX_RELATIVE_ERROR_PCT
    }
}

/// Relative error of `actual` against `expected`, in percent.
///
/// When `expected` is exactly zero the absolute difference is used instead.
pub fn relative_error_pct(expected: f64, actual: f64) -> f64 {
    let diff = (expected - actual).abs();
    if expected != 0.0 {
        diff / expected.abs() * 100.0
    } else {
        diff * 100.0
    }
}

/// Compare two equally shaped matrices element by element.
///
/// # Errors
/// Returns [`MatmulError::DataLength`] if `actual` does not have the shape of
/// `expected`.
pub fn compare(expected: &Matrix, actual: &Matrix) -> Result<ErrorReport> {
    if expected.dims() != actual.dims() {
        return Err(MatmulError::DataLength {
            rows: expected.rows(),
            cols: expected.cols(),
            len: actual.data().len(),
        });
    }

    let mut max_error_pct: f64 = 0.0;
    let mut sum_error_pct = 0.0;
    for (&e, &a) in expected.data().iter().zip(actual.data()) {
        // A NaN cell counts as infinitely wrong; `f64::max` would drop it.
        let err = match relative_error_pct(e, a) {
            err if err.is_nan() => f64::INFINITY,
            err => err,
        };
        max_error_pct = max_error_pct.max(err);
        sum_error_pct += err;
    }

    let n = expected.data().len();
    let avg_error_pct = if n == 0 { 0.0 } else { sum_error_pct / n as f64 };
    Ok(ErrorReport {
        max_error_pct,
        avg_error_pct,
    })
}

/// Run `strategy` on `(a, b)` and check it against [`NaiveStrategy`].
///
/// # Errors
/// - [`MatmulError::DimensionMismatch`] if the operands are incompatible
/// - [`MatmulError::CorrectnessViolation`] if the maximum relative error
///   exceeds [`MAX_RELATIVE_ERROR_PCT`]
/// - any error returned by `strategy` itself
pub fn self_test<S>(strategy: &S, a: &Matrix, b: &Matrix) -> Result<ErrorReport>
where
    S: MultiplyStrategy + ?Sized,
{
    check_dims(a, b)?;
    let expected = NaiveStrategy::new().multiply(a, b)?;
    let actual = strategy.multiply(a, b)?;
    let report = compare(&expected, &actual)?;

    info!(
        strategy = strategy.name(),
        rows = a.rows(),
        cols = a.cols(),
        max_error_pct = report.max_error_pct,
        avg_error_pct = report.avg_error_pct,
        passed = report.passes(),
        "self-test"
    );

    if !report.passes() {
        return Err(MatmulError::CorrectnessViolation {
            strategy: strategy.name().to_string(),
            max_error_pct: report.max_error_pct,
            threshold_pct: MAX_RELATIVE_ERROR_PCT,
        });
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Returns a fixed, wrong answer of the right shape.
    #[derive(Debug)]
    struct Skewed(f64);

    impl MultiplyStrategy for Skewed {
        fn name(&self) -> &str {
            "skewed"
        }

        fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
            let mut c = NaiveStrategy::new().multiply(a, b)?;
            for v in c.data_mut() {
                *v *= self.0;
            }
            Ok(c)
        }
    }

    fn sample() -> (Matrix, Matrix) {
        (
            Matrix::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap(),
            Matrix::new(2, 2, vec![5.0, 6.0, 7.0, 8.0]).unwrap(),
        )
    }

    #[test]
    fn test_relative_error() {
        assert_abs_diff_eq!(relative_error_pct(100.0, 99.0), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(relative_error_pct(-50.0, -51.0), 2.0, epsilon = 1e-12);
        // Zero expected falls back to the absolute difference.
        assert_abs_diff_eq!(relative_error_pct(0.0, 0.001), 0.1, epsilon = 1e-12);
        assert_eq!(relative_error_pct(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_reference_passes_itself() {
        let (a, b) = sample();
        let report = self_test(&NaiveStrategy::new(), &a, &b).unwrap();
        assert_eq!(report.max_error_pct, 0.0);
        assert_eq!(report.avg_error_pct, 0.0);
    }

    #[test]
    fn test_within_threshold_passes() {
        let (a, b) = sample();
        let report = self_test(&Skewed(1.015), &a, &b).unwrap();
        assert_abs_diff_eq!(report.max_error_pct, 1.5, epsilon = 1e-9);
    }

    #[test]
    fn test_beyond_threshold_fails() {
        let (a, b) = sample();
        let err = self_test(&Skewed(1.05), &a, &b).unwrap_err();
        match err {
            MatmulError::CorrectnessViolation {
                strategy,
                max_error_pct,
                threshold_pct,
            } => {
                assert_eq!(strategy, "skewed");
                assert_abs_diff_eq!(max_error_pct, 5.0, epsilon = 1e-9);
                assert_eq!(threshold_pct, MAX_RELATIVE_ERROR_PCT);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_product_exact_match() {
        let a = Matrix::zeros(1, 5);
        let b = Matrix::zeros(5, 1);
        let report = self_test(&NaiveStrategy::new(), &a, &b).unwrap();
        assert_eq!(report.max_error_pct, 0.0);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let a = Matrix::zeros(2, 3);
        let b = Matrix::zeros(4, 2);
        assert!(matches!(
            self_test(&NaiveStrategy::new(), &a, &b),
            Err(MatmulError::DimensionMismatch { .. })
        ));
    }

    /// Reference product with one cell overwritten.
    #[derive(Debug)]
    struct Poisoned(f64);

    impl MultiplyStrategy for Poisoned {
        fn name(&self) -> &str {
            "poisoned"
        }

        fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
            let mut c = NaiveStrategy::new().multiply(a, b)?;
            c.data_mut()[0] = self.0;
            Ok(c)
        }
    }

    #[test]
    fn test_nan_cell_fails() {
        let (a, b) = sample();
        let err = self_test(&Poisoned(f64::NAN), &a, &b).unwrap_err();
        assert!(matches!(
            err,
            MatmulError::CorrectnessViolation { max_error_pct, .. } if max_error_pct.is_infinite()
        ));
    }

    #[test]
    fn test_infinite_cell_fails() {
        let (a, b) = sample();
        assert!(self_test(&Poisoned(f64::INFINITY), &a, &b).is_err());
    }

    #[test]
    fn test_non_finite_report_does_not_pass() {
        let report = ErrorReport {
            max_error_pct: f64::NAN,
            avg_error_pct: 0.0,
        };
        assert!(!report.passes());
    }

    #[test]
    fn test_compare_shape_mismatch() {
        assert!(compare(&Matrix::zeros(2, 2), &Matrix::zeros(2, 3)).is_err());
    }
}
