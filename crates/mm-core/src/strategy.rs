use std::fmt::Debug;

use crate::error::{MatmulError, Result};
use crate::matrix::Matrix;

/// A matrix multiplication algorithm.
///
/// Implementations borrow both operands read-only and return a freshly
/// allocated product. Strategies that keep a worker pool hold it for their
/// own lifetime and reuse it across calls.
pub trait MultiplyStrategy: Send + Sync + Debug {
    /// Stable identifier used for lookup and reporting (e.g. "naive").
    fn name(&self) -> &str;

    /// Matrix multiplication: C = A @ B.
    ///
    /// - `a`: shape [m, n]
    /// - `b`: shape [n, p]
    /// - Returns: shape [m, p]
    fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix>;

    /// True if `a` and `b` can be multiplied.
    fn validate(&self, a: &Matrix, b: &Matrix) -> bool {
        a.cols() == b.rows()
    }
}

/// How a strategy checks operand dimensions before computing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Validation {
    /// Return [`MatmulError::DimensionMismatch`] on incompatible operands.
    #[default]
    Always,
    /// `debug_assert!` only. Release builds skip the check; incompatible
    /// operands then give an unspecified product or a bounds panic, never an
    /// out-of-bounds read.
    DebugOnly,
}

impl Validation {
    pub fn check(self, a: &Matrix, b: &Matrix) -> Result<()> {
        match self {
            Validation::Always => check_dims(a, b),
            Validation::DebugOnly => {
                debug_assert_eq!(
                    a.cols(),
                    b.rows(),
                    "matmul dimension mismatch: [{}x{}] @ [{}x{}]",
                    a.rows(),
                    a.cols(),
                    b.rows(),
                    b.cols()
                );
                Ok(())
            }
        }
    }
}

/// Fails with [`MatmulError::DimensionMismatch`] unless `a.cols() == b.rows()`.
pub fn check_dims(a: &Matrix, b: &Matrix) -> Result<()> {
    if a.cols() != b.rows() {
        return Err(MatmulError::DimensionMismatch {
            a_rows: a.rows(),
            a_cols: a.cols(),
            b_rows: b.rows(),
            b_cols: b.cols(),
        });
    }
    Ok(())
}
