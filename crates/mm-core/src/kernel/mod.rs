//! Dot-product kernels shared by the multiplication strategies.
//!
//! [`dot`] is the plain sequential accumulation. [`dot_simd`] is the
//! vectorized micro-kernel: it walks both rows `V` lanes at a time, reduces
//! each lanewise product into a scalar accumulator and finishes the tail with
//! a scalar loop. The lane reduction reorders additions, so results agree
//! with [`dot`] up to rounding, not bit for bit.

pub mod simd;

pub use simd::{dot_simd, instruction_set, lane_width};

/// Sequential dot product of two equal-length rows.
#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Dot product of row `a` with column `col` of a row-major matrix `b` that
/// has `b_cols` columns.
#[inline]
pub fn dot_column(a: &[f64], b: &[f64], b_cols: usize, col: usize) -> f64 {
    let mut sum = 0.0;
    for (k, x) in a.iter().enumerate() {
        sum += x * b[k * b_cols + col];
    }
    sum
}
