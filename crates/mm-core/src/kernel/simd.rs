//! Vector dot-product micro-kernel.
//!
//! - AVX on x86_64 (4 x f64), detected at runtime
//! - NEON on aarch64 (2 x f64)
//! - Portable 4-lane fallback everywhere else

use std::sync::OnceLock;

/// Lane count of the portable fallback.
const PORTABLE_LANES: usize = 4;

/// The dot-product implementation chosen for this machine.
#[derive(Clone, Copy)]
struct Kernel {
    name: &'static str,
    dot: fn(&[f64], &[f64]) -> f64,
}

/// Resolved on first use; feature detection never runs in the hot loop.
static KERNEL: OnceLock<Kernel> = OnceLock::new();

fn kernel() -> Kernel {
    *KERNEL.get_or_init(detect)
}

/// Dot product of two equal-length rows using the widest available vector
/// unit.
///
/// # Panics
/// Panics if `a.len() != b.len()`.
#[inline]
pub fn dot_simd(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len(), "dot_simd: operand lengths differ");
    (kernel().dot)(a, b)
}

/// Number of `f64` lanes processed per vector step on this machine.
pub fn lane_width() -> usize {
    match instruction_set() {
        "NEON" => 2,
        "AVX" => 4,
        _ => PORTABLE_LANES,
    }
}

/// Name of the instruction set [`dot_simd`] dispatches to.
pub fn instruction_set() -> &'static str {
    kernel().name
}

#[cfg(target_arch = "x86_64")]
fn detect() -> Kernel {
    if is_x86_feature_detected!("avx") {
        Kernel {
            name: "AVX",
            dot: dot_avx_detected,
        }
    } else {
        Kernel {
            name: "portable",
            dot: dot_portable,
        }
    }
}

#[cfg(target_arch = "aarch64")]
fn detect() -> Kernel {
    Kernel {
        name: "NEON",
        dot: dot_neon_mandatory,
    }
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
fn detect() -> Kernel {
    Kernel {
        name: "portable",
        dot: dot_portable,
    }
}

#[cfg(target_arch = "x86_64")]
fn dot_avx_detected(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    // SAFETY: only installed by `detect` after AVX was found, and
    // `dot_simd` has checked the lengths.
    unsafe { dot_avx(a, b) }
}

#[cfg(target_arch = "aarch64")]
fn dot_neon_mandatory(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    // SAFETY: NEON is mandatory on aarch64 and `dot_simd` has checked the
    // lengths.
    unsafe { dot_neon(a, b) }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx")]
unsafe fn dot_avx(a: &[f64], b: &[f64]) -> f64 {
    use std::arch::x86_64::*;

    let len = a.len();
    let mut sum = 0.0;
    let mut k = 0;

    while k + 4 <= len {
        let av = _mm256_loadu_pd(a.as_ptr().add(k));
        let bv = _mm256_loadu_pd(b.as_ptr().add(k));
        let prod = _mm256_mul_pd(av, bv);

        // Horizontal sum of the four lanes
        let lo = _mm256_castpd256_pd128(prod);
        let hi = _mm256_extractf128_pd(prod, 1);
        let pair = _mm_add_pd(lo, hi);
        let high = _mm_unpackhi_pd(pair, pair);
        sum += _mm_cvtsd_f64(_mm_add_sd(pair, high));
        k += 4;
    }

    while k < len {
        sum += a[k] * b[k];
        k += 1;
    }
    sum
}

#[cfg(target_arch = "aarch64")]
unsafe fn dot_neon(a: &[f64], b: &[f64]) -> f64 {
    use std::arch::aarch64::*;

    let len = a.len();
    let mut sum = 0.0;
    let mut k = 0;

    while k + 2 <= len {
        let av = vld1q_f64(a.as_ptr().add(k));
        let bv = vld1q_f64(b.as_ptr().add(k));
        sum += vaddvq_f64(vmulq_f64(av, bv));
        k += 2;
    }

    while k < len {
        sum += a[k] * b[k];
        k += 1;
    }
    sum
}

/// Fixed-width lane loop without intrinsics. The compiler is free to map the
/// lane array onto whatever vector registers the target has.
#[cfg_attr(target_arch = "aarch64", allow(dead_code))]
fn dot_portable(a: &[f64], b: &[f64]) -> f64 {
    let mut sum = 0.0;
    let a_chunks = a.chunks_exact(PORTABLE_LANES);
    let b_chunks = b.chunks_exact(PORTABLE_LANES);
    let (a_tail, b_tail) = (a_chunks.remainder(), b_chunks.remainder());

    for (x, y) in a_chunks.zip(b_chunks) {
        let lanes: [f64; PORTABLE_LANES] = std::array::from_fn(|l| x[l] * y[l]);
        sum += lanes.iter().sum::<f64>();
    }
    for (x, y) in a_tail.iter().zip(b_tail) {
        sum += x * y;
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::dot;
    use approx::assert_relative_eq;

    fn ramp(len: usize, scale: f64) -> Vec<f64> {
        (0..len).map(|i| (i as f64 + 1.0) * scale).collect()
    }

    #[test]
    fn test_matches_scalar_for_every_remainder() {
        // Covers zero, partial, exact and multi-vector lengths for 2 and 4 lanes.
        for len in 0..=19 {
            let a = ramp(len, 0.5);
            let b = ramp(len, -1.25);
            assert_relative_eq!(dot_simd(&a, &b), dot(&a, &b), max_relative = 1e-12);
        }
    }

    #[test]
    fn test_portable_matches_scalar() {
        for len in [0, 1, 3, 4, 5, 8, 13] {
            let a = ramp(len, 0.1);
            let b = ramp(len, 0.3);
            assert_relative_eq!(dot_portable(&a, &b), dot(&a, &b), max_relative = 1e-12);
        }
    }

    #[test]
    fn test_exact_small_case() {
        assert_eq!(dot_simd(&[1.0, 2.0, 3.0, 4.0, 5.0], &[1.0; 5]), 15.0);
    }

    #[test]
    fn test_lane_width_is_known() {
        assert!(matches!(lane_width(), 2 | 4));
        assert!(!instruction_set().is_empty());
    }

    #[test]
    fn test_kernel_resolved_once() {
        dot_simd(&[1.0, 2.0], &[3.0, 4.0]);
        let name = KERNEL.get().map(|k| k.name);
        assert_eq!(name, Some(instruction_set()));
    }

    #[test]
    #[should_panic]
    fn test_length_mismatch_panics() {
        dot_simd(&[1.0, 2.0], &[1.0]);
    }
}
