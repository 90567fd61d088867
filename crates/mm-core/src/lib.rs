//! `mm-core` - Matrix type and strategy contract for the multiplication engine.
//!
//! This crate provides:
//! - A dense row-major `Matrix` of `f64`
//! - The `MultiplyStrategy` trait every algorithm implements
//! - `NaiveStrategy`, the reference implementation
//! - Scalar and SIMD dot-product kernels
//! - `self_test`, the relative-error gate against the reference

pub mod error;
pub mod kernel;
pub mod matrix;
pub mod reference;
pub mod strategy;
pub mod verify;

// Re-export primary types at the crate root for convenience.
pub use error::{MatmulError, Result};
pub use matrix::Matrix;
pub use reference::NaiveStrategy;
pub use strategy::{check_dims, MultiplyStrategy, Validation};
pub use verify::{self_test, ErrorReport, MAX_RELATIVE_ERROR_PCT};
