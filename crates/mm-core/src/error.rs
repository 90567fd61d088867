use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatmulError {
    #[error("matmul dimension mismatch: [{a_rows}x{a_cols}] @ [{b_rows}x{b_cols}]")]
    DimensionMismatch {
        a_rows: usize,
        a_cols: usize,
        b_rows: usize,
        b_cols: usize,
    },
    #[error("ragged row {row}: expected {expected} columns, got {got}")]
    RaggedRows {
        row: usize,
        expected: usize,
        got: usize,
    },
    #[error("data length {len} does not match {rows}x{cols}")]
    DataLength { rows: usize, cols: usize, len: usize },
    #[error("{strategy}: max relative error {max_error_pct:.4}% exceeds {threshold_pct}%")]
    CorrectnessViolation {
        strategy: String,
        max_error_pct: f64,
        threshold_pct: f64,
    },
    #[error("{stage} stage interrupted: {reason}")]
    Interrupted { stage: String, reason: String },
    #[error("{stage} worker panicked")]
    WorkerPanicked { stage: String },
    #[error("{stage} stage timed out after {timeout:?}")]
    StageTimeout { stage: String, timeout: Duration },
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),
    #[error("thread pool: {0}")]
    ThreadPool(String),
    #[error("invalid config value for {key}: {value:?}")]
    Config { key: String, value: String },
}

pub type Result<T> = std::result::Result<T, MatmulError>;
