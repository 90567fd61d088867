//! `mm-strategies` - Sequential, parallel and pipelined multiplication
//! strategies built on `mm-core`.
//!
//! Every strategy implements [`mm_core::MultiplyStrategy`]. Use
//! [`Registry::builtin`] to look them up by name, and
//! [`EngineConfig::from_env`] to tune thread counts, tiling and the
//! pipeline.

pub mod config;
pub mod fork_join;
mod output;
pub mod parallel_rows;
pub mod partition;
pub mod per_cell;
pub mod per_row;
pub mod pipeline;
pub mod registry;
pub mod row_ranges;
pub mod row_stealing;
pub mod tiled;
pub mod transpose;
mod worker;

pub use config::{available_parallelism, EngineConfig};
pub use fork_join::ForkJoinStrategy;
pub use parallel_rows::ParallelRowsSimdStrategy;
pub use partition::{row_ranges, strip_ranges, Region};
pub use per_cell::PerCellStrategy;
pub use per_row::PerRowStrategy;
pub use pipeline::{Message, PartialBlock, PipelineReport, PipelineStrategy, Stage, Strip};
pub use registry::{Factory, Registry};
pub use row_ranges::RowRangeStrategy;
pub use row_stealing::RowStealingStrategy;
pub use tiled::TiledForkJoinStrategy;
pub use transpose::TransposeStrategy;
