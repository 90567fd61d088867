use mm_core::kernel::dot_simd;
use mm_core::{Matrix, MultiplyStrategy, Result, Validation};
use tracing::debug;

use crate::config::EngineConfig;
use crate::fork_join::for_each_leaf;
use crate::output::SharedOutput;
use crate::partition::Region;
use crate::worker::catch_worker_panic;

/// Default tile edge.
pub const DEFAULT_TILE: usize = 64;

/// Quadrisection over the transposed right operand with cache tiling and
/// the SIMD micro-kernel in the leaves.
///
/// Leaves are at most `2 * tile` on each side. Inside a leaf the iteration
/// space is walked in `tile`-sized blocks over rows, columns and the
/// reduction dimension; each k-block adds one micro-kernel partial sum into
/// the zero-initialised output cell.
#[derive(Debug, Clone)]
pub struct TiledForkJoinStrategy {
    tile: usize,
    validation: Validation,
}

impl TiledForkJoinStrategy {
    pub fn new(tile: usize) -> Self {
        TiledForkJoinStrategy {
            tile: tile.max(1),
            validation: Validation::Always,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.tile_size).with_validation(config.validation)
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }

    pub fn tile(&self) -> usize {
        self.tile
    }

    fn leaf_threshold(&self) -> usize {
        self.tile.saturating_mul(2)
    }
}

impl Default for TiledForkJoinStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_TILE)
    }
}

impl MultiplyStrategy for TiledForkJoinStrategy {
    fn name(&self) -> &str {
        "fork-join-simd-tiled"
    }

    fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        self.validation.check(a, b)?;
        let m = a.rows();
        let n = a.cols();
        let p = b.cols();
        debug!(m, n, p, tile = self.tile, "tiled fork-join multiply");

        let mut c = Matrix::zeros(m, p);
        if c.is_empty() {
            return Ok(c);
        }

        let bt = b.transpose();
        let tile = self.tile;
        let out = SharedOutput::new(&mut c);
        catch_worker_panic(self.name(), || {
            for_each_leaf(Region::new(m, p), self.leaf_threshold(), &|leaf| {
                // SAFETY: leaves of one quadrisection never overlap.
                unsafe { multiply_leaf(a, &bt, &out, leaf, tile) }
            })
        })?;
        Ok(c)
    }
}

/// # Safety
/// `leaf` must not overlap any region written concurrently through `out`.
unsafe fn multiply_leaf(a: &Matrix, bt: &Matrix, out: &SharedOutput<'_>, leaf: Region, tile: usize) {
    let n = a.cols();
    for i0 in leaf.row_range().step_by(tile) {
        let i1 = (i0 + tile).min(leaf.row_end);
        for j0 in leaf.col_range().step_by(tile) {
            let j1 = (j0 + tile).min(leaf.col_end);
            for k0 in (0..n).step_by(tile) {
                let k1 = (k0 + tile).min(n);
                for i in i0..i1 {
                    let a_block = &a.row(i)[k0..k1];
                    let row = out.row_segment(i, j0..j1);
                    for (cell, j) in row.iter_mut().zip(j0..j1) {
                        *cell += dot_simd(a_block, &bt.row(j)[k0..k1]);
                    }
                }
            }
        }
    }
}
