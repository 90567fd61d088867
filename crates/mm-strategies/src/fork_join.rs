use mm_core::kernel::dot_column;
use mm_core::{Matrix, MultiplyStrategy, Result, Validation};
use tracing::debug;

use crate::config::EngineConfig;
use crate::output::SharedOutput;
use crate::partition::Region;
use crate::worker::catch_worker_panic;

/// Default largest leaf extent.
pub const DEFAULT_THRESHOLD: usize = 64;

/// Recursive quadrisection of the output on rayon's work-stealing pool.
///
/// A region splits into four quadrants at the midpoint of both axes until
/// rows and columns are both at most `threshold`; leaves run the scalar
/// triple loop. Leaves own disjoint rectangles, so no locking is needed.
#[derive(Debug, Clone)]
pub struct ForkJoinStrategy {
    threshold: usize,
    validation: Validation,
}

impl ForkJoinStrategy {
    pub fn new(threshold: usize) -> Self {
        ForkJoinStrategy {
            threshold: threshold.max(1),
            validation: Validation::Always,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.fork_join_threshold).with_validation(config.validation)
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

impl Default for ForkJoinStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl MultiplyStrategy for ForkJoinStrategy {
    fn name(&self) -> &str {
        "fork-join"
    }

    fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        self.validation.check(a, b)?;
        let m = a.rows();
        let p = b.cols();
        debug!(m, n = a.cols(), p, threshold = self.threshold, "fork-join multiply");

        let mut c = Matrix::zeros(m, p);
        let b_data = b.data();
        let out = SharedOutput::new(&mut c);
        catch_worker_panic(self.name(), || {
            for_each_leaf(Region::new(m, p), self.threshold, &|leaf| {
                for i in leaf.row_range() {
                    let a_row = a.row(i);
                    // SAFETY: leaves of one quadrisection never overlap.
                    let row = unsafe { out.row_segment(i, leaf.col_range()) };
                    for (cell, j) in row.iter_mut().zip(leaf.col_range()) {
                        *cell = dot_column(a_row, b_data, p, j);
                    }
                }
            })
        })?;
        Ok(c)
    }
}

/// Run `leaf` on every non-empty leaf of the quadrisection of `region`,
/// forking the four quadrants of each inner node through `rayon::join`.
pub(crate) fn for_each_leaf<F>(region: Region, threshold: usize, leaf: &F)
where
    F: Fn(Region) + Sync,
{
    if region.is_empty() {
        return;
    }
    if region.is_leaf(threshold) {
        leaf(region);
        return;
    }

    let [top_left, top_right, bottom_left, bottom_right] = region.quadrants();
    rayon::join(
        || {
            rayon::join(
                || for_each_leaf(top_left, threshold, leaf),
                || for_each_leaf(top_right, threshold, leaf),
            )
        },
        || {
            rayon::join(
                || for_each_leaf(bottom_left, threshold, leaf),
                || for_each_leaf(bottom_right, threshold, leaf),
            )
        },
    );
}
