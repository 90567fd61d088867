//! Work partitioning for the parallel strategies.
//!
//! Every planner here splits an index space into pieces that cover it
//! exactly once, which is what lets concurrent workers write the output
//! without locks.

use std::ops::Range;

/// A rectangle of output cells: rows `[row_start, row_end)`, columns
/// `[col_start, col_end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
}

impl Region {
    /// The whole `rows x cols` output.
    pub fn new(rows: usize, cols: usize) -> Self {
        Region {
            row_start: 0,
            row_end: rows,
            col_start: 0,
            col_end: cols,
        }
    }

    pub fn rows(&self) -> usize {
        self.row_end - self.row_start
    }

    pub fn cols(&self) -> usize {
        self.col_end - self.col_start
    }

    pub fn is_empty(&self) -> bool {
        self.rows() == 0 || self.cols() == 0
    }

    pub fn row_range(&self) -> Range<usize> {
        self.row_start..self.row_end
    }

    pub fn col_range(&self) -> Range<usize> {
        self.col_start..self.col_end
    }

    /// True once both extents are at most `threshold`.
    pub fn is_leaf(&self, threshold: usize) -> bool {
        self.rows() <= threshold && self.cols() <= threshold
    }

    /// Split at the midpoint of both axes.
    ///
    /// Order: top-left, top-right, bottom-left, bottom-right. Quadrants may be
    /// empty when an axis has a single row or column.
    pub fn quadrants(&self) -> [Region; 4] {
        let row_mid = self.row_start + self.rows() / 2;
        let col_mid = self.col_start + self.cols() / 2;
        [
            Region {
                row_end: row_mid,
                col_end: col_mid,
                ..*self
            },
            Region {
                row_end: row_mid,
                col_start: col_mid,
                ..*self
            },
            Region {
                row_start: row_mid,
                col_end: col_mid,
                ..*self
            },
            Region {
                row_start: row_mid,
                col_start: col_mid,
                ..*self
            },
        ]
    }

    /// Non-empty leaves of the recursive quadrisection, depth first.
    pub fn leaves(&self, threshold: usize) -> Vec<Region> {
        let threshold = threshold.max(1);
        let mut out = Vec::new();
        let mut stack = vec![*self];
        while let Some(region) = stack.pop() {
            if region.is_empty() {
                continue;
            }
            if region.is_leaf(threshold) {
                out.push(region);
            } else {
                stack.extend(region.quadrants().into_iter().rev());
            }
        }
        out
    }
}

/// Split `rows` into at most `workers` contiguous ranges.
///
/// Each range has `max(1, rows / workers)` rows, the last one also takes the
/// remainder, and workers whose range would start past the end get nothing.
pub fn row_ranges(rows: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.max(1);
    let per_worker = (rows / workers).max(1);
    (0..workers)
        .map(|t| {
            let start = t * per_worker;
            let end = if t == workers - 1 {
                rows
            } else {
                (start + per_worker).min(rows)
            };
            start..end
        })
        .filter(|r| r.start < rows)
        .collect()
}

/// Split `cols` into strips of `width` columns, the last one possibly
/// narrower.
pub fn strip_ranges(cols: usize, width: usize) -> Vec<Range<usize>> {
    let width = width.max(1);
    (0..cols)
        .step_by(width)
        .map(|start| start..(start + width).min(cols))
        .collect()
}
