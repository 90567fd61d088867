use std::marker::PhantomData;
use std::ops::Range;

use mm_core::Matrix;

/// Output matrix shared by workers that each own a disjoint set of cells.
///
/// Handing out row segments through a shared reference lets recursive and
/// work-stealing schedulers address rectangles that are not contiguous in
/// memory. Disjointness is the caller's obligation; every access is still
/// bounds-checked.
pub(crate) struct SharedOutput<'a> {
    ptr: *mut f64,
    rows: usize,
    cols: usize,
    _marker: PhantomData<&'a mut [f64]>,
}

// SAFETY: the view only hands out `&mut` segments under the documented
// non-overlap contract, so moving or sharing it across threads is sound.
unsafe impl Send for SharedOutput<'_> {}
unsafe impl Sync for SharedOutput<'_> {}

impl<'a> SharedOutput<'a> {
    pub(crate) fn new(matrix: &'a mut Matrix) -> Self {
        let (rows, cols) = matrix.dims();
        SharedOutput {
            ptr: matrix.data_mut().as_mut_ptr(),
            rows,
            cols,
            _marker: PhantomData,
        }
    }

    /// Mutable view of `cols` within `row`.
    ///
    /// # Safety
    /// No other slice covering any of these cells may be alive while the
    /// returned slice is.
    ///
    /// # Panics
    /// Panics if the segment lies outside the matrix.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn row_segment(&self, row: usize, cols: Range<usize>) -> &mut [f64] {
        assert!(
            row < self.rows && cols.start <= cols.end && cols.end <= self.cols,
            "segment ({row}, {cols:?}) outside {}x{} output",
            self.rows,
            self.cols
        );
        std::slice::from_raw_parts_mut(self.ptr.add(row * self.cols + cols.start), cols.len())
    }
}
