use std::panic::{self, AssertUnwindSafe};
use std::thread::ScopedJoinHandle;

use mm_core::{MatmulError, Result};
use tracing::warn;

/// Run a parallel section and report a panic in any of its workers as
/// [`MatmulError::WorkerPanicked`].
///
/// rayon re-raises a task's panic on the thread that waits for the scope,
/// join or iterator, so catching it here covers every task the section
/// spawned. The partially written output is dropped by the caller.
pub(crate) fn catch_worker_panic<T>(stage: &str, section: impl FnOnce() -> T) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(section)).map_err(|_| {
        warn!(stage, "worker panicked");
        MatmulError::WorkerPanicked {
            stage: stage.to_string(),
        }
    })
}

/// Join every handle before looking at any result, then return the first
/// panic as [`MatmulError::WorkerPanicked`].
pub(crate) fn join_all<T>(stage: &str, handles: Vec<ScopedJoinHandle<'_, T>>) -> Result<Vec<T>> {
    let joined: Vec<_> = handles.into_iter().map(|h| h.join()).collect();
    joined
        .into_iter()
        .map(|r| {
            r.map_err(|_| {
                warn!(stage, "worker panicked");
                MatmulError::WorkerPanicked {
                    stage: stage.to_string(),
                }
            })
        })
        .collect()
}
