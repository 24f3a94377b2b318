//! Sized worker pools for fork-join regions
//!
//! Kernels that run in parallel take a [`WorkerPool`] instead of using the
//! global rayon pool, so a caller can pin the thread count of one solver run
//! without touching process-wide state.
//!
//! # Environment Variables
//!
//! - `SPTOL_NUM_THREADS`: default worker count when none is given explicitly
//!
//! # Examples
//!
//! ```
//! use sptol_core::WorkerPool;
//!
//! let pool = WorkerPool::new(2).unwrap();
//! assert_eq!(pool.nthreads(), 2);
//! let sum: usize = pool.install(|| (1..=4).sum());
//! assert_eq!(sum, 10);
//! ```

use crate::error::{SptError, SptResult};
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Environment variable consulted by [`default_num_threads`]
pub const NUM_THREADS_ENV: &str = "SPTOL_NUM_THREADS";

/// Worker count from `SPTOL_NUM_THREADS`, falling back to rayon's CPU count
///
/// Unparsable or zero values are ignored.
pub fn default_num_threads() -> usize {
    std::env::var(NUM_THREADS_ENV)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or_else(rayon::current_num_threads)
}

/// A rayon thread pool with a fixed number of workers
#[derive(Debug)]
pub struct WorkerPool {
    pool: ThreadPool,
    nthreads: usize,
}

impl WorkerPool {
    /// Create a pool with exactly `nthreads` workers
    ///
    /// # Errors
    ///
    /// - `ValueError` if `nthreads == 0`
    /// - `Internal` if the operating system refuses to spawn the workers
    pub fn new(nthreads: usize) -> SptResult<Self> {
        if nthreads == 0 {
            return Err(SptError::value_error(
                "WorkerPool::new",
                "thread count must be at least 1",
            ));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(nthreads)
            .thread_name(|i| format!("sptol-worker-{}", i))
            .build()
            .map_err(|e| SptError::internal(format!("failed to build thread pool: {}", e)))?;
        Ok(Self { pool, nthreads })
    }

    /// Create a pool sized by [`default_num_threads`]
    pub fn from_env() -> SptResult<Self> {
        Self::new(default_num_threads())
    }

    /// Number of workers
    pub fn nthreads(&self) -> usize {
        self.nthreads
    }

    /// Run `op` inside the pool; rayon iterators used by `op` run on its workers
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}

/// Split `0..len` into at most `parts` contiguous, nearly equal ranges
pub fn partition_ranges(len: usize, parts: usize) -> Vec<std::ops::Range<usize>> {
    let parts = parts.max(1).min(len.max(1));
    let base = len / parts;
    let extra = len % parts;
    let mut start = 0;
    (0..parts)
        .map(|p| {
            let size = base + usize::from(p < extra);
            let range = start..start + size;
            start += size;
            range
        })
        .collect()
}
