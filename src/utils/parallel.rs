//! Worker pool configuration and cooperative cancellation

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Configuration for parallel processing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Number of threads (None = use all available)
    pub n_threads: Option<usize>,
}

impl ParallelConfig {
    /// Create a new parallel configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set number of threads
    pub fn with_threads(mut self, n: usize) -> Self {
        self.n_threads = Some(n);
        self
    }

    /// Get the number of threads to use
    pub fn num_threads(&self) -> usize {
        self.n_threads
            .filter(|&n| n > 0)
            .unwrap_or_else(rayon::current_num_threads)
    }

    /// Build a dedicated pool sized by this configuration
    pub fn build_pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads())
            .thread_name(|i| format!("loanrisk-worker-{}", i))
            .build()
            .map_err(|e| PipelineError::Training(format!("cannot build worker pool: {}", e)))
    }
}

/// Shared flag checked between units of work
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; running tasks finish, pending tasks are skipped
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_pool_respects_thread_count() {
        let pool = ParallelConfig::new().with_threads(2).build_pool().unwrap();
        assert_eq!(pool.current_num_threads(), 2);

        let doubled: Vec<i32> = pool.install(|| (0..100).into_par_iter().map(|x| x * 2).collect());
        assert_eq!(doubled[99], 198);
    }

    #[test]
    fn test_zero_threads_falls_back_to_default() {
        let config = ParallelConfig::new().with_threads(0);
        assert_eq!(config.num_threads(), rayon::current_num_threads());
    }

    #[test]
    fn test_cancellation_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
