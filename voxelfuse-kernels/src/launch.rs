//! Workload launcher for the fusion kernels
//!
//! Every kernel is a stateless closure executed for each index in `[0, N)`
//! with no ordering guarantee. This module manages the thread pool behind
//! those launches and provides the one cross-workload primitive the kernels
//! are allowed: an atomic fetch-add slot counter for output reservation.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use voxelfuse_core::{Error, Result};

static GLOBAL_POOL: OnceLock<Arc<ThreadPool>> = OnceLock::new();
static LAUNCH_CONFIG: Mutex<LaunchConfig> = Mutex::new(LaunchConfig::new());

/// Thread pool configuration for kernel launches
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Number of threads to use (None = automatic)
    pub num_threads: Option<usize>,
    /// Thread name prefix
    pub thread_name_prefix: String,
    /// Enable parallel execution (can be disabled for debugging)
    pub enabled: bool,
    /// Workload counts below this run serially
    pub min_parallel_workloads: usize,
}

impl LaunchConfig {
    const fn new() -> Self {
        Self {
            num_threads: None,
            thread_name_prefix: String::new(),
            enabled: true,
            min_parallel_workloads: 64,
        }
    }

    /// Create default configuration
    pub fn default() -> Self {
        Self {
            num_threads: None,
            thread_name_prefix: "voxelfuse".to_string(),
            enabled: true,
            min_parallel_workloads: 64,
        }
    }

    /// Set number of threads
    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    /// Enable or disable parallel execution
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the serial fallback threshold
    pub fn with_min_parallel_workloads(mut self, min: usize) -> Self {
        self.min_parallel_workloads = min;
        self
    }
}

/// Initialize the global thread pool with custom configuration
pub fn init_launcher(config: LaunchConfig) -> Result<()> {
    if GLOBAL_POOL.get().is_some() {
        return Ok(()); // Already initialized
    }

    let mut builder = ThreadPoolBuilder::new();

    if let Some(num_threads) = config.num_threads {
        builder = builder.num_threads(num_threads);
    }

    if !config.thread_name_prefix.is_empty() {
        let prefix = config.thread_name_prefix.clone();
        builder = builder.thread_name(move |index| format!("{}-{}", prefix, index));
    }

    let pool = builder
        .build()
        .map_err(|e| Error::ThreadPool(format!("failed to create thread pool: {}", e)))?;

    if let Ok(mut global_config) = LAUNCH_CONFIG.lock() {
        *global_config = config;
    }

    GLOBAL_POOL
        .set(Arc::new(pool))
        .map_err(|_| Error::ThreadPool("thread pool already initialized".to_string()))?;

    Ok(())
}

/// Get the global thread pool, initializing with defaults if needed
pub fn get_pool() -> Arc<ThreadPool> {
    GLOBAL_POOL
        .get_or_init(|| {
            let pool = ThreadPoolBuilder::new()
                .num_threads(num_cpus::get())
                .thread_name(|index| format!("voxelfuse-{}", index))
                .build()
                .expect("failed to create default thread pool");
            Arc::new(pool)
        })
        .clone()
}

/// Get current launcher configuration
pub fn get_config() -> LaunchConfig {
    LAUNCH_CONFIG
        .lock()
        .map(|config| config.clone())
        .unwrap_or_else(|_| LaunchConfig::default())
}

/// Check if parallel execution is enabled
pub fn is_parallel_enabled() -> bool {
    get_config().enabled
}

/// Execute an operation on the global thread pool
pub fn execute_parallel<F, R>(op: F) -> R
where
    F: FnOnce() -> R + Send,
    R: Send,
{
    if is_parallel_enabled() {
        get_pool().install(op)
    } else {
        op()
    }
}

/// Launch a workload closure over `[0, n)`.
///
/// The closure runs once per index in unspecified order, in parallel on the
/// global pool unless parallelism is disabled or `n` is below the serial
/// threshold. The closure must not assume any cross-index ordering.
pub fn launch<F>(n: usize, op: F)
where
    F: Fn(usize) + Sync + Send,
{
    let config = get_config();
    if !config.enabled || n < config.min_parallel_workloads {
        for i in 0..n {
            op(i);
        }
        return;
    }

    get_pool().install(|| (0..n).into_par_iter().for_each(|i| op(i)));
}

/// Atomic slot counter for output buffer reservation.
///
/// The only cross-workload communication primitive inside a launch, besides
/// disjoint writes. `reserve` is a relaxed fetch-add; slots are handed out
/// densely from zero.
#[derive(Debug, Default)]
pub struct SlotCounter(AtomicI32);

impl SlotCounter {
    pub fn new() -> Self {
        Self(AtomicI32::new(0))
    }

    /// Claim the next slot, returning its index.
    pub fn reserve(&self) -> i32 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    /// Total number of reservations so far.
    pub fn value(&self) -> i32 {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_launch_covers_every_index() {
        let hits = AtomicUsize::new(0);
        launch(1000, |_| {
            hits.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(hits.load(Ordering::Relaxed), 1000);
    }

    #[test]
    fn test_launch_zero_workloads() {
        let hits = AtomicUsize::new(0);
        launch(0, |_| {
            hits.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(hits.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_launch_index_range() {
        let seen = (0..100).map(|_| AtomicUsize::new(0)).collect::<Vec<_>>();
        launch(100, |i| {
            seen[i].fetch_add(1, Ordering::Relaxed);
        });
        assert!(seen.iter().all(|s| s.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn test_slot_counter_dense() {
        let counter = SlotCounter::new();
        let mut slots = Vec::new();
        for _ in 0..10 {
            slots.push(counter.reserve());
        }
        assert_eq!(slots, (0..10).collect::<Vec<_>>());
        assert_eq!(counter.value(), 10);
    }

    #[test]
    fn test_config_builders() {
        let config = LaunchConfig::default()
            .with_threads(4)
            .with_enabled(false)
            .with_min_parallel_workloads(10);

        assert_eq!(config.num_threads, Some(4));
        assert!(!config.enabled);
        assert_eq!(config.min_parallel_workloads, 10);
    }
}
