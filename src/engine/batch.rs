//! Bounded-concurrency dispatch of independent work items
//!
//! Items run on a dedicated rayon pool. Each worker sends its `(key, result)`
//! pair over a channel; a single collector thread owns the result map, so
//! workers never share mutable state.

use crate::error::RunError;
use anyhow::{Context, Result, anyhow};
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Mutex, MutexGuard, TryLockError};

/// A work item that failed or panicked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub message: String,
    pub panicked: bool,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.panicked {
            write!(f, "panicked: {}", self.message)
        } else {
            f.write_str(&self.message)
        }
    }
}

/// Per-key outcome of a batch
pub type BatchResults<K, T> = BTreeMap<K, std::result::Result<T, ItemFailure>>;

/// Run every item with at most `max_threads` in flight.
///
/// Keys must be unique. A failing or panicking item is recorded under its
/// key and never affects the others. The error case is reserved for the
/// runner itself (the pool could not be built).
pub fn run_batch<K, T, F>(
    items: Vec<(K, F)>,
    max_threads: usize,
    progress: Option<&ProgressBar>,
) -> Result<BatchResults<K, T>>
where
    K: Ord + Send,
    T: Send,
    F: FnOnce() -> Result<T> + Send,
{
    if items.is_empty() {
        return Ok(BTreeMap::new());
    }

    let threads = max_threads.min(items.len()).max(1);
    log::debug!("running {} items on {threads} workers", items.len());
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("fleetdiag-worker-{i}"))
        .build()
        .context("Failed to create worker pool")?;

    let (tx, rx) = mpsc::channel();

    std::thread::scope(|scope| {
        let collector = scope.spawn(move || {
            let mut results = BTreeMap::new();
            for (key, result) in rx {
                if let Some(pb) = progress {
                    pb.inc(1);
                }
                results.insert(key, result);
            }
            results
        });

        pool.install(|| {
            items.into_par_iter().for_each_with(tx, |tx, (key, work)| {
                let result = run_item(work);
                // The collector outlives every sender.
                let _ = tx.send((key, result));
            });
        });

        collector
            .join()
            .map_err(|_| anyhow!("result collector panicked"))
    })
}

fn run_item<T, F>(work: F) -> std::result::Result<T, ItemFailure>
where
    F: FnOnce() -> Result<T>,
{
    match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(ItemFailure {
            message: format!("{e:#}"),
            panicked: false,
        }),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(ItemFailure {
                message,
                panicked: true,
            })
        }
    }
}

// ============================================================================
// Run lock
// ============================================================================

/// Guard allowing a single fleet-wide run at a time
#[derive(Debug)]
pub struct RunLock(Mutex<()>);

impl RunLock {
    pub const fn new() -> Self {
        Self(Mutex::new(()))
    }

    /// Take the lock, or fail at once if another run holds it.
    pub fn try_acquire(&self) -> std::result::Result<MutexGuard<'_, ()>, RunError> {
        match self.0.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => Err(RunError::AlreadyRunning),
        }
    }
}

impl Default for RunLock {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide run lock
pub static FLEET_RUN_LOCK: RunLock = RunLock::new();
