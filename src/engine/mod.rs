//! Execution engine for fleetdiag
//!
//! Dispatches per-node work on a bounded worker pool and guards full-fleet
//! runs with a process-wide lock.

pub mod batch;

pub use batch::{BatchResults, FLEET_RUN_LOCK, ItemFailure, RunLock, run_batch};
