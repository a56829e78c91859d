//! Failure Detection Module
//!
//! A single periodic task probes every live node and replaces the ones that stop answering.
//!
//! ## Cycle
//! 1. Retry replacements still owed from earlier cycles.
//! 2. Snapshot the members and probe them concurrently, each probe bounded by a timeout.
//!    A timeout counts as a miss, never as "unknown".
//! 3. A node that misses `failure_threshold` probes in a row is evicted from the ring
//!    first, then deprovisioned, then a replacement under a fresh name is requested.
//! 4. A failed replacement is logged and retried next cycle; routing carries on with less capacity.

pub mod probe;
pub mod service;

pub use probe::{HttpProber, Liveness, LivenessProber};
pub use service::{CycleReport, DetectorHandle, FailureDetector};
