//! Synchronization primitives.
//!
//! Provides thin wrappers over std or parking_lot mutexes, and the relaxed
//! atomic counters used by trackers.

pub(crate) mod atomics;
pub(crate) mod mutex;
