//! # allocsite
//!
//! Lightweight, always-on attribution of live heap memory to the call site
//! that allocated it.
//!
//! ## Features
//!
//! - One counter set per call site: live allocations, live bytes, frees
//! - Metadata trailer embedded in each block, no side allocation
//! - Lock-free pointer lookups on release, a single short writer lock
//! - Detection of null, untracked, double and overflowed releases
//! - Anomaly codes in the `AS1xx`..`AS3xx` ranges, routed to pluggable sinks
//! - On-demand snapshots with a plain-text dump
//!
//! Detection never aborts: anomalies are counted and reported, and the
//! memory is still handed to the underlying allocator.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use allocsite::{tracked_alloc, tracked_release, SiteAlloc, TrackingConfig};
//!
//! let alloc = SiteAlloc::new(TrackingConfig::default());
//!
//! let buf = tracked_alloc!(alloc, 4096).expect("out of memory");
//! // ... use buf ...
//! println!("{}", alloc.snapshot());
//! unsafe { tracked_release!(alloc, buf.as_ptr()) };
//! ```
//!
//! ## Cargo features
//!
//! - `parking_lot`: use parking_lot mutexes for the registry and index writer
//! - `log`: report anomalies through the `log` crate by default
//! - `diagnostics`: keep stderr reporting in release builds

pub mod api;
pub mod diagnostics;

mod core;
mod sync;
mod util;

// Re-export public API at crate root for convenience
pub use api::callsite::{CallSite, CallSiteTable};
pub use api::config::TrackingConfig;
pub use api::context::{global, init_with, shutdown, SiteAlloc};
#[cfg(unix)]
pub use api::context::init;
pub use api::error::AllocError;
pub use api::kind::AllocKind;
pub use api::stats::{SiteStats, Snapshot};

// Engine types
pub use crate::core::index::{IndexCollision, PointerIndex};
#[cfg(unix)]
pub use crate::core::raw::Malloc;
pub use crate::core::raw::RawAllocator;
pub use crate::core::registry::{TrackerIter, TrackerRegistry};
pub use crate::core::tracker::{AllocationTracker, TrackerIdentity};
pub use crate::core::trailer::{AllocationRecord, BlockLayout, PAD_PATTERN};

// Diagnostics
pub use diagnostics::{Anomaly, AnomalyCounts, AnomalyKind, AnomalySink};

#[doc(hidden)]
pub use api::callsite::__strip_function_name;
