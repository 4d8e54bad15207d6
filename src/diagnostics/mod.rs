//! Anomaly classification, counting and reporting.
//!
//! The instrumented paths never abort on a problem they detect. They build
//! an [`Anomaly`], count it, keep it in a small ring of recent anomalies and
//! hand it to the configured [`AnomalySink`].
//!
//! ## Diagnostic Codes
//!
//! | Code  | Meaning                              |
//! |-------|--------------------------------------|
//! | AS101 | Release of a null pointer            |
//! | AS102 | Release of an untracked pointer      |
//! | AS201 | Pointer index collision              |
//! | AS202 | Call site tracked by another context |
//! | AS301 | Double release                       |
//! | AS302 | Buffer overflow or size mismatch     |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use allocsite::diagnostics::CollectingSink;
//! use allocsite::{Malloc, SiteAlloc, TrackingConfig};
//!
//! let sink = Arc::new(CollectingSink::new());
//! let alloc = SiteAlloc::with_parts(TrackingConfig::default(), Malloc, Arc::clone(&sink));
//!
//! unsafe { alloc.release(std::ptr::null_mut(), None) };
//! assert_eq!(sink.anomalies()[0].diagnostic().code, "AS101");
//! ```

pub mod anomaly;
pub mod emit;
pub mod kind;
pub(crate) mod recorder;

pub use anomaly::{Anomaly, AnomalyKind};
#[cfg(feature = "log")]
pub use emit::LogSink;
pub use emit::{is_suppressed, suppress_diagnostics, AnomalySink, CollectingSink, NullSink, StderrSink};
pub use kind::{Diagnostic, DiagnosticKind, AS101, AS102, AS201, AS202, AS301, AS302};
pub use recorder::AnomalyCounts;
