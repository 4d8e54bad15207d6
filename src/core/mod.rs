//! The tracking engine: trailers, trackers, the registry, the pointer index
//! and the instrumented allocate/release paths that tie them together.

pub mod global;
pub mod index;
pub mod raw;
pub mod registry;
pub mod tracker;
pub mod trailer;

pub(crate) mod quarantine;
