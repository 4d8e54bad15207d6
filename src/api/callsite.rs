//! Call-site identification and the macros that wire a call site to its
//! tracker.
//!
//! Each macro invocation owns a `static` [`AllocationTracker`], so one
//! source location always maps to the same tracker without any lookup.
//! Code that cannot hold a static (generated code, FFI shims) can use
//! [`CallSiteTable`] instead, which hands out one leaked tracker per
//! `(file, line, column)`.
//!
//! # Example
//!
//! ```rust,no_run
//! use allocsite::{tracked_alloc, tracked_release, SiteAlloc, TrackingConfig};
//!
//! let alloc = SiteAlloc::new(TrackingConfig::default());
//! let block = tracked_alloc!(alloc, 256).expect("out of memory");
//! unsafe { tracked_release!(alloc, block.as_ptr()) };
//! ```

use std::collections::HashMap;

use crate::core::tracker::AllocationTracker;
use crate::sync::mutex::Mutex;

/// A source location that allocates or releases memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallSite {
    /// Enclosing function path.
    pub function: &'static str,
    /// Source file.
    pub file: &'static str,
    /// Line.
    pub line: u32,
    /// Column.
    pub column: u32,
}

impl CallSite {
    /// Create a call site.
    pub const fn new(function: &'static str, file: &'static str, line: u32, column: u32) -> Self {
        Self {
            function,
            file,
            line,
            column,
        }
    }
}

impl std::fmt::Display for CallSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}:{}:{})", self.function, self.file, self.line, self.column)
    }
}

/// Maps call sites to trackers that live for the rest of the process.
pub struct CallSiteTable {
    sites: Mutex<HashMap<(&'static str, u32, u32), &'static AllocationTracker>>,
}

impl CallSiteTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            sites: Mutex::new(HashMap::new()),
        }
    }

    /// The tracker for `site`, created on first request.
    pub fn tracker_for(&self, site: CallSite) -> &'static AllocationTracker {
        let mut sites = self.sites.lock();
        *sites
            .entry((site.file, site.line, site.column))
            .or_insert_with(|| AllocationTracker::leak(site.file, site.line))
    }

    /// Number of distinct sites seen.
    pub fn len(&self) -> usize {
        self.sites.lock().len()
    }

    /// Whether no site has been seen.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CallSiteTable {
    fn default() -> Self {
        Self::new()
    }
}

#[doc(hidden)]
pub fn __strip_function_name(name: &'static str) -> &'static str {
    let mut name = name.strip_suffix("::__f").unwrap_or(name);
    while let Some(outer) = name.strip_suffix("::{{closure}}") {
        name = outer;
    }
    name
}

/// Path of the enclosing function, e.g. `my_crate::module::function`.
#[macro_export]
macro_rules! function_name {
    () => {{
        fn __f() {}
        fn __type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        $crate::__strip_function_name(__type_name_of(__f))
    }};
}

/// The current [`CallSite`](crate::CallSite).
#[macro_export]
macro_rules! call_site {
    () => {
        $crate::CallSite::new($crate::function_name!(), file!(), line!(), column!())
    };
}

/// A `&'static AllocationTracker` owned by this exact invocation.
#[macro_export]
macro_rules! site_tracker {
    () => {{
        static __TRACKER: $crate::AllocationTracker = $crate::AllocationTracker::new(file!(), line!());
        &__TRACKER
    }};
}

/// Allocate `size` bytes attributed to the invoking line.
#[macro_export]
macro_rules! tracked_alloc {
    ($alloc:expr, $size:expr) => {
        $alloc.allocate(
            $size,
            None,
            $crate::site_tracker!(),
            $crate::AllocKind::HeapAlloc,
            $crate::function_name!(),
        )
    };
}

/// Allocate `size` bytes aligned to `align`, attributed to the invoking line.
#[macro_export]
macro_rules! tracked_aligned {
    ($alloc:expr, $size:expr, $align:expr) => {
        $alloc.allocate(
            $size,
            Some($align),
            $crate::site_tracker!(),
            $crate::AllocKind::HeapAlloc,
            $crate::function_name!(),
        )
    };
}

/// Allocate `count * size` zeroed bytes attributed to the invoking line.
#[macro_export]
macro_rules! tracked_zeroed {
    ($alloc:expr, $count:expr, $size:expr) => {
        $alloc.allocate_zeroed(
            $count,
            $size,
            None,
            $crate::site_tracker!(),
            $crate::function_name!(),
        )
    };
}

/// Move `value` into a tracked allocation, returning `NonNull<T>`.
#[macro_export]
macro_rules! tracked_new {
    ($alloc:expr, $value:expr) => {
        $alloc.allocate_object($value, $crate::site_tracker!(), $crate::function_name!())
    };
}

/// Allocate uninitialized storage for `len` values of `T`.
#[macro_export]
macro_rules! tracked_new_array {
    ($alloc:expr, $ty:ty, $len:expr) => {
        $alloc.allocate_array::<$ty>($len, $crate::site_tracker!(), $crate::function_name!())
    };
}

/// Release a raw pointer, reporting anomalies against the invoking line.
///
/// Expands to a call of the unsafe [`SiteAlloc::release`](crate::SiteAlloc::release).
#[macro_export]
macro_rules! tracked_release {
    ($alloc:expr, $ptr:expr) => {
        $alloc.release(($ptr).cast::<u8>() as *mut u8, Some($crate::call_site!()))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_name() {
        let name = crate::function_name!();
        assert!(name.ends_with("test_function_name"), "{}", name);

        let in_closure = (|| crate::function_name!())();
        assert_eq!(in_closure, name);
    }

    #[test]
    fn test_call_site_display() {
        let site = CallSite::new("demo::run", "src/demo.rs", 3, 9);
        assert_eq!(site.to_string(), "demo::run (src/demo.rs:3:9)");

        let here = crate::call_site!();
        assert_eq!(here.file, file!());
    }

    #[test]
    fn test_table_is_stable_per_site() {
        let table = CallSiteTable::new();
        let a = CallSite::new("demo::a", "src/demo.rs", 10, 1);
        let b = CallSite::new("demo::a", "src/demo.rs", 10, 20);

        let first = table.tracker_for(a);
        assert!(std::ptr::eq(first, table.tracker_for(a)));
        assert!(!std::ptr::eq(first, table.tracker_for(b)));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_site_tracker_is_per_invocation() {
        fn tracker() -> &'static AllocationTracker {
            crate::site_tracker!()
        }
        assert!(std::ptr::eq(tracker(), tracker()));
        let other: &'static AllocationTracker = crate::site_tracker!();
        assert!(!std::ptr::eq(tracker(), other));
    }
}
