//! Per-call-site allocation tracker.

use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU8, AtomicUsize, Ordering};
use std::sync::OnceLock;

use crate::api::kind::AllocKind;
use crate::api::stats::SiteStats;
use crate::sync::atomics::{AtomicCounter, AtomicGauge};

/// Identity of the call site a tracker belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackerIdentity {
    /// Enclosing function, known once the tracker has been registered.
    pub function: Option<&'static str>,
    /// Source file of the call site.
    pub file: &'static str,
    /// Line of the call site.
    pub line: u32,
}

impl std::fmt::Display for TrackerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {}:{}",
            self.function.unwrap_or("<unregistered>"),
            self.file,
            self.line
        )
    }
}

/// Aggregate counters for one call site.
///
/// Trackers live for the whole process: either as a `static` at the call
/// site (see [`site_tracker!`](crate::site_tracker)) or leaked by the
/// [`CallSiteTable`](crate::CallSiteTable). A tracker is linked into at most
/// one registry, the first one it allocates through. Allocating through a
/// second context is counted here but reported once as a
/// [`ForeignTracker`](crate::AnomalyKind::ForeignTracker) note.
///
/// Counters are updated with relaxed atomics. A reader may observe
/// `active_count` and `active_bytes` from slightly different moments.
pub struct AllocationTracker {
    file: &'static str,
    line: u32,
    function: OnceLock<&'static str>,
    kind: AtomicU8,

    active_count: AtomicGauge,
    active_bytes: AtomicGauge,
    free_count: AtomicCounter,

    /// Set under the registry lock once the tracker is in the list.
    pub(crate) linked: AtomicBool,
    /// Id of the registry holding the tracker, 0 while unlinked.
    pub(crate) registry_id: AtomicUsize,
    foreign_noted: AtomicBool,
    /// Next tracker in the registry list; written once before publication.
    pub(crate) next: AtomicPtr<AllocationTracker>,
}

impl AllocationTracker {
    /// Create a tracker for the call site at `file:line`.
    pub const fn new(file: &'static str, line: u32) -> Self {
        Self {
            file,
            line,
            function: OnceLock::new(),
            kind: AtomicU8::new(AllocKind::NotSet as u8),
            active_count: AtomicGauge::new(0),
            active_bytes: AtomicGauge::new(0),
            free_count: AtomicCounter::new(0),
            linked: AtomicBool::new(false),
            registry_id: AtomicUsize::new(0),
            foreign_noted: AtomicBool::new(false),
            next: AtomicPtr::new(std::ptr::null_mut()),
        }
    }

    /// Create a tracker with process lifetime on the heap.
    pub fn leak(file: &'static str, line: u32) -> &'static Self {
        Box::leak(Box::new(Self::new(file, line)))
    }

    /// Count one new allocation of `size` bytes.
    #[inline]
    pub fn record_allocation(&self, size: u64) {
        self.active_count.add(1);
        self.active_bytes.add(size);
    }

    /// Count the release of one allocation of `size` bytes.
    #[inline]
    pub fn record_release(&self, size: u64) {
        self.active_count.sub(1);
        self.active_bytes.sub(size);
        self.free_count.increment();
    }

    /// Fill in kind and function name. Only the registry calls this, under
    /// its lock, so the first registration wins.
    pub(crate) fn set_identity(&self, kind: AllocKind, function: &'static str) {
        if self.kind() == AllocKind::NotSet {
            self.kind.store(kind as u8, Ordering::Relaxed);
        }
        let _ = self.function.set(function);
    }

    /// Returns `true` the first time only.
    pub(crate) fn note_foreign_use(&self) -> bool {
        !self.foreign_noted.swap(true, Ordering::Relaxed)
    }

    /// Whether the tracker has been linked into a registry.
    pub fn is_linked(&self) -> bool {
        self.linked.load(Ordering::Acquire)
    }

    /// Allocation kind, `NotSet` until first registration.
    pub fn kind(&self) -> AllocKind {
        AllocKind::from(self.kind.load(Ordering::Relaxed))
    }

    /// Call site identity.
    pub fn identity(&self) -> TrackerIdentity {
        TrackerIdentity {
            function: self.function.get().copied(),
            file: self.file,
            line: self.line,
        }
    }

    /// Allocations attributed to this site and not yet released.
    pub fn active_count(&self) -> u64 {
        self.active_count.get()
    }

    /// Bytes attributed to this site and not yet released.
    pub fn active_bytes(&self) -> u64 {
        self.active_bytes.get()
    }

    /// Releases processed for this site.
    pub fn free_count(&self) -> u64 {
        self.free_count.get()
    }

    /// Point-in-time view of the counters.
    pub fn stats(&self) -> SiteStats {
        SiteStats {
            identity: self.identity(),
            kind: self.kind(),
            active_count: self.active_count(),
            active_bytes: self.active_bytes(),
            free_count: self.free_count(),
        }
    }
}

impl std::fmt::Debug for AllocationTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocationTracker")
            .field("identity", &self.identity())
            .field("kind", &self.kind())
            .field("active_count", &self.active_count())
            .field("active_bytes", &self.active_bytes())
            .field("free_count", &self.free_count())
            .field("linked", &self.is_linked())
            .finish()
    }
}
