//! The tracking context handle and the process-wide default instance.

use std::mem::{align_of, size_of};
use std::ptr::NonNull;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::api::callsite::CallSite;
use crate::api::config::TrackingConfig;
use crate::api::error::AllocError;
use crate::api::kind::AllocKind;
use crate::api::stats::{SiteStats, Snapshot};
use crate::core::global::TrackingState;
use crate::core::raw::RawAllocator;
use crate::core::tracker::AllocationTracker;
use crate::diagnostics::anomaly::Anomaly;
use crate::diagnostics::emit::AnomalySink;
use crate::diagnostics::recorder::AnomalyCounts;
use crate::sync::mutex::Mutex;

/// Alignment the platform allocator guarantees without being asked.
const DEFAULT_NEW_ALIGN: usize = 16;

/// A per-call-site allocation tracker.
///
/// This is the entry point for instrumented allocation. It is cheap to
/// clone (internally uses `Arc`) and thread-safe.
///
/// # Example
///
/// ```rust,no_run
/// use allocsite::{site_tracker, AllocKind, SiteAlloc, TrackingConfig};
///
/// let alloc = SiteAlloc::new(TrackingConfig::default());
/// let ptr = alloc
///     .allocate(100, None, site_tracker!(), AllocKind::HeapAlloc, "main")
///     .expect("out of memory");
///
/// println!("{}", alloc.snapshot());
/// unsafe { alloc.release(ptr.as_ptr(), None) };
/// ```
#[derive(Clone)]
pub struct SiteAlloc {
    inner: Arc<TrackingState>,
}

impl SiteAlloc {
    /// Create a context over the C allocator.
    #[cfg(unix)]
    pub fn new(config: TrackingConfig) -> Self {
        Self::with_raw(config, crate::core::raw::Malloc)
    }

    /// Create a context with default configuration.
    #[cfg(unix)]
    pub fn with_defaults() -> Self {
        Self::new(TrackingConfig::default())
    }

    /// Create a context over a custom raw allocator.
    pub fn with_raw<R: RawAllocator + 'static>(config: TrackingConfig, raw: R) -> Self {
        Self::with_parts(config, raw, default_sink())
    }

    /// Create a context with a custom raw allocator and anomaly sink.
    pub fn with_parts<R, S>(config: TrackingConfig, raw: R, sink: S) -> Self
    where
        R: RawAllocator + 'static,
        S: AnomalySink + 'static,
    {
        Self {
            inner: Arc::new(TrackingState::new(config, Box::new(raw), Arc::new(sink))),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &TrackingConfig {
        self.inner.config()
    }

    /// Allocate `size` bytes attributed to `tracker`.
    ///
    /// `align`, when given, must be a power of two. The first allocation
    /// through a tracker links it into this context's registry and fixes
    /// its kind and function name.
    pub fn allocate(
        &self,
        size: usize,
        align: Option<usize>,
        tracker: &'static AllocationTracker,
        kind: AllocKind,
        function: &'static str,
    ) -> Result<NonNull<u8>, AllocError> {
        self.inner.allocate(size, align, tracker, kind, function, false)
    }

    /// Allocate `count * size` zeroed bytes attributed to `tracker`.
    pub fn allocate_zeroed(
        &self,
        count: usize,
        size: usize,
        align: Option<usize>,
        tracker: &'static AllocationTracker,
        function: &'static str,
    ) -> Result<NonNull<u8>, AllocError> {
        let total = count
            .checked_mul(size)
            .ok_or(AllocError::SizeOverflow { size: usize::MAX })?;
        self.inner
            .allocate(total, align, tracker, AllocKind::ZeroedHeapAlloc, function, true)
    }

    /// Move `value` into a tracked allocation.
    pub fn allocate_object<T>(
        &self,
        value: T,
        tracker: &'static AllocationTracker,
        function: &'static str,
    ) -> Result<NonNull<T>, AllocError> {
        let (align, kind) = object_request::<T>(AllocKind::ObjectNew, AllocKind::AlignedObjectNew);
        let ptr = self
            .inner
            .allocate(size_of::<T>(), align, tracker, kind, function, false)?
            .cast::<T>();
        // SAFETY: fresh block of at least size_of::<T>() bytes, aligned for T.
        unsafe { ptr.as_ptr().write(value) };
        Ok(ptr)
    }

    /// Allocate uninitialized storage for `len` values of `T`.
    pub fn allocate_array<T>(
        &self,
        len: usize,
        tracker: &'static AllocationTracker,
        function: &'static str,
    ) -> Result<NonNull<T>, AllocError> {
        let size = size_of::<T>()
            .checked_mul(len)
            .ok_or(AllocError::SizeOverflow { size: usize::MAX })?;
        let (align, kind) = object_request::<T>(AllocKind::ArrayNew, AllocKind::AlignedArrayNew);
        self.inner
            .allocate(size, align, tracker, kind, function, false)
            .map(NonNull::cast)
    }

    /// Release `ptr`.
    ///
    /// Null, untracked, double released and overflowed pointers are reported
    /// to the anomaly sink; `site` is attached to those reports. Every
    /// non-null pointer is passed on to the raw allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a block the raw allocator can free. Releasing a
    /// pointer twice is detected but still reaches the raw allocator.
    pub unsafe fn release(&self, ptr: *mut u8, site: Option<CallSite>) {
        self.inner.release(ptr, site);
    }

    /// Drop the value at `ptr` in place, then release it.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`SiteAlloc::allocate_object`] on this context
    /// and hold an initialized value.
    pub unsafe fn release_object<T>(&self, ptr: NonNull<T>, site: Option<CallSite>) {
        std::ptr::drop_in_place(ptr.as_ptr());
        self.release(ptr.as_ptr().cast(), site);
    }

    /// Counters of every site that has allocated through this context.
    pub fn snapshot(&self) -> Snapshot {
        self.inner.snapshot()
    }

    /// Sites above the configured report threshold, largest first, and
    /// the remaining sites.
    pub fn report(&self) -> (Vec<SiteStats>, Vec<SiteStats>) {
        self.snapshot().split_at(self.config().report_threshold)
    }

    /// Number of sites linked into the registry.
    pub fn registered_sites(&self) -> usize {
        self.inner.registry().len()
    }

    /// Number of tracked allocations not yet released.
    pub fn live_allocations(&self) -> usize {
        self.inner.live_allocations()
    }

    /// Anomalies seen so far, per kind.
    pub fn anomaly_counts(&self) -> AnomalyCounts {
        self.inner.anomaly_counts()
    }

    /// Most recent reported anomalies, oldest first.
    pub fn recent_anomalies(&self) -> Vec<Anomaly> {
        self.inner.recent_anomalies()
    }

    /// Stable tracker for `site`, for callers that cannot hold a static one.
    pub fn tracker_for(&self, site: CallSite) -> &'static AllocationTracker {
        self.inner.tracker_for(site)
    }

    /// Whether two handles share the same state.
    pub fn ptr_eq(&self, other: &SiteAlloc) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for SiteAlloc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteAlloc")
            .field("config", self.config())
            .field("registered_sites", &self.registered_sites())
            .field("live_allocations", &self.live_allocations())
            .finish()
    }
}

fn object_request<T>(plain: AllocKind, aligned: AllocKind) -> (Option<usize>, AllocKind) {
    let align = align_of::<T>();
    let kind = if align > DEFAULT_NEW_ALIGN { aligned } else { plain };
    // Record alignment (8) is always provided; ask only for more than that.
    (if align > 8 { Some(align) } else { None }, kind)
}

#[cfg(feature = "log")]
fn default_sink() -> crate::diagnostics::emit::LogSink {
    crate::diagnostics::emit::LogSink
}

#[cfg(not(feature = "log"))]
fn default_sink() -> crate::diagnostics::emit::StderrSink {
    crate::diagnostics::emit::StderrSink
}

// =============================================================================
// Process-wide instance
// =============================================================================

static GLOBAL: ArcSwapOption<TrackingState> = ArcSwapOption::const_empty();
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Install the process-wide context, created with `config`.
///
/// Returns the already installed context if there is one.
#[cfg(unix)]
pub fn init(config: TrackingConfig) -> SiteAlloc {
    install(|| SiteAlloc::new(config))
}

/// Install `alloc` as the process-wide context.
///
/// Returns the already installed context if there is one.
pub fn init_with(alloc: SiteAlloc) -> SiteAlloc {
    install(|| alloc)
}

fn install(make: impl FnOnce() -> SiteAlloc) -> SiteAlloc {
    let _guard = INIT_LOCK.lock();
    if let Some(inner) = GLOBAL.load_full() {
        return SiteAlloc { inner };
    }
    let alloc = make();
    GLOBAL.store(Some(Arc::clone(&alloc.inner)));
    alloc
}

/// The process-wide context, if [`init`] has run.
pub fn global() -> Option<SiteAlloc> {
    GLOBAL.load_full().map(|inner| SiteAlloc { inner })
}

/// Uninstall the process-wide context and return its final snapshot.
///
/// Handles obtained earlier keep working.
pub fn shutdown() -> Option<Snapshot> {
    let _guard = INIT_LOCK.lock();
    let inner = GLOBAL.swap(None)?;
    let snapshot = inner.snapshot();

    #[cfg(feature = "log")]
    log::info!(
        "allocsite shutting down: {} sites, {} live allocations, {} bytes still attributed",
        snapshot.len(),
        inner.live_allocations(),
        snapshot.total_active_bytes()
    );

    Some(snapshot)
}
