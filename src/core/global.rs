//! Shared tracking state: the instrumented allocate and release paths.

use std::ptr::NonNull;
use std::sync::Arc;

use crate::api::callsite::{CallSite, CallSiteTable};
use crate::api::config::TrackingConfig;
use crate::api::error::AllocError;
use crate::api::kind::AllocKind;
use crate::api::stats::Snapshot;
use crate::core::index::PointerIndex;
use crate::core::quarantine::ReleaseQuarantine;
use crate::core::raw::RawAllocator;
use crate::core::registry::TrackerRegistry;
use crate::core::tracker::AllocationTracker;
use crate::core::trailer::{AllocationRecord, BlockLayout, RecordCheck};
use crate::diagnostics::anomaly::{Anomaly, AnomalyKind};
use crate::diagnostics::emit::AnomalySink;
use crate::diagnostics::recorder::{AnomalyCounts, AnomalyRecorder};

/// State shared by every clone of a [`SiteAlloc`](crate::SiteAlloc).
pub struct TrackingState {
    config: TrackingConfig,
    raw: Box<dyn RawAllocator>,
    index: PointerIndex,
    registry: TrackerRegistry,
    quarantine: ReleaseQuarantine,
    recorder: AnomalyRecorder,
    call_sites: CallSiteTable,
}

impl TrackingState {
    /// Create state on top of `raw`, reporting anomalies to `sink`.
    pub fn new(config: TrackingConfig, raw: Box<dyn RawAllocator>, sink: Arc<dyn AnomalySink>) -> Self {
        Self {
            index: PointerIndex::with_capacity(config.index_capacity),
            registry: TrackerRegistry::new(),
            quarantine: ReleaseQuarantine::new(config.quarantine_capacity),
            recorder: AnomalyRecorder::new(sink, config.recent_anomalies, config.report_untracked),
            call_sites: CallSiteTable::new(),
            raw,
            config,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Allocate `size` bytes attributed to `tracker`.
    ///
    /// Nothing is tracked if the raw allocation fails.
    pub fn allocate(
        &self,
        size: usize,
        align: Option<usize>,
        tracker: &'static AllocationTracker,
        kind: AllocKind,
        function: &'static str,
        zeroed: bool,
    ) -> Result<NonNull<u8>, AllocError> {
        let layout = BlockLayout::new(size, align)?;

        // SAFETY: BlockLayout only yields power-of-two alignments >= 8.
        let raw = unsafe {
            if zeroed {
                self.raw.raw_alloc_zeroed(layout.total(), layout.raw_align())
            } else {
                self.raw.raw_alloc(layout.total(), layout.raw_align())
            }
        };
        let base = NonNull::new(raw).ok_or(AllocError::OutOfMemory { size, align })?;
        let address = base.as_ptr() as usize;

        // The address is live again; a later release of it is not a double release.
        self.quarantine.forget(address);

        let record = layout.record_ptr(base);
        // SAFETY: the block is `layout.total()` bytes and the record offset is
        // aligned for `AllocationRecord`.
        unsafe {
            AllocationRecord::install(record, base, size, tracker);
            if self.config.fill_padding {
                layout.fill_padding(base);
            }
        }

        if let Err(collision) = self.index.insert(address, record as usize) {
            self.recorder.record(
                Anomaly::new(AnomalyKind::IndexCollision, collision.address).owned_by(tracker.identity()),
            );
        }

        tracker.record_allocation(size as u64);
        self.registry.ensure_registered(tracker, kind, function);
        if !self.registry.owns(tracker) && tracker.note_foreign_use() {
            self.recorder
                .record(Anomaly::new(AnomalyKind::ForeignTracker, address).owned_by(tracker.identity()));
        }

        Ok(base)
    }

    /// Release `ptr`, classifying anything odd about it.
    ///
    /// Every non-null pointer is handed to the raw allocator exactly once per
    /// call, tracked or not.
    pub fn release(&self, ptr: *mut u8, site: Option<CallSite>) {
        let Some(base) = NonNull::new(ptr) else {
            self.recorder.record(Anomaly::new(AnomalyKind::NullRelease, 0).at(site));
            return;
        };
        let address = base.as_ptr() as usize;

        match self.index.lookup(address) {
            Some(location) => self.release_tracked(base, location, site),
            None => {
                let kind = if self.quarantine.contains(address) {
                    AnomalyKind::DoubleRelease
                } else {
                    AnomalyKind::UntrackedRelease
                };
                self.recorder.record(Anomaly::new(kind, address).at(site));
            }
        }

        // SAFETY: caller passes pointers from this allocator (or memory it
        // would have freed anyway); detection does not prevent the free.
        unsafe { self.raw.raw_free(ptr) };
    }

    fn release_tracked(&self, base: NonNull<u8>, location: usize, site: Option<CallSite>) {
        let address = base.as_ptr() as usize;
        let Some(record) = NonNull::new(location as *mut AllocationRecord) else {
            return;
        };

        // SAFETY: the index only holds record locations installed by
        // `allocate` for blocks that have not been freed yet.
        let check = unsafe { RecordCheck::run(base, record, self.config.fill_padding) };
        let record = unsafe { record.as_ref() };

        // With a damaged guard the owner field may be garbage too.
        let trusted = |owner: NonNull<AllocationTracker>| {
            check.guard_intact || self.registry.contains(owner.as_ptr())
        };

        if !check.is_clean() {
            let mut anomaly = Anomaly::new(AnomalyKind::Overflow, address)
                .at(site)
                .with_recorded_size(check.recorded_size);
            if let Some(owner) = record.owner().filter(|o| trusted(*o)) {
                // SAFETY: trusted owners are linked, `'static` trackers.
                anomaly = anomaly.owned_by(unsafe { owner.as_ref() }.identity());
            }
            self.recorder.record(anomaly);
        }

        match record.take_owner() {
            None => {
                self.recorder
                    .record(Anomaly::new(AnomalyKind::DoubleRelease, address).at(site));
            }
            Some(owner) => {
                if trusted(owner) {
                    // SAFETY: as above.
                    unsafe { owner.as_ref() }.record_release(check.release_size());
                }
                // Quarantine first: a racing release that misses the index
                // must still find the address here.
                self.quarantine.admit(address);
                self.index.remove_if(address, location);
            }
        }
    }

    /// Counters of every registered site.
    pub fn snapshot(&self) -> Snapshot {
        self.registry.snapshot_all()
    }

    /// The registry of sites that have allocated through this state.
    pub fn registry(&self) -> &TrackerRegistry {
        &self.registry
    }

    /// Number of allocations currently in the pointer index.
    pub fn live_allocations(&self) -> usize {
        self.index.len()
    }

    /// Anomalies seen so far, per kind.
    pub fn anomaly_counts(&self) -> AnomalyCounts {
        self.recorder.counts()
    }

    /// Most recent anomalies, oldest first.
    pub fn recent_anomalies(&self) -> Vec<Anomaly> {
        self.recorder.recent()
    }

    /// Stable tracker for `site`, created on first use.
    pub fn tracker_for(&self, site: CallSite) -> &'static AllocationTracker {
        self.call_sites.tracker_for(site)
    }
}
