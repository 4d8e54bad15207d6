//! Registry of every tracker that has recorded an allocation.
//!
//! An intrusive singly linked list threaded through the trackers' `next`
//! fields. The registry owns only the linkage, never the trackers.
//! Membership is permanent, so the list reports historical activity per
//! site, not only current leakers.

use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use crate::api::kind::AllocKind;
use crate::api::stats::Snapshot;
use crate::core::tracker::AllocationTracker;
use crate::sync::mutex::Mutex;

static NEXT_REGISTRY_ID: AtomicUsize = AtomicUsize::new(1);

/// Process-wide list of trackers, newest first.
pub struct TrackerRegistry {
    id: usize,
    head: AtomicPtr<AllocationTracker>,
    len: AtomicUsize,
    /// Serializes the linked-check and the push as one unit.
    lock: Mutex<()>,
}

impl TrackerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            head: AtomicPtr::new(ptr::null_mut()),
            len: AtomicUsize::new(0),
            lock: Mutex::new(()),
        }
    }

    /// Link `tracker` into the list if it is not linked yet.
    ///
    /// Kind and function name are filled in on first registration. Returns
    /// `true` if this call performed the link.
    pub fn ensure_registered(
        &self,
        tracker: &'static AllocationTracker,
        kind: AllocKind,
        function: &'static str,
    ) -> bool {
        // Skipping on an already-set flag is safe: `linked` never goes back
        // to false. The decision to push is only made under the lock.
        if tracker.is_linked() {
            return false;
        }

        let _guard = self.lock.lock();
        if tracker.linked.load(Ordering::Relaxed) {
            return false;
        }

        tracker.set_identity(kind, function);
        let node = tracker as *const AllocationTracker as *mut AllocationTracker;
        tracker.next.store(self.head.load(Ordering::Relaxed), Ordering::Relaxed);
        self.head.store(node, Ordering::Release);
        tracker.registry_id.store(self.id, Ordering::Relaxed);
        tracker.linked.store(true, Ordering::Release);
        self.len.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Whether `tracker` is linked into this registry rather than another.
    pub fn owns(&self, tracker: &AllocationTracker) -> bool {
        tracker.is_linked() && tracker.registry_id.load(Ordering::Relaxed) == self.id
    }

    /// Number of linked trackers.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Whether no tracker has been linked yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Walk the list from the head without taking the lock.
    pub fn iter(&self) -> TrackerIter<'_> {
        TrackerIter {
            next: self.head.load(Ordering::Acquire),
            _registry: std::marker::PhantomData,
        }
    }

    /// Whether `candidate` points at a tracker in this list.
    ///
    /// Linear; only used to vet owner pointers read from a damaged record.
    pub fn contains(&self, candidate: *const AllocationTracker) -> bool {
        self.iter().any(|tracker| ptr::eq(tracker, candidate))
    }

    /// Counters of every linked tracker plus the grand total of active bytes.
    pub fn snapshot_all(&self) -> Snapshot {
        let mut snapshot = Snapshot::default();
        for tracker in self.iter() {
            snapshot.push(tracker.stats());
        }
        snapshot
    }
}

impl Default for TrackerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over linked trackers, newest first.
pub struct TrackerIter<'a> {
    next: *mut AllocationTracker,
    _registry: std::marker::PhantomData<&'a TrackerRegistry>,
}

impl Iterator for TrackerIter<'_> {
    type Item = &'static AllocationTracker;

    fn next(&mut self) -> Option<Self::Item> {
        // SAFETY: only `&'static AllocationTracker`s are ever linked, and a
        // node's `next` is written before the node is published.
        let tracker: &'static AllocationTracker = unsafe { self.next.as_ref()? };
        self.next = tracker.next.load(Ordering::Acquire);
        Some(tracker)
    }
}
