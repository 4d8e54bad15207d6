//! Bounded memory of recently released addresses.
//!
//! Once a release removes its index entry, a second release of the same
//! pointer would look untracked. The quarantine remembers the last N
//! released addresses so that second release is classified as a double
//! release instead. An address leaves the quarantine when it is evicted or
//! when the raw allocator hands it out again through a tracked allocation.
//!
//! Off unless `quarantine_capacity` is set. An address reused by untracked
//! code is never forgotten, so its release is misreported as a double
//! release while it stays in the quarantine.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::index::PointerIndex;
use crate::sync::mutex::Mutex;

pub(crate) struct ReleaseQuarantine {
    /// address -> generation of its latest quarantine entry
    members: PointerIndex,
    order: Mutex<VecDeque<(usize, usize)>>,
    generation: AtomicUsize,
    capacity: usize,
}

impl ReleaseQuarantine {
    pub fn new(capacity: usize) -> Self {
        Self {
            members: PointerIndex::with_capacity(capacity.saturating_mul(2)),
            order: Mutex::new(VecDeque::with_capacity(capacity)),
            generation: AtomicUsize::new(1),
            capacity,
        }
    }

    /// Remember `address` as released.
    pub fn admit(&self, address: usize) {
        if self.capacity == 0 {
            return;
        }
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let mut order = self.order.lock();
        // A replaced generation is stale; its eviction below becomes a no-op.
        let _ = self.members.insert(address, generation);
        order.push_back((address, generation));
        while order.len() > self.capacity {
            if let Some((old, old_generation)) = order.pop_front() {
                self.members.remove_if(old, old_generation);
            }
        }
    }

    /// Whether `address` was released recently and not handed out since.
    pub fn contains(&self, address: usize) -> bool {
        self.capacity != 0 && self.members.lookup(address).is_some()
    }

    /// The raw allocator returned `address` again; it is live once more.
    pub fn forget(&self, address: usize) {
        if self.contains(address) {
            self.members.remove(address);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admit_and_forget() {
        let quarantine = ReleaseQuarantine::new(4);
        quarantine.admit(0x1000);
        assert!(quarantine.contains(0x1000));

        quarantine.forget(0x1000);
        assert!(!quarantine.contains(0x1000));
    }

    #[test]
    fn test_evicts_oldest() {
        let quarantine = ReleaseQuarantine::new(2);
        quarantine.admit(0x1000);
        quarantine.admit(0x2000);
        quarantine.admit(0x3000);

        assert!(!quarantine.contains(0x1000));
        assert!(quarantine.contains(0x2000));
        assert!(quarantine.contains(0x3000));
    }

    #[test]
    fn test_readmitted_address_survives_stale_eviction() {
        let quarantine = ReleaseQuarantine::new(2);
        quarantine.admit(0x1000);
        quarantine.forget(0x1000);
        quarantine.admit(0x1000);
        quarantine.admit(0x2000);

        // Evicting the first 0x1000 entry must not drop the newer one.
        assert!(quarantine.contains(0x1000));
        assert!(quarantine.contains(0x2000));
    }

    #[test]
    fn test_disabled() {
        let quarantine = ReleaseQuarantine::new(0);
        quarantine.admit(0x1000);
        assert!(!quarantine.contains(0x1000));
    }
}
