//! Concurrent map from live payload addresses to their record locations.
//!
//! Open addressing over a power-of-two table of atomic slots. Readers never
//! lock: they load the current table through `arc-swap` and probe with
//! acquire loads. Writers serialize on one mutex.
//!
//! Slot keys only ever move `EMPTY -> key -> TOMBSTONE` within a table, and
//! a slot's value is stored before its key is published. A reader that
//! matches a key therefore sees the value written for that key. Tombstones
//! are reclaimed by rebuilding into a fresh table, which is swapped in
//! whole; readers still holding the old table finish on it undisturbed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::sync::mutex::Mutex;

const EMPTY: usize = 0;
const TOMBSTONE: usize = 1;

/// Smallest table the index will build.
pub const MIN_CAPACITY: usize = 64;

/// An insert found the key already mapped to a different location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexCollision {
    /// The colliding key.
    pub address: usize,
    /// Location the key mapped to before the insert replaced it.
    pub previous: usize,
}

struct Slot {
    key: AtomicUsize,
    value: AtomicUsize,
}

struct Table {
    slots: Box<[Slot]>,
    shift: u32,
    /// Slots holding a key or a tombstone. Writer-only.
    used: AtomicUsize,
    /// Slots holding a key.
    live: AtomicUsize,
}

impl Table {
    fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY).next_power_of_two();
        let slots = (0..capacity)
            .map(|_| Slot {
                key: AtomicUsize::new(EMPTY),
                value: AtomicUsize::new(0),
            })
            .collect();

        Self {
            slots,
            shift: 64 - capacity.trailing_zeros(),
            used: AtomicUsize::new(0),
            live: AtomicUsize::new(0),
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn home(&self, key: usize) -> usize {
        // Allocations are at least 8-aligned; drop the always-zero bits
        // before the Fibonacci mix.
        let mixed = ((key as u64) >> 3).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        (mixed >> self.shift) as usize
    }

    /// Probe for `key`, returning its slot index.
    fn find(&self, key: usize) -> Option<usize> {
        let mask = self.capacity() - 1;
        let mut pos = self.home(key);
        for _ in 0..self.capacity() {
            match self.slots[pos].key.load(Ordering::Acquire) {
                EMPTY => return None,
                k if k == key => return Some(pos),
                _ => pos = (pos + 1) & mask,
            }
        }
        None
    }

    /// Place a key known to be absent. Writer-only.
    fn place(&self, key: usize, value: usize) {
        let mask = self.capacity() - 1;
        let mut pos = self.home(key);
        loop {
            let slot = &self.slots[pos];
            if slot.key.load(Ordering::Relaxed) == EMPTY {
                slot.value.store(value, Ordering::Relaxed);
                slot.key.store(key, Ordering::Release);
                self.used.fetch_add(1, Ordering::Relaxed);
                self.live.fetch_add(1, Ordering::Relaxed);
                return;
            }
            pos = (pos + 1) & mask;
        }
    }

    fn entries(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.slots.iter().filter_map(|slot| {
            let key = slot.key.load(Ordering::Acquire);
            (key > TOMBSTONE).then(|| (key, slot.value.load(Ordering::Acquire)))
        })
    }
}

/// Single-writer / multi-reader pointer index.
pub struct PointerIndex {
    table: ArcSwap<Table>,
    writer: Mutex<()>,
    min_capacity: usize,
}

impl PointerIndex {
    /// Create an index with the default initial capacity.
    pub fn new() -> Self {
        Self::with_capacity(MIN_CAPACITY)
    }

    /// Create an index sized for roughly `capacity / 2` live entries.
    pub fn with_capacity(capacity: usize) -> Self {
        let table = Table::with_capacity(capacity);
        let min_capacity = table.capacity();
        Self {
            table: ArcSwap::from_pointee(table),
            writer: Mutex::new(()),
            min_capacity,
        }
    }

    /// Map `address` to `location`.
    ///
    /// If `address` is already mapped to a different location the mapping
    /// is replaced and the collision is returned; the caller decides how to
    /// report it.
    pub fn insert(&self, address: usize, location: usize) -> Result<(), IndexCollision> {
        debug_assert!(address > TOMBSTONE, "reserved key");

        let _guard = self.writer.lock();
        let table = self.table.load_full();

        if let Some(pos) = table.find(address) {
            let slot = &table.slots[pos];
            let previous = slot.value.load(Ordering::Relaxed);
            if previous == location {
                return Ok(());
            }
            slot.value.store(location, Ordering::Release);
            return Err(IndexCollision { address, previous });
        }

        let table = if (table.used.load(Ordering::Relaxed) + 1) * 2 > table.capacity() {
            self.rebuild(&table)
        } else {
            table
        };
        table.place(address, location);
        Ok(())
    }

    /// Look up the location for `address` without blocking.
    pub fn lookup(&self, address: usize) -> Option<usize> {
        if address <= TOMBSTONE {
            return None;
        }
        let table = self.table.load();
        table
            .find(address)
            .map(|pos| table.slots[pos].value.load(Ordering::Acquire))
    }

    /// Remove `address`, returning whether it was present.
    pub fn remove(&self, address: usize) -> bool {
        self.remove_where(address, |_| true)
    }

    /// Remove `address` only if it still maps to `location`.
    pub fn remove_if(&self, address: usize, location: usize) -> bool {
        self.remove_where(address, |current| current == location)
    }

    fn remove_where(&self, address: usize, pred: impl FnOnce(usize) -> bool) -> bool {
        if address <= TOMBSTONE {
            return false;
        }
        let _guard = self.writer.lock();
        let table = self.table.load();
        match table.find(address) {
            Some(pos) if pred(table.slots[pos].value.load(Ordering::Relaxed)) => {
                table.slots[pos].key.store(TOMBSTONE, Ordering::Release);
                table.live.fetch_sub(1, Ordering::Relaxed);
                true
            }
            _ => false,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.table.load().live.load(Ordering::Relaxed)
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slots in the current table.
    pub fn capacity(&self) -> usize {
        self.table.load().capacity()
    }

    /// Copy live entries into a fresh table, dropping tombstones, and
    /// publish it. Caller holds the writer lock.
    fn rebuild(&self, old: &Table) -> Arc<Table> {
        let live = old.live.load(Ordering::Relaxed);
        let capacity = ((live + 1) * 4).max(self.min_capacity);
        let fresh = Table::with_capacity(capacity);
        for (key, value) in old.entries() {
            fresh.place(key, value);
        }

        let fresh = Arc::new(fresh);
        self.table.store(Arc::clone(&fresh));
        fresh
    }
}

impl Default for PointerIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::thread;

    fn addr(i: usize) -> usize {
        0x10_0000 + i * 16
    }

    #[test]
    fn test_insert_lookup_remove() {
        let index = PointerIndex::new();

        assert_eq!(index.insert(addr(1), 0xAA0), Ok(()));
        assert_eq!(index.lookup(addr(1)), Some(0xAA0));
        assert_eq!(index.lookup(addr(2)), None);
        assert_eq!(index.len(), 1);

        assert!(index.remove(addr(1)));
        assert!(!index.remove(addr(1)));
        assert_eq!(index.lookup(addr(1)), None);
        assert!(index.is_empty());
    }

    #[test]
    fn test_collision_reports_previous_and_replaces() {
        let index = PointerIndex::new();
        index.insert(addr(7), 100).unwrap();

        assert_eq!(index.insert(addr(7), 100), Ok(()));
        assert_eq!(
            index.insert(addr(7), 200),
            Err(IndexCollision { address: addr(7), previous: 100 })
        );
        assert_eq!(index.lookup(addr(7)), Some(200));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_remove_if() {
        let index = PointerIndex::new();
        index.insert(addr(3), 5).unwrap();

        assert!(!index.remove_if(addr(3), 6));
        assert!(index.remove_if(addr(3), 5));
        assert!(index.is_empty());
    }

    #[test]
    fn test_grows_and_reclaims_tombstones() {
        let index = PointerIndex::with_capacity(64);

        for i in 0..10_000 {
            index.insert(addr(i), i).unwrap();
        }
        assert_eq!(index.len(), 10_000);
        assert!(index.capacity() >= 20_000);

        for i in 0..10_000 {
            assert_eq!(index.lookup(addr(i)), Some(i));
            assert!(index.remove(addr(i)));
        }
        assert!(index.is_empty());

        // Churn through reused addresses; tombstones must not fill the table.
        for round in 0..50 {
            for i in 0..100 {
                index.insert(addr(i), round).unwrap();
            }
            for i in 0..100 {
                assert!(index.remove(addr(i)));
            }
        }
        assert!(index.is_empty());
    }

    #[test]
    fn test_readers_run_alongside_writer() {
        let index = Arc::new(PointerIndex::with_capacity(64));
        let stop = Arc::new(AtomicBool::new(false));

        // Stable entries that readers must always see, even across rebuilds.
        for i in 0..32 {
            index.insert(addr(i), i + 1).unwrap();
        }

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let index = Arc::clone(&index);
                let stop = Arc::clone(&stop);
                thread::spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        for i in 0..32 {
                            assert_eq!(index.lookup(addr(i)), Some(i + 1));
                        }
                    }
                })
            })
            .collect();

        for round in 0..20 {
            for i in 1000..3000 {
                index.insert(addr(i), round).unwrap();
            }
            for i in 1000..3000 {
                assert!(index.remove(addr(i)));
            }
        }

        stop.store(true, Ordering::Relaxed);
        for reader in readers {
            reader.join().expect("Reader panicked");
        }
        assert_eq!(index.len(), 32);
    }
}
