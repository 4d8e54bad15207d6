//! Atomic helpers for per-site and per-anomaly counters.
//!
//! All operations are `Relaxed`: counters never order other memory, they are
//! only summed by reporters that tolerate transient skew between fields.

use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter.
pub struct AtomicCounter(AtomicU64);

impl AtomicCounter {
    /// Create a new counter.
    pub const fn new(initial: u64) -> Self {
        Self(AtomicU64::new(initial))
    }

    /// Increment the counter.
    #[inline]
    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current value.
    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for AtomicCounter {
    fn default() -> Self {
        Self::new(0)
    }
}

/// A gauge that moves up and down with live allocations.
pub struct AtomicGauge(AtomicU64);

impl AtomicGauge {
    /// Create a new gauge.
    pub const fn new(initial: u64) -> Self {
        Self(AtomicU64::new(initial))
    }

    /// Add to the gauge, returning the new value.
    #[inline]
    pub fn add(&self, value: u64) -> u64 {
        self.0.fetch_add(value, Ordering::Relaxed).wrapping_add(value)
    }

    /// Subtract from the gauge, returning the new value.
    ///
    /// Saturates at zero. Releases of damaged blocks may subtract an upper
    /// bound of what was added.
    #[inline]
    pub fn sub(&self, value: u64) -> u64 {
        let previous = match self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(current.saturating_sub(value))
            }) {
            Ok(previous) | Err(previous) => previous,
        };
        previous.saturating_sub(value)
    }

    /// Get the current value.
    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for AtomicGauge {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gauge_add_sub() {
        let gauge = AtomicGauge::new(0);
        assert_eq!(gauge.add(30), 30);
        assert_eq!(gauge.add(12), 42);
        assert_eq!(gauge.sub(40), 2);
        assert_eq!(gauge.get(), 2);
    }

    #[test]
    fn test_gauge_saturates_at_zero() {
        let gauge = AtomicGauge::new(13);
        assert_eq!(gauge.sub(16), 0);
        assert_eq!(gauge.get(), 0);
        assert_eq!(gauge.add(5), 5);
    }

    #[test]
    fn test_counter_concurrent_increments() {
        let counter = std::sync::Arc::new(AtomicCounter::default());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        counter.increment();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("Thread panicked");
        }

        assert_eq!(counter.get(), 4000);
    }
}
