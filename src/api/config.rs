//! Tracking configuration.

use crate::util::size::mb;

/// Environment variable overriding [`TrackingConfig::report_threshold`].
pub const ENV_REPORT_THRESHOLD: &str = "ALLOCSITE_REPORT_THRESHOLD";

/// Environment variable overriding [`TrackingConfig::report_untracked`].
pub const ENV_REPORT_UNTRACKED: &str = "ALLOCSITE_REPORT_UNTRACKED";

/// Configuration for a tracking context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingConfig {
    /// Initial number of pointer index slots (default: 4096)
    pub index_capacity: usize,

    /// Active bytes above which a site counts as large in reports (default: 1 MB)
    pub report_threshold: u64,

    /// Number of recent anomalies kept for inspection (default: 64)
    pub recent_anomalies: usize,

    /// Number of released addresses remembered for double-release
    /// detection, 0 to disable (default: 0)
    ///
    /// With a quarantine, a second release whose index entry is already gone
    /// is reported as a double release instead of an untracked one. Memory
    /// the raw allocator hands out again to untracked code can still sit in
    /// the quarantine, so releasing it gives a false double release. Every
    /// release also takes the quarantine lock, serializing releases across
    /// threads.
    pub quarantine_capacity: usize,

    /// Fill the bytes between payload and trailer with a guard pattern
    /// and verify them on release
    pub fill_padding: bool,

    /// Send releases of untracked pointers to the sink, not only count them
    pub report_untracked: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            index_capacity: 4096,
            report_threshold: mb(1) as u64,
            recent_anomalies: 64,
            quarantine_capacity: 0,
            fill_padding: true,
            report_untracked: false,
        }
    }
}

impl TrackingConfig {
    /// Create a minimal config for tests or constrained environments.
    pub fn minimal() -> Self {
        Self {
            index_capacity: 64,
            report_threshold: mb(1) as u64,
            recent_anomalies: 8,
            quarantine_capacity: 0,
            fill_padding: false,
            report_untracked: false,
        }
    }

    /// Default config with overrides read from the environment.
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(threshold) = std::env::var(ENV_REPORT_THRESHOLD)
            .ok()
            .and_then(|v| v.trim().parse().ok())
        {
            config.report_threshold = threshold;
        }
        if let Ok(value) = std::env::var(ENV_REPORT_UNTRACKED) {
            config.report_untracked = matches!(value.trim(), "1" | "true" | "yes" | "on");
        }
        config
    }

    /// Builder pattern: set initial index capacity.
    pub fn with_index_capacity(mut self, capacity: usize) -> Self {
        self.index_capacity = capacity;
        self
    }

    /// Builder pattern: set the large-site threshold.
    pub fn with_report_threshold(mut self, bytes: u64) -> Self {
        self.report_threshold = bytes;
        self
    }

    /// Builder pattern: set the recent-anomaly ring size.
    pub fn with_recent_anomalies(mut self, count: usize) -> Self {
        self.recent_anomalies = count;
        self
    }

    /// Builder pattern: set how many released addresses are remembered.
    ///
    /// See [`TrackingConfig::quarantine_capacity`] for the tradeoffs.
    pub fn with_quarantine(mut self, capacity: usize) -> Self {
        self.quarantine_capacity = capacity;
        self
    }

    /// Builder pattern: enable padding fill and verification.
    pub fn with_padding_fill(mut self, enable: bool) -> Self {
        self.fill_padding = enable;
        self
    }

    /// Builder pattern: report untracked releases.
    pub fn with_untracked_reports(mut self, enable: bool) -> Self {
        self.report_untracked = enable;
        self
    }
}
