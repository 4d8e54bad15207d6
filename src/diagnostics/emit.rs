//! Anomaly emission backends.
//!
//! Handles outputting anomalies to stderr, the log crate, or custom sinks.

#[cfg(any(debug_assertions, feature = "diagnostics"))]
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::sync::mutex::Mutex;

use super::anomaly::Anomaly;
#[cfg(feature = "log")]
use super::kind::DiagnosticKind;

/// Global flag to suppress diagnostic output (for testing).
static DIAGNOSTICS_SUPPRESSED: AtomicBool = AtomicBool::new(false);

/// Suppress all diagnostic output from the built-in sinks.
///
/// Anomalies are still counted and kept in the recent-anomaly ring.
pub fn suppress_diagnostics(suppress: bool) {
    DIAGNOSTICS_SUPPRESSED.store(suppress, Ordering::Relaxed);
}

/// Check if diagnostics are suppressed.
pub fn is_suppressed() -> bool {
    DIAGNOSTICS_SUPPRESSED.load(Ordering::Relaxed)
}

/// Receives every reported anomaly.
///
/// Called synchronously on the allocating or releasing thread, so
/// implementations should be quick and must not panic.
pub trait AnomalySink: Send + Sync {
    /// Handle an anomaly.
    fn report(&self, anomaly: &Anomaly);
}

/// Writes anomalies to stderr in the `[allocsite][CODE] kind: message` form.
///
/// In release builds without the `diagnostics` feature, this is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl AnomalySink for StderrSink {
    fn report(&self, anomaly: &Anomaly) {
        if is_suppressed() {
            return;
        }

        #[cfg(any(debug_assertions, feature = "diagnostics"))]
        {
            let diag = anomaly.diagnostic();
            let mut stderr = std::io::stderr().lock();

            let _ = writeln!(stderr, "[allocsite][{}] {}: {}", diag.code, diag.kind, diag.message);
            let _ = writeln!(stderr, "  context: {}", anomaly.context());
            if let Some(note) = diag.note {
                let _ = writeln!(stderr, "  note: {}", note);
            }
            if let Some(help) = diag.help {
                let _ = writeln!(stderr, "  help: {}", help);
            }
            let _ = writeln!(stderr);
        }

        #[cfg(not(any(debug_assertions, feature = "diagnostics")))]
        let _ = anomaly;
    }
}

/// Forwards anomalies to the `log` crate.
#[cfg(feature = "log")]
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[cfg(feature = "log")]
impl AnomalySink for LogSink {
    fn report(&self, anomaly: &Anomaly) {
        if is_suppressed() {
            return;
        }

        let diag = anomaly.diagnostic();
        match diag.kind {
            DiagnosticKind::Error => {
                log::error!("[{}] {} ({})", diag.code, diag.message, anomaly.context());
            }
            DiagnosticKind::Warning => {
                log::warn!("[{}] {} ({})", diag.code, diag.message, anomaly.context());
            }
            DiagnosticKind::Note => {
                log::debug!("[{}] {} ({})", diag.code, diag.message, anomaly.context());
            }
        }
    }
}

/// Discards anomalies.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AnomalySink for NullSink {
    fn report(&self, _anomaly: &Anomaly) {}
}

/// A simple sink that collects anomalies.
#[derive(Default)]
pub struct CollectingSink {
    anomalies: Mutex<Vec<Anomaly>>,
}

impl CollectingSink {
    /// Create a new collecting sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected anomalies.
    pub fn anomalies(&self) -> Vec<Anomaly> {
        self.anomalies.lock().clone()
    }

    /// Clear collected anomalies.
    pub fn clear(&self) {
        self.anomalies.lock().clear();
    }
}

impl AnomalySink for CollectingSink {
    fn report(&self, anomaly: &Anomaly) {
        self.anomalies.lock().push(anomaly.clone());
    }
}

impl<S: AnomalySink + ?Sized> AnomalySink for std::sync::Arc<S> {
    fn report(&self, anomaly: &Anomaly) {
        (**self).report(anomaly);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::anomaly::AnomalyKind;

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingSink::new();
        sink.report(&Anomaly::new(AnomalyKind::NullRelease, 0));

        assert_eq!(sink.anomalies().len(), 1);
        assert_eq!(sink.anomalies()[0].kind, AnomalyKind::NullRelease);

        sink.clear();
        assert!(sink.anomalies().is_empty());
    }

    #[test]
    fn test_suppression() {
        suppress_diagnostics(true);
        assert!(is_suppressed());
        StderrSink.report(&Anomaly::new(AnomalyKind::Overflow, 0x40));
        suppress_diagnostics(false);
        assert!(!is_suppressed());
    }
}
