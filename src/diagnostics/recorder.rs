//! Counting and routing of anomalies.

use std::sync::Arc;

use crossbeam_queue::ArrayQueue;

use crate::sync::atomics::AtomicCounter;

use super::anomaly::{Anomaly, AnomalyKind};
use super::emit::AnomalySink;

/// Number of anomalies seen per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnomalyCounts {
    /// Releases of null.
    pub null_releases: u64,
    /// Releases of pointers that were never tracked.
    pub untracked_releases: u64,
    /// Index collisions on insert.
    pub index_collisions: u64,
    /// Double releases.
    pub double_releases: u64,
    /// Overflows and size mismatches.
    pub overflows: u64,
    /// Trackers first linked into another context.
    pub foreign_trackers: u64,
}

impl AnomalyCounts {
    /// Count for a single kind.
    pub fn get(&self, kind: AnomalyKind) -> u64 {
        match kind {
            AnomalyKind::NullRelease => self.null_releases,
            AnomalyKind::UntrackedRelease => self.untracked_releases,
            AnomalyKind::IndexCollision => self.index_collisions,
            AnomalyKind::DoubleRelease => self.double_releases,
            AnomalyKind::Overflow => self.overflows,
            AnomalyKind::ForeignTracker => self.foreign_trackers,
        }
    }

    /// Sum over every kind except untracked releases and foreign trackers,
    /// which are not errors.
    pub fn total_problems(&self) -> u64 {
        self.null_releases + self.index_collisions + self.double_releases + self.overflows
    }
}

/// Counts every anomaly, keeps the most recent ones, and forwards them to
/// a sink.
pub(crate) struct AnomalyRecorder {
    counts: [AtomicCounter; AnomalyKind::ALL.len()],
    recent: Option<ArrayQueue<Anomaly>>,
    sink: Arc<dyn AnomalySink>,
    report_untracked: bool,
}

impl AnomalyRecorder {
    pub fn new(sink: Arc<dyn AnomalySink>, recent_capacity: usize, report_untracked: bool) -> Self {
        Self {
            counts: Default::default(),
            recent: (recent_capacity > 0).then(|| ArrayQueue::new(recent_capacity)),
            sink,
            report_untracked,
        }
    }

    pub fn record(&self, anomaly: Anomaly) {
        self.counts[anomaly.kind.slot()].increment();

        if anomaly.kind == AnomalyKind::UntrackedRelease && !self.report_untracked {
            return;
        }

        self.sink.report(&anomaly);
        if let Some(recent) = &self.recent {
            // Oldest entry is dropped when full.
            let _ = recent.force_push(anomaly);
        }
    }

    pub fn counts(&self) -> AnomalyCounts {
        let get = |kind: AnomalyKind| self.counts[kind.slot()].get();
        AnomalyCounts {
            null_releases: get(AnomalyKind::NullRelease),
            untracked_releases: get(AnomalyKind::UntrackedRelease),
            index_collisions: get(AnomalyKind::IndexCollision),
            double_releases: get(AnomalyKind::DoubleRelease),
            overflows: get(AnomalyKind::Overflow),
            foreign_trackers: get(AnomalyKind::ForeignTracker),
        }
    }

    /// Drain and re-queue the ring, oldest first.
    pub fn recent(&self) -> Vec<Anomaly> {
        let Some(recent) = &self.recent else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(recent.len());
        while let Some(anomaly) = recent.pop() {
            out.push(anomaly);
        }
        for anomaly in &out {
            let _ = recent.force_push(anomaly.clone());
        }
        out
    }
}
