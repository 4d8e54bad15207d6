//! Anomalies detected by the instrumented allocate/release paths.

use crate::api::callsite::CallSite;
use crate::core::tracker::TrackerIdentity;

use super::kind::{Diagnostic, AS101, AS102, AS201, AS202, AS301, AS302};

/// Classification of something odd seen on the allocate or release path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnomalyKind {
    /// Release of a null pointer.
    NullRelease,
    /// Release of a pointer the index never saw.
    UntrackedRelease,
    /// Allocation returned an address already in the index.
    IndexCollision,
    /// Second release of a tracked pointer.
    DoubleRelease,
    /// Trailer or padding damaged, or recorded size inconsistent.
    Overflow,
    /// A tracker linked into another context allocated through this one.
    ForeignTracker,
}

impl AnomalyKind {
    /// All kinds.
    pub const ALL: [AnomalyKind; 6] = [
        AnomalyKind::NullRelease,
        AnomalyKind::UntrackedRelease,
        AnomalyKind::IndexCollision,
        AnomalyKind::DoubleRelease,
        AnomalyKind::Overflow,
        AnomalyKind::ForeignTracker,
    ];

    /// Predefined diagnostic for this kind.
    pub fn diagnostic(self) -> &'static Diagnostic {
        match self {
            AnomalyKind::NullRelease => &AS101,
            AnomalyKind::UntrackedRelease => &AS102,
            AnomalyKind::IndexCollision => &AS201,
            AnomalyKind::DoubleRelease => &AS301,
            AnomalyKind::Overflow => &AS302,
            AnomalyKind::ForeignTracker => &AS202,
        }
    }

    pub(crate) fn slot(self) -> usize {
        self as usize
    }
}

/// One detected anomaly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anomaly {
    /// What was detected.
    pub kind: AnomalyKind,
    /// Payload address involved (0 for null releases).
    pub address: usize,
    /// Call site that performed the release, when known.
    pub site: Option<CallSite>,
    /// Site the block was attributed to, when known.
    pub owner: Option<TrackerIdentity>,
    /// Size stored in the trailer, for overflow reports.
    pub recorded_size: Option<u64>,
}

impl Anomaly {
    /// Create an anomaly with no context beyond its address.
    pub fn new(kind: AnomalyKind, address: usize) -> Self {
        Self {
            kind,
            address,
            site: None,
            owner: None,
            recorded_size: None,
        }
    }

    /// Attach the releasing call site.
    pub fn at(mut self, site: Option<CallSite>) -> Self {
        self.site = site;
        self
    }

    /// Attach the owning tracker's identity.
    pub fn owned_by(mut self, owner: TrackerIdentity) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Attach the recorded size.
    pub fn with_recorded_size(mut self, size: u64) -> Self {
        self.recorded_size = Some(size);
        self
    }

    /// Predefined diagnostic for this anomaly.
    pub fn diagnostic(&self) -> &'static Diagnostic {
        self.kind.diagnostic()
    }

    /// Runtime context line: address, sites, size.
    pub fn context(&self) -> String {
        let mut parts = vec![format!("address={:#x}", self.address)];
        if let Some(site) = &self.site {
            parts.push(format!("released_in={}", site));
        }
        if let Some(owner) = &self.owner {
            parts.push(format!("allocated_in={}", owner));
        }
        if let Some(size) = self.recorded_size {
            parts.push(format!("recorded_size={}", size));
        }
        parts.join(", ")
    }
}

impl std::fmt::Display for Anomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let diag = self.diagnostic();
        write!(f, "[{}] {}: {} ({})", diag.code, diag.kind, diag.message, self.context())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let anomaly = Anomaly::new(AnomalyKind::DoubleRelease, 0x1000)
            .at(Some(CallSite::new("demo::drop_twice", "src/demo.rs", 12, 5)));

        let text = anomaly.to_string();
        assert!(text.starts_with("[AS301] error: double release detected"));
        assert!(text.contains("address=0x1000"));
        assert!(text.contains("released_in=demo::drop_twice (src/demo.rs:12:5)"));
    }
}
