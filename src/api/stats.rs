//! Per-site statistics and registry snapshots.

use crate::api::kind::AllocKind;
use crate::core::tracker::TrackerIdentity;
use crate::util::size::format_bytes;

/// Counters of one call site at the time of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteStats {
    /// Where the allocations come from.
    pub identity: TrackerIdentity,

    /// Allocation kind recorded on first use.
    pub kind: AllocKind,

    /// Allocations not yet released.
    pub active_count: u64,

    /// Bytes not yet released.
    pub active_bytes: u64,

    /// Releases processed so far.
    pub free_count: u64,
}

impl SiteStats {
    /// Allocations ever attributed to the site.
    pub fn total_allocations(&self) -> u64 {
        self.active_count.wrapping_add(self.free_count)
    }
}

impl std::fmt::Display for SiteStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} bytes ({} unfreed, {} freed) {} {} {} ({})",
            self.active_bytes,
            self.active_count,
            self.free_count,
            self.kind,
            self.identity.function.unwrap_or("?"),
            self.identity.line,
            self.identity.file
        )
    }
}

/// Every registered site plus the grand total of active bytes.
///
/// Sites appear in registry order, most recently registered first. Counters
/// of different sites are read at slightly different moments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    sites: Vec<SiteStats>,
    total_active_bytes: u64,
}

impl Snapshot {
    pub(crate) fn push(&mut self, stats: SiteStats) {
        self.total_active_bytes = self.total_active_bytes.wrapping_add(stats.active_bytes);
        self.sites.push(stats);
    }

    /// All sites, in registry order.
    pub fn sites(&self) -> &[SiteStats] {
        &self.sites
    }

    /// Sum of active bytes over all sites.
    pub fn total_active_bytes(&self) -> u64 {
        self.total_active_bytes
    }

    /// Sum of active allocations over all sites.
    pub fn total_active_count(&self) -> u64 {
        self.sites.iter().map(|s| s.active_count).sum()
    }

    /// Number of sites.
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// Whether no site has been registered.
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Look up the site at `file:line`.
    pub fn find(&self, file: &str, line: u32) -> Option<&SiteStats> {
        self.sites
            .iter()
            .find(|s| s.identity.file == file && s.identity.line == line)
    }

    /// Partition into sites holding more than `threshold` active bytes and
    /// the rest. Large sites come back sorted by active bytes, largest first.
    pub fn split_at(&self, threshold: u64) -> (Vec<SiteStats>, Vec<SiteStats>) {
        let (mut large, small): (Vec<_>, Vec<_>) =
            self.sites.iter().copied().partition(|s| s.active_bytes > threshold);
        large.sort_by(|a, b| b.active_bytes.cmp(&a.active_bytes));
        (large, small)
    }

    /// Sites that still hold at least one allocation.
    pub fn leaking(&self) -> impl Iterator<Item = &SiteStats> + '_ {
        self.sites.iter().filter(|s| s.active_count > 0)
    }
}

impl std::fmt::Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for site in &self.sites {
            writeln!(f, "{}", site)?;
        }
        write!(
            f,
            "{} total monitored allocated memory ({})",
            self.total_active_bytes,
            format_bytes(self.total_active_bytes)
        )
    }
}
