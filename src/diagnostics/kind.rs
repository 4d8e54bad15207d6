//! Diagnostic kinds and the predefined anomaly codes.

/// The severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticKind {
    /// Informational; nothing is wrong by itself.
    Note,
    /// Probably a bug in the caller.
    Warning,
    /// Memory corruption or misuse was observed.
    Error,
}

impl DiagnosticKind {
    /// Get the display prefix for this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            DiagnosticKind::Error => "error",
            DiagnosticKind::Warning => "warning",
            DiagnosticKind::Note => "note",
        }
    }
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A diagnostic message with code, message, and optional context.
///
/// Diagnostic codes follow the pattern:
/// - `AS1xx` - release of memory the tracker does not own
/// - `AS2xx` - pointer index and registry inconsistencies
/// - `AS3xx` - corruption of tracked blocks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity level.
    pub kind: DiagnosticKind,
    /// Diagnostic code (e.g., "AS301").
    pub code: &'static str,
    /// Primary message.
    pub message: &'static str,
    /// Optional additional context.
    pub note: Option<&'static str>,
    /// Optional fix suggestion.
    pub help: Option<&'static str>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub const fn error(code: &'static str, message: &'static str) -> Self {
        Self::with_kind(DiagnosticKind::Error, code, message)
    }

    /// Create a new warning diagnostic.
    pub const fn warning(code: &'static str, message: &'static str) -> Self {
        Self::with_kind(DiagnosticKind::Warning, code, message)
    }

    /// Create a new note diagnostic.
    pub const fn note(code: &'static str, message: &'static str) -> Self {
        Self::with_kind(DiagnosticKind::Note, code, message)
    }

    const fn with_kind(kind: DiagnosticKind, code: &'static str, message: &'static str) -> Self {
        Self {
            kind,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Add a note to this diagnostic.
    pub const fn with_note(mut self, note: &'static str) -> Self {
        self.note = Some(note);
        self
    }

    /// Add a help message to this diagnostic.
    pub const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

// =============================================================================
// AS1xx - Releases the tracker does not own
// =============================================================================

/// AS101: Release of a null pointer.
pub const AS101: Diagnostic = Diagnostic::warning("AS101", "attempt to release a null pointer")
    .with_note("the release was ignored and nothing was handed to the allocator")
    .with_help("check the allocation result before releasing, or guard the release with a null check");

/// AS102: Release of a pointer that was never tracked.
pub const AS102: Diagnostic = Diagnostic::note("AS102", "released pointer is not tracked")
    .with_note("the block was allocated before tracking started or outside an instrumented call site")
    .with_help("this is expected for untracked memory; it was freed normally");

// =============================================================================
// AS2xx - Index and registry
// =============================================================================

/// AS201: Pointer index collision on insert.
pub const AS201: Diagnostic = Diagnostic::error("AS201", "allocator returned an address that is still tracked as live")
    .with_note("a previous release of this address was never seen, or the allocator handed out a live block twice")
    .with_help("later statistics for this address may be attributed to the wrong call site");

/// AS202: Tracker already linked into another context.
pub const AS202: Diagnostic = Diagnostic::note("AS202", "call site is tracked by another context")
    .with_note("the tracker was first used through a different context and only appears in that context's snapshots")
    .with_help("give each context its own call sites, or route them all through one context");

// =============================================================================
// AS3xx - Corruption
// =============================================================================

/// AS301: Double release.
pub const AS301: Diagnostic = Diagnostic::error("AS301", "double release detected")
    .with_note("this block was already released; counters were not changed again")
    .with_help("the block is still handed to the allocator, which may itself abort");

/// AS302: Buffer overflow / size mismatch.
pub const AS302: Diagnostic = Diagnostic::error("AS302", "buffer overflow detected")
    .with_note("bytes past the end of the payload were overwritten, or the recorded size no longer matches the block")
    .with_help("look for writes past the requested size at the allocating call site");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predefined_codes() {
        assert_eq!(AS301.kind, DiagnosticKind::Error);
        assert_eq!(AS102.kind, DiagnosticKind::Note);
        assert_eq!(AS202.kind, DiagnosticKind::Note);
        assert!(AS302.note.is_some());
        assert!(DiagnosticKind::Error > DiagnosticKind::Warning);
    }
}
