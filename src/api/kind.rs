//! Allocation kinds attributed to a call site.

/// How a call site requested its memory.
///
/// A tracker's kind is fixed the first time the tracker is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum AllocKind {
    /// Tracker has not been registered yet.
    #[default]
    NotSet = 0,
    /// Plain heap allocation.
    HeapAlloc = 1,
    /// Zero-initialized heap allocation.
    ZeroedHeapAlloc = 2,
    /// Single object construction.
    ObjectNew = 3,
    /// Array construction.
    ArrayNew = 4,
    /// Over-aligned single object construction.
    AlignedObjectNew = 5,
    /// Over-aligned array construction.
    AlignedArrayNew = 6,
}

impl AllocKind {
    /// All kinds, in discriminant order.
    pub const ALL: [AllocKind; 7] = [
        AllocKind::NotSet,
        AllocKind::HeapAlloc,
        AllocKind::ZeroedHeapAlloc,
        AllocKind::ObjectNew,
        AllocKind::ArrayNew,
        AllocKind::AlignedObjectNew,
        AllocKind::AlignedArrayNew,
    ];

    /// Short label used in dumps.
    pub const fn label(self) -> &'static str {
        match self {
            AllocKind::NotSet => "not set",
            AllocKind::HeapAlloc => "malloc",
            AllocKind::ZeroedHeapAlloc => "calloc",
            AllocKind::ObjectNew => "new",
            AllocKind::ArrayNew => "new[]",
            AllocKind::AlignedObjectNew => "al new",
            AllocKind::AlignedArrayNew => "al new[]",
        }
    }

    /// Whether this kind carries an explicit alignment requirement.
    pub const fn is_aligned(self) -> bool {
        matches!(self, AllocKind::AlignedObjectNew | AllocKind::AlignedArrayNew)
    }
}

impl From<u8> for AllocKind {
    fn from(val: u8) -> Self {
        match val {
            1 => AllocKind::HeapAlloc,
            2 => AllocKind::ZeroedHeapAlloc,
            3 => AllocKind::ObjectNew,
            4 => AllocKind::ArrayNew,
            5 => AllocKind::AlignedObjectNew,
            6 => AllocKind::AlignedArrayNew,
            _ => AllocKind::NotSet,
        }
    }
}

impl std::fmt::Display for AllocKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
