//! Per-allocation trailer metadata and the block layout shared by allocate
//! and release.
//!
//! A tracked block looks like this:
//!
//! ```text
//! base                     base + size       base + trailer_offset
//! |------- payload --------|-- pad (0xFD) ---|---- AllocationRecord ----|
//! ```
//!
//! The payload starts at the block base, so the caller's alignment applies
//! to the raw allocation itself. The record sits at the first suitably
//! aligned offset past the payload. [`BlockLayout`] is the only place this
//! arithmetic lives.

use std::mem::{align_of, size_of};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::api::error::AllocError;
use crate::core::tracker::AllocationTracker;
use crate::util::layout::{checked_align_up, is_aligned, padding_for};

/// Pattern written into the bytes between the payload and the record.
pub const PAD_PATTERN: u8 = 0xFD;

/// Guard seed, mixed with the payload address so a record copied from
/// another block does not validate.
const GUARD_MAGIC: u64 = 0x1EA4_5EED_C0FF_EE42;

/// Metadata embedded after every tracked payload.
///
/// The guard word comes first so that a payload overflow clobbers it before
/// it reaches the size or owner fields.
#[repr(C)]
pub struct AllocationRecord {
    guard: u64,
    size: u64,
    /// Null once the allocation has been released.
    owner: AtomicPtr<AllocationTracker>,
}

impl AllocationRecord {
    fn guard_for(base: usize) -> u64 {
        GUARD_MAGIC ^ base as u64
    }

    /// Write a fresh record for `base` at `record`.
    ///
    /// # Safety
    ///
    /// `record` must be valid for writes of an `AllocationRecord` and aligned.
    pub(crate) unsafe fn install(
        record: *mut AllocationRecord,
        base: NonNull<u8>,
        size: usize,
        owner: &'static AllocationTracker,
    ) {
        ptr::write(
            record,
            AllocationRecord {
                guard: Self::guard_for(base.as_ptr() as usize),
                size: size as u64,
                owner: AtomicPtr::new(owner as *const AllocationTracker as *mut AllocationTracker),
            },
        );
    }

    /// The payload size recorded at allocation time.
    pub fn size(&self) -> u64 {
        // Overflowing writes may have torn this field; read it as plain bytes.
        unsafe { ptr::read_volatile(&self.size) }
    }

    /// Whether the guard word still matches the payload address.
    pub fn guard_intact(&self, base: usize) -> bool {
        unsafe { ptr::read_volatile(&self.guard) == Self::guard_for(base) }
    }

    /// The tracker this allocation is attributed to, if not yet released.
    pub fn owner(&self) -> Option<NonNull<AllocationTracker>> {
        NonNull::new(self.owner.load(Ordering::Acquire))
    }

    /// Clear the owner, returning the previous one.
    ///
    /// Exactly one of several concurrent callers observes `Some`.
    pub(crate) fn take_owner(&self) -> Option<NonNull<AllocationTracker>> {
        NonNull::new(self.owner.swap(ptr::null_mut(), Ordering::AcqRel))
    }
}

/// Size, alignment and trailer placement for one tracked block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    size: usize,
    requested_align: Option<usize>,
    block_align: usize,
    trailer_offset: usize,
    total: usize,
}

impl BlockLayout {
    /// Compute the layout for a payload of `size` bytes.
    ///
    /// `align`, when given, must be a power of two; the block is then
    /// allocated with at least that alignment.
    pub fn new(size: usize, align: Option<usize>) -> Result<Self, AllocError> {
        if let Some(align) = align {
            if !align.is_power_of_two() {
                return Err(AllocError::InvalidAlignment(align));
            }
        }

        let trailer_offset = Self::trailer_offset_for(size).ok_or(AllocError::SizeOverflow { size })?;
        let block_align = align.map_or(align_of::<AllocationRecord>(), |a| {
            a.max(align_of::<AllocationRecord>())
        });
        let total = trailer_offset
            .checked_add(size_of::<AllocationRecord>())
            .and_then(|end| checked_align_up(end, block_align))
            .ok_or(AllocError::SizeOverflow { size })?;

        Ok(Self {
            size,
            requested_align: align,
            block_align,
            trailer_offset,
            total,
        })
    }

    /// Where the record lives for a payload of `size` bytes.
    ///
    /// Independent of the requested alignment, which is what lets release
    /// validate a record using only its recorded size.
    pub fn trailer_offset_for(size: usize) -> Option<usize> {
        checked_align_up(size, align_of::<AllocationRecord>())
    }

    /// Requested payload size.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Alignment passed to the raw allocator, `None` for its default.
    pub fn raw_align(&self) -> Option<usize> {
        self.requested_align.map(|_| self.block_align)
    }

    /// Byte offset of the record from the block base.
    pub fn trailer_offset(&self) -> usize {
        self.trailer_offset
    }

    /// Number of pad bytes between the payload and the record.
    pub fn padding(&self) -> usize {
        padding_for(self.size, align_of::<AllocationRecord>())
    }

    /// Total bytes requested from the raw allocator.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Address of the record inside a block starting at `base`.
    pub fn record_ptr(&self, base: NonNull<u8>) -> *mut AllocationRecord {
        debug_assert!(is_aligned(
            base.as_ptr() as usize + self.trailer_offset,
            align_of::<AllocationRecord>()
        ));
        // SAFETY: trailer_offset < total, so the result stays inside the block.
        unsafe { base.as_ptr().add(self.trailer_offset).cast() }
    }

    /// Fill the pad bytes with [`PAD_PATTERN`].
    ///
    /// # Safety
    ///
    /// `base` must point to a live block of at least `self.total()` bytes.
    pub(crate) unsafe fn fill_padding(&self, base: NonNull<u8>) {
        ptr::write_bytes(base.as_ptr().add(self.size), PAD_PATTERN, self.padding());
    }
}

/// Result of checking a record against the block it was found for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordCheck {
    /// Guard word matched.
    pub guard_intact: bool,
    /// Recorded size maps to the observed record offset.
    pub size_consistent: bool,
    /// Pad bytes still hold [`PAD_PATTERN`] (vacuously true when not checked).
    pub padding_intact: bool,
    /// Byte distance from payload to record.
    pub observed_offset: usize,
    /// Size that release should account, see [`RecordCheck::release_size`].
    pub recorded_size: u64,
}

impl RecordCheck {
    /// Validate the record at `record` for the payload at `base`.
    ///
    /// # Safety
    ///
    /// `record` must be the location installed for `base` and the block must
    /// still be live.
    pub(crate) unsafe fn run(base: NonNull<u8>, record: NonNull<AllocationRecord>, check_padding: bool) -> Self {
        let base_addr = base.as_ptr() as usize;
        let observed_offset = (record.as_ptr() as usize).wrapping_sub(base_addr);
        let rec = record.as_ref();
        let recorded_size = rec.size();

        let size_consistent = usize::try_from(recorded_size)
            .ok()
            .and_then(BlockLayout::trailer_offset_for)
            .is_some_and(|offset| offset == observed_offset);

        let padding_intact = if check_padding && size_consistent {
            let start = recorded_size as usize;
            (start..observed_offset).all(|i| *base.as_ptr().add(i) == PAD_PATTERN)
        } else {
            true
        };

        Self {
            guard_intact: rec.guard_intact(base_addr),
            size_consistent,
            padding_intact,
            observed_offset,
            recorded_size,
        }
    }

    /// Whether nothing looks corrupted.
    pub fn is_clean(&self) -> bool {
        self.guard_intact && self.size_consistent && self.padding_intact
    }

    /// Bytes to subtract from the owner's active byte count.
    ///
    /// The recorded size when it is consistent with the layout, otherwise the
    /// observed offset, which bounds the original size from above.
    pub fn release_size(&self) -> u64 {
        if self.size_consistent {
            self.recorded_size
        } else {
            self.observed_offset as u64
        }
    }
}
