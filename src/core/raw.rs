//! The real allocation primitive underneath the tracking layer.

/// An allocator that can free a block from its pointer alone.
///
/// Release must hand untracked pointers back to the underlying allocator,
/// so unlike [`std::alloc::GlobalAlloc`] the free side cannot ask for a
/// layout.
///
/// # Safety
///
/// Implementations must return either null or a block of at least `size`
/// bytes aligned to `align` (or to the platform's fundamental alignment when
/// `align` is `None`, and never less than 8), and `raw_free` must accept
/// every pointer `raw_alloc`/`raw_alloc_zeroed` returned.
pub unsafe trait RawAllocator: Send + Sync {
    /// Allocate `size` bytes, returning null on failure.
    ///
    /// # Safety
    ///
    /// `align`, when given, is a power of two and a multiple of
    /// `size_of::<usize>()`.
    unsafe fn raw_alloc(&self, size: usize, align: Option<usize>) -> *mut u8;

    /// Allocate `size` zeroed bytes, returning null on failure.
    ///
    /// # Safety
    ///
    /// Same as [`RawAllocator::raw_alloc`].
    unsafe fn raw_alloc_zeroed(&self, size: usize, align: Option<usize>) -> *mut u8 {
        let ptr = self.raw_alloc(size, align);
        if !ptr.is_null() {
            std::ptr::write_bytes(ptr, 0, size);
        }
        ptr
    }

    /// Return a block to the allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must be non-null and have come from this allocator.
    unsafe fn raw_free(&self, ptr: *mut u8);
}

/// The C allocator: `malloc`, `calloc`, `posix_memalign` and `free`.
#[cfg(unix)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Malloc;

#[cfg(unix)]
unsafe impl RawAllocator for Malloc {
    unsafe fn raw_alloc(&self, size: usize, align: Option<usize>) -> *mut u8 {
        match align {
            None => libc::malloc(size).cast(),
            Some(align) => {
                let mut out: *mut libc::c_void = std::ptr::null_mut();
                if libc::posix_memalign(&mut out, align, size) == 0 {
                    out.cast()
                } else {
                    std::ptr::null_mut()
                }
            }
        }
    }

    unsafe fn raw_alloc_zeroed(&self, size: usize, align: Option<usize>) -> *mut u8 {
        match align {
            None => libc::calloc(1, size).cast(),
            Some(_) => {
                let ptr = self.raw_alloc(size, align);
                if !ptr.is_null() {
                    std::ptr::write_bytes(ptr, 0, size);
                }
                ptr
            }
        }
    }

    unsafe fn raw_free(&self, ptr: *mut u8) {
        libc::free(ptr.cast());
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_malloc_roundtrip() {
        unsafe {
            let ptr = Malloc.raw_alloc(64, None);
            assert!(!ptr.is_null());
            ptr.write_bytes(0x5A, 64);
            Malloc.raw_free(ptr);
        }
    }

    #[test]
    fn test_malloc_aligned() {
        unsafe {
            let ptr = Malloc.raw_alloc(100, Some(256));
            assert!(!ptr.is_null());
            assert_eq!(ptr as usize % 256, 0);
            Malloc.raw_free(ptr);
        }
    }

    #[test]
    fn test_malloc_zeroed() {
        unsafe {
            for align in [None, Some(64)] {
                let ptr = Malloc.raw_alloc_zeroed(128, align);
                assert!(!ptr.is_null());
                assert!(std::slice::from_raw_parts(ptr, 128).iter().all(|&b| b == 0));
                Malloc.raw_free(ptr);
            }
        }
    }
}
