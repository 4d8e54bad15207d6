//! Layout utilities.

/// Align a size up to the given power-of-two alignment.
///
/// Returns `None` if rounding up overflows `usize`.
#[inline]
pub const fn checked_align_up(size: usize, align: usize) -> Option<usize> {
    match size.checked_add(align - 1) {
        Some(bumped) => Some(bumped & !(align - 1)),
        None => None,
    }
}

/// Calculate padding needed to align a size.
#[inline]
pub const fn padding_for(size: usize, align: usize) -> usize {
    match checked_align_up(size, align) {
        Some(aligned) => aligned - size,
        None => 0,
    }
}

/// Whether `addr` is a multiple of the power-of-two `align`.
#[inline]
pub const fn is_aligned(addr: usize, align: usize) -> bool {
    addr & (align - 1) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_align_up() {
        assert_eq!(checked_align_up(0, 8), Some(0));
        assert_eq!(checked_align_up(1, 8), Some(8));
        assert_eq!(checked_align_up(50, 64), Some(64));
        assert_eq!(checked_align_up(usize::MAX - 2, 8), None);
    }

    #[test]
    fn test_padding_for() {
        assert_eq!(padding_for(8, 8), 0);
        assert_eq!(padding_for(9, 8), 7);
        assert_eq!(padding_for(50, 8), 6);
    }

    #[test]
    fn test_is_aligned() {
        assert!(is_aligned(128, 64));
        assert!(!is_aligned(72, 64));
    }
}
