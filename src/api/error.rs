//! Allocation errors.
//!
//! Only allocation can fail. Everything that goes wrong on release is an
//! anomaly, reported through [`crate::diagnostics`] and never returned.

/// Errors returned by the instrumented allocation entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The underlying allocator returned null.
    OutOfMemory {
        /// Total block size requested from the raw allocator.
        size: usize,
        /// Alignment passed to the raw allocator, if any.
        align: Option<usize>,
    },
    /// Payload plus trailer does not fit in `usize`.
    SizeOverflow {
        /// Requested payload size (saturated for `count * size` overflows).
        size: usize,
    },
    /// Requested alignment is not a power of two.
    InvalidAlignment(usize),
}

impl std::fmt::Display for AllocError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AllocError::OutOfMemory { size, align: Some(align) } => {
                write!(f, "out of memory allocating {} bytes aligned to {}", size, align)
            }
            AllocError::OutOfMemory { size, align: None } => {
                write!(f, "out of memory allocating {} bytes", size)
            }
            AllocError::SizeOverflow { size } => {
                write!(f, "allocation size {} overflows with tracking trailer", size)
            }
            AllocError::InvalidAlignment(align) => {
                write!(f, "alignment {} is not a power of two", align)
            }
        }
    }
}

impl std::error::Error for AllocError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = AllocError::OutOfMemory { size: 4096, align: Some(64) };
        assert_eq!(err.to_string(), "out of memory allocating 4096 bytes aligned to 64");
        assert_eq!(
            AllocError::InvalidAlignment(3).to_string(),
            "alignment 3 is not a power of two"
        );
    }
}
