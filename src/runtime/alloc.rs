//! Injected allocation interface for runtime-owned storage.
//!
//! The engine never allocates static field storage through an assumed global
//! allocator; everything goes through a [`RuntimeAllocator`] handed to the
//! [`crate::runtime::RuntimeContext`] at construction. Allocation failure is a
//! propagated [`crate::Error::OutOfMemory`], never an abort.

use crate::Result;

/// Allocator the runtime uses for class-owned storage such as static field blocks.
///
/// Implementations must be thread-safe; allocations can be requested from any
/// worker thread during class initialization.
pub trait RuntimeAllocator: Send + Sync {
    /// Allocate `size` bytes with at least `align` alignment. Contents are
    /// unspecified.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfMemory`] if the request cannot be satisfied.
    fn alloc(&self, size: usize, align: usize) -> Result<Box<[u8]>>;

    /// Allocate `size` zero-filled bytes with at least `align` alignment.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfMemory`] if the request cannot be satisfied.
    fn alloc_zeroed(&self, size: usize, align: usize) -> Result<Box<[u8]>>;

    /// Grow or shrink an existing allocation to `new_size` bytes, preserving the
    /// common prefix.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfMemory`] if the request cannot be satisfied;
    /// the original allocation is consumed either way.
    fn realloc(&self, old: Box<[u8]>, new_size: usize, align: usize) -> Result<Box<[u8]>> {
        let mut grown = self.alloc_zeroed(new_size, align)?;
        let common = old.len().min(new_size);
        grown[..common].copy_from_slice(&old[..common]);
        Ok(grown)
    }
}

/// Default allocator backed by the process heap.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl RuntimeAllocator for SystemAllocator {
    fn alloc(&self, size: usize, _align: usize) -> Result<Box<[u8]>> {
        Ok(vec![0_u8; size].into_boxed_slice())
    }

    fn alloc_zeroed(&self, size: usize, _align: usize) -> Result<Box<[u8]>> {
        Ok(vec![0_u8; size].into_boxed_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingAllocator;

    impl RuntimeAllocator for FailingAllocator {
        fn alloc(&self, size: usize, align: usize) -> Result<Box<[u8]>> {
            Err(crate::Error::OutOfMemory { size, align })
        }

        fn alloc_zeroed(&self, size: usize, align: usize) -> Result<Box<[u8]>> {
            Err(crate::Error::OutOfMemory { size, align })
        }
    }

    #[test]
    fn test_system_allocator_zeroes() {
        let block = SystemAllocator.alloc_zeroed(64, 8).unwrap();
        assert_eq!(block.len(), 64);
        assert!(block.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_realloc_preserves_prefix() {
        let mut block = SystemAllocator.alloc_zeroed(4, 1).unwrap();
        block.copy_from_slice(&[1, 2, 3, 4]);

        let grown = SystemAllocator.realloc(block, 8, 1).unwrap();
        assert_eq!(&grown[..4], &[1, 2, 3, 4]);
        assert_eq!(&grown[4..], &[0, 0, 0, 0]);

        let shrunk = SystemAllocator.realloc(grown, 2, 1).unwrap();
        assert_eq!(&*shrunk, &[1, 2]);
    }

    #[test]
    fn test_failure_propagates() {
        let result = FailingAllocator.alloc_zeroed(1024, 16);
        assert!(matches!(
            result,
            Err(crate::Error::OutOfMemory { size: 1024, align: 16 })
        ));
    }
}
