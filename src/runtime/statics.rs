//! Static field storage blocks.
//!
//! Each class gets at most one static block, allocated through the injected
//! allocator at the class's first initialization transition and never freed.
//! Access goes through offset-checked read/write helpers; static constructors
//! registered with the code registration receive the block to populate it.

use std::sync::Mutex;

use crate::Result;

/// Zero-initialized storage for one class's static fields.
///
/// The block is shared across threads; individual reads and writes take an
/// internal lock. Field-level tearing protection beyond that is the concern of
/// the managed code model, not this container.
pub struct StaticStorage {
    data: Mutex<Box<[u8]>>,
}

impl StaticStorage {
    /// Wrap an allocated block.
    #[must_use]
    pub fn new(data: Box<[u8]>) -> Self {
        StaticStorage {
            data: Mutex::new(data),
        }
    }

    /// Size of the block in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        lock!(self.data).len()
    }

    /// Copy `bytes` into the block at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range does not fit in the
    /// block.
    pub fn write(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        let mut data = lock!(self.data);
        let end = offset.checked_add(bytes.len()).ok_or(crate::Error::OutOfBounds)?;
        if end > data.len() {
            return Err(crate::Error::OutOfBounds);
        }
        data[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Copy `out.len()` bytes from the block at `offset` into `out`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range does not fit in the
    /// block.
    pub fn read(&self, offset: usize, out: &mut [u8]) -> Result<()> {
        let data = lock!(self.data);
        let end = offset.checked_add(out.len()).ok_or(crate::Error::OutOfBounds)?;
        if end > data.len() {
            return Err(crate::Error::OutOfBounds);
        }
        out.copy_from_slice(&data[offset..end]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_round_trip() {
        let storage = StaticStorage::new(vec![0_u8; 16].into_boxed_slice());
        storage.write(4, &[0xDE, 0xAD]).unwrap();

        let mut out = [0_u8; 2];
        storage.read(4, &mut out).unwrap();
        assert_eq!(out, [0xDE, 0xAD]);
    }

    #[test]
    fn test_bounds_checked() {
        let storage = StaticStorage::new(vec![0_u8; 8].into_boxed_slice());
        assert!(storage.write(7, &[1, 2]).is_err());
        let mut out = [0_u8; 4];
        assert!(storage.read(6, &mut out).is_err());
    }
}
