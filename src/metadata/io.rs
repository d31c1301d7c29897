//! Low-level byte order and safe reading utilities for metadata blob parsing.
//!
//! This module provides endian-aware binary reading for the fixed-layout metadata
//! blob. All reads are bounds-checked against the source buffer and fail with
//! [`crate::Error::OutOfBounds`] instead of panicking, so corrupted blobs can never
//! cause a buffer overrun.
//!
//! # Key Components
//!
//! - [`RawIO`] - Trait defining little-endian decoding for primitive types
//! - [`read_le`] - Read a value from the start of a buffer
//! - [`read_le_at`] - Read a value at a specific offset with auto-advance

use crate::{Error::OutOfBounds, Result};

/// A trait for types that can be decoded from little-endian bytes.
///
/// Implemented for the primitive integer types the metadata tables are built from.
pub trait RawIO: Sized {
    /// The byte-array representation of this type, e.g. `[u8; 4]` for `u32`.
    type Bytes: for<'a> TryFrom<&'a [u8]>;

    /// Decode a value from its little-endian byte representation.
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_raw_io {
    ($($t:ty),*) => {
        $(
            impl RawIO for $t {
                type Bytes = [u8; std::mem::size_of::<$t>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$t>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_raw_io!(u8, u16, u32, u64, i8, i16, i32, i64);

/// Safely reads a value of type `T` in little-endian byte order from a data buffer.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the buffer holds fewer bytes than
/// `size_of::<T>()`.
pub fn read_le<T: RawIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Safely reads a value of type `T` in little-endian byte order at a specific offset.
///
/// The offset is advanced by the number of bytes read, allowing sequential decoding
/// of packed structures.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes at `offset`.
pub fn read_le_at<T: RawIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    if (type_len + *offset) > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..*offset + type_len].try_into() else {
        return Err(OutOfBounds);
    };

    *offset += type_len;

    Ok(T::from_le_bytes(read))
}
