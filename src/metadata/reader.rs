//! Random access to a parsed metadata blob.
//!
//! [`MetadataImage`] owns (or memory-maps) the raw blob, validates the header once at
//! construction, and then serves bounds-checked row and heap reads. The image is
//! immutable after loading and safe to share across threads behind an `Arc`; nothing
//! here ever mutates the underlying bytes.
//!
//! # Examples
//!
//! ```rust,no_run
//! use aotcore::metadata::reader::MetadataImage;
//! use aotcore::metadata::tables::TypeDefRow;
//!
//! let image = MetadataImage::from_file("global-metadata.dat".as_ref())?;
//! for index in 0..image.row_count::<TypeDefRow>() {
//!     let row: TypeDefRow = image.row(index)?;
//!     println!("{}", image.string(row.name)?);
//! }
//! # Ok::<(), aotcore::Error>(())
//! ```

use std::path::Path;

use memmap2::Mmap;

use crate::{
    metadata::{
        header::{ImageHeader, TableId},
        io::read_le_at,
        tables::{RowRead, StringLiteralRow},
    },
    Result,
};

/// Backing storage for the raw blob bytes.
enum ImageData {
    /// Blob owned in memory, e.g. loaded over the network or built by a tool
    Owned(Vec<u8>),
    /// Blob memory-mapped from a file on disk
    Mapped(Mmap),
}

impl ImageData {
    fn bytes(&self) -> &[u8] {
        match self {
            ImageData::Owned(data) => data,
            ImageData::Mapped(mmap) => mmap,
        }
    }
}

/// An immutable, validated metadata blob with typed row access.
///
/// All accessors are `&self` and the image holds no interior mutability, so a
/// shared `Arc<MetadataImage>` can be read concurrently from any number of
/// threads.
pub struct MetadataImage {
    data: ImageData,
    header: ImageHeader,
}

impl MetadataImage {
    /// Memory-map a metadata blob from disk and validate its header.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or mapped,
    /// or any header validation error from [`ImageHeader::parse`].
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        // Safety: the mapping is read-only and the image never outlives itself;
        // external truncation of a mapped file is undefined behavior we accept,
        // matching every other consumer of this format.
        let mmap = unsafe { Mmap::map(&file)? };
        let header = ImageHeader::parse(&mmap)?;
        Ok(MetadataImage {
            data: ImageData::Mapped(mmap),
            header,
        })
    }

    /// Take ownership of an in-memory blob and validate its header.
    ///
    /// # Errors
    /// Returns any header validation error from [`ImageHeader::parse`].
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let header = ImageHeader::parse(&data)?;
        Ok(MetadataImage {
            data: ImageData::Owned(data),
            header,
        })
    }

    /// The validated blob header.
    #[must_use]
    pub fn header(&self) -> &ImageHeader {
        &self.header
    }

    /// Raw bytes of one table.
    #[must_use]
    pub fn table_bytes(&self, table: TableId) -> &[u8] {
        let descriptor = self.header.descriptor(table);
        // Header validation guarantees the range is in bounds.
        &self.data.bytes()[descriptor.offset as usize..(descriptor.offset + descriptor.size) as usize]
    }

    /// Number of rows in the table that `T` decodes.
    #[must_use]
    pub fn row_count<T: RowRead>(&self) -> u32 {
        self.header.row_count(T::TABLE)
    }

    /// Decode row `index` of the table that `T` belongs to.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `index` is not below the table's
    /// row count.
    pub fn row<T: RowRead>(&self, index: u32) -> Result<T> {
        if index >= self.header.row_count(T::TABLE) {
            return Err(crate::Error::OutOfBounds);
        }

        let stride = T::TABLE.stride() as usize;
        let start = index as usize * stride;
        T::read_row(&self.table_bytes(T::TABLE)[start..start + stride])
    }

    /// Read one `u32` entry from an index table such as
    /// [`TableId::Interfaces`] or [`TableId::VtableMethods`].
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `index` is not below the table's
    /// entry count.
    pub fn index_entry(&self, table: TableId, index: u32) -> Result<u32> {
        let mut offset = index as usize * 4;
        read_le_at::<u32>(self.table_bytes(table), &mut offset)
    }

    /// Resolve a null-terminated UTF-8 name from the string heap.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `index` is past the heap, or
    /// [`crate::Error::Malformed`] if the data at `index` has no terminator or is
    /// not valid UTF-8.
    pub fn string(&self, index: u32) -> Result<&str> {
        let heap = self.table_bytes(TableId::String);
        let start = index as usize;
        if start >= heap.len() {
            return Err(crate::Error::OutOfBounds);
        }

        let Some(end) = heap[start..].iter().position(|&b| b == 0) else {
            return Err(malformed_error!(
                "String heap entry at {} is not null-terminated",
                index
            ));
        };

        std::str::from_utf8(&heap[start..start + end]).map_err(|_| {
            malformed_error!("String heap entry at {} is not valid UTF-8", index)
        })
    }

    /// Resolve string literal `index` against the literal descriptor table and
    /// its data heap.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for an invalid literal index, or
    /// [`crate::Error::Malformed`] if the descriptor points past the data heap or
    /// the payload is not valid UTF-8.
    pub fn string_literal(&self, index: u32) -> Result<&str> {
        let row: StringLiteralRow = self.row(index)?;
        let heap = self.table_bytes(TableId::StringLiteralData);

        let start = row.data_index as usize;
        let end = start + row.length as usize;
        if end > heap.len() {
            return Err(malformed_error!(
                "String literal {} extends past the data heap ({} > {})",
                index,
                end,
                heap.len()
            ));
        }

        std::str::from_utf8(&heap[start..end])
            .map_err(|_| malformed_error!("String literal {} is not valid UTF-8", index))
    }
}
