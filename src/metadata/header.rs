//! Metadata blob header parsing and table directory.
//!
//! The metadata blob begins with a fixed header: a sanity constant, a format version,
//! and one `(offset, size)` pair per table, in a fixed order. All tables are packed
//! sequentially after the header. Any tool producing this blob must match the
//! offset/size contract exactly; the parser rejects blobs whose sanity or version
//! fields mismatch the expected constants.
//!
//! # Key Components
//!
//! - [`TableId`] - Identifier for every table the blob can carry, in header order
//! - [`TableDescriptor`] - One `(offset, size)` directory entry
//! - [`ImageHeader`] - Parsed and validated header with per-table directory

use strum::{EnumCount, EnumIter, IntoEnumIterator};

use crate::{metadata::io::read_le_at, Result};

/// Expected value of the header sanity field. Blobs with any other value are rejected.
pub const METADATA_SANITY: u32 = 0xFAB1_1BAF;

/// Metadata format version this engine understands.
pub const METADATA_VERSION: i32 = 31;

/// Identifies a table within the metadata blob.
///
/// The enum order is the header directory order: the n-th `(offset, size)` pair in
/// the header describes the n-th table id. Each table has a fixed row stride; heaps
/// (raw byte tables) have a stride of 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount)]
#[repr(u8)]
pub enum TableId {
    /// String literal descriptors: `(length, data offset)` pairs
    StringLiteral,
    /// Raw UTF-8 payload referenced by [`TableId::StringLiteral`]
    StringLiteralData,
    /// Null-terminated UTF-8 name heap
    String,
    /// Event definitions
    Events,
    /// Property definitions
    Properties,
    /// Method definitions
    Methods,
    /// Default values for method parameters
    ParameterDefaultValues,
    /// Default values for fields
    FieldDefaultValues,
    /// Raw payload for field and parameter default values
    FieldAndParameterDefaultValueData,
    /// Marshaled sizes for fields
    FieldMarshaledSizes,
    /// Parameter definitions
    Parameters,
    /// Field definitions
    Fields,
    /// Generic parameter definitions
    GenericParameters,
    /// Constraint entries for generic parameters (type-table indices)
    GenericParameterConstraints,
    /// Generic container definitions (one per generic type or method)
    GenericContainers,
    /// Nested type entries (type-definition indices)
    NestedTypes,
    /// Implemented interface entries (type-table indices)
    Interfaces,
    /// Virtual method entries (encoded usage tokens)
    VtableMethods,
    /// Interface offset pairs `(interface type index, vtable slot)`
    InterfaceOffsets,
    /// Type definitions
    TypeDefinitions,
    /// Encoded type descriptors
    Types,
    /// Image definitions
    Images,
    /// Assembly definitions
    Assemblies,
    /// Field references `(type index, field index)`
    FieldRefs,
    /// Referenced assembly entries (assembly indices)
    ReferencedAssemblies,
    /// Raw custom attribute payload
    AttributeData,
    /// Custom attribute data ranges
    AttributeDataRange,
    /// Exported type definition entries (type-definition indices)
    ExportedTypeDefinitions,
}

impl TableId {
    /// Row stride of this table in bytes.
    ///
    /// Heap-like tables (raw byte payloads) report a stride of 1; every other
    /// table has a fixed row size the reader uses for bounds validation.
    #[must_use]
    pub fn stride(self) -> u32 {
        match self {
            TableId::StringLiteralData
            | TableId::String
            | TableId::FieldAndParameterDefaultValueData
            | TableId::AttributeData => 1,
            TableId::GenericParameterConstraints
            | TableId::NestedTypes
            | TableId::Interfaces
            | TableId::VtableMethods
            | TableId::ReferencedAssemblies
            | TableId::ExportedTypeDefinitions => 4,
            TableId::StringLiteral
            | TableId::InterfaceOffsets
            | TableId::FieldRefs
            | TableId::AttributeDataRange => 8,
            TableId::ParameterDefaultValues
            | TableId::FieldDefaultValues
            | TableId::FieldMarshaledSizes
            | TableId::Parameters
            | TableId::Fields
            | TableId::Types => 12,
            TableId::GenericParameters | TableId::GenericContainers => 16,
            TableId::Properties => 20,
            TableId::Events | TableId::Images => 24,
            TableId::Assemblies => 20,
            TableId::Methods => 32,
            TableId::TypeDefinitions => 88,
        }
    }
}

/// Directory entry for one table: its byte offset within the blob and its total size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableDescriptor {
    /// Byte offset of the table, relative to the start of the blob
    pub offset: u32,
    /// Total size of the table in bytes (must be a multiple of the row stride)
    pub size: u32,
}

/// Parsed and validated metadata blob header.
///
/// Holds the sanity/version fields and the `(offset, size)` directory for every
/// table. Construction validates all invariants up front, so table access through
/// [`crate::metadata::reader::MetadataImage`] only needs per-row bounds checks.
pub struct ImageHeader {
    /// Sanity field, always [`METADATA_SANITY`] after successful parsing
    pub sanity: u32,
    /// Format version, always [`METADATA_VERSION`] after successful parsing
    pub version: i32,
    /// Per-table directory, indexed by [`TableId`] discriminant order
    tables: Vec<TableDescriptor>,
}

impl ImageHeader {
    /// Size in bytes of the serialized header: sanity + version + one
    /// `(offset, size)` pair per table.
    pub const SIZE: usize = 8 + <TableId as EnumCount>::COUNT * 8;

    /// Parse and validate a header from the start of `data`.
    ///
    /// `data` must be the complete blob, since every directory entry is validated
    /// against the blob length.
    ///
    /// # Errors
    /// - [`crate::Error::Empty`] if `data` is empty
    /// - [`crate::Error::OutOfBounds`] if `data` is shorter than the header
    /// - [`crate::Error::NotSupported`] on sanity or version mismatch
    /// - [`crate::Error::Malformed`] if a directory entry points outside the blob
    ///   or its size is not a multiple of the table stride
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(crate::Error::Empty);
        }

        let mut offset = 0_usize;
        let sanity = read_le_at::<u32>(data, &mut offset)?;
        if sanity != METADATA_SANITY {
            return Err(crate::Error::NotSupported);
        }

        let version = read_le_at::<i32>(data, &mut offset)?;
        if version != METADATA_VERSION {
            return Err(crate::Error::NotSupported);
        }

        let mut tables = Vec::with_capacity(<TableId as EnumCount>::COUNT);
        for table_id in TableId::iter() {
            let descriptor = TableDescriptor {
                offset: read_le_at::<u32>(data, &mut offset)?,
                size: read_le_at::<u32>(data, &mut offset)?,
            };

            let end = u64::from(descriptor.offset) + u64::from(descriptor.size);
            if end > data.len() as u64 {
                return Err(malformed_error!(
                    "Table {:?} extends past the end of the blob ({} > {})",
                    table_id,
                    end,
                    data.len()
                ));
            }

            if descriptor.size % table_id.stride() != 0 {
                return Err(malformed_error!(
                    "Table {:?} size {} is not a multiple of its stride {}",
                    table_id,
                    descriptor.size,
                    table_id.stride()
                ));
            }

            if descriptor.size != 0 && (descriptor.offset as usize) < Self::SIZE {
                return Err(malformed_error!(
                    "Table {:?} overlaps the header (offset {})",
                    table_id,
                    descriptor.offset
                ));
            }

            tables.push(descriptor);
        }

        Ok(ImageHeader {
            sanity,
            version,
            tables,
        })
    }

    /// Directory entry for a table.
    #[must_use]
    pub fn descriptor(&self, table: TableId) -> TableDescriptor {
        self.tables[table as usize]
    }

    /// Number of rows in a table, derived from its size and stride.
    #[must_use]
    pub fn row_count(&self, table: TableId) -> u32 {
        self.descriptor(table).size / table.stride()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_header_bytes() -> Vec<u8> {
        let mut data = Vec::with_capacity(ImageHeader::SIZE);
        data.extend_from_slice(&METADATA_SANITY.to_le_bytes());
        data.extend_from_slice(&METADATA_VERSION.to_le_bytes());
        for _ in TableId::iter() {
            data.extend_from_slice(&0u32.to_le_bytes());
            data.extend_from_slice(&0u32.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_parse_empty_tables() {
        let data = empty_header_bytes();
        let header = ImageHeader::parse(&data).unwrap();
        assert_eq!(header.sanity, METADATA_SANITY);
        assert_eq!(header.version, METADATA_VERSION);
        for table_id in TableId::iter() {
            assert_eq!(header.row_count(table_id), 0);
        }
    }

    #[test]
    fn test_reject_bad_sanity() {
        let mut data = empty_header_bytes();
        data[0] ^= 0xFF;
        assert!(matches!(
            ImageHeader::parse(&data),
            Err(crate::Error::NotSupported)
        ));
    }

    #[test]
    fn test_reject_bad_version() {
        let mut data = empty_header_bytes();
        data[4] = 0x7F;
        assert!(matches!(
            ImageHeader::parse(&data),
            Err(crate::Error::NotSupported)
        ));
    }

    #[test]
    fn test_reject_empty_input() {
        assert!(matches!(ImageHeader::parse(&[]), Err(crate::Error::Empty)));
    }

    #[test]
    fn test_reject_truncated_header() {
        let data = empty_header_bytes();
        assert!(matches!(
            ImageHeader::parse(&data[..16]),
            Err(crate::Error::OutOfBounds)
        ));
    }

    #[test]
    fn test_reject_table_past_end() {
        let mut data = empty_header_bytes();
        // Point the Methods table past the end of the blob.
        let dir_offset = 8 + (TableId::Methods as usize) * 8;
        let past_end = data.len() as u32;
        data[dir_offset..dir_offset + 4].copy_from_slice(&past_end.to_le_bytes());
        data[dir_offset + 4..dir_offset + 8].copy_from_slice(&32u32.to_le_bytes());
        assert!(matches!(
            ImageHeader::parse(&data),
            Err(crate::Error::Malformed { .. })
        ));
    }

    #[test]
    fn test_reject_unaligned_table_size() {
        let mut data = empty_header_bytes();
        data.extend_from_slice(&[0u8; 40]);
        let dir_offset = 8 + (TableId::Methods as usize) * 8;
        let table_offset = ImageHeader::SIZE as u32;
        data[dir_offset..dir_offset + 4].copy_from_slice(&table_offset.to_le_bytes());
        // 17 bytes is not a multiple of the 32-byte method stride.
        data[dir_offset + 4..dir_offset + 8].copy_from_slice(&17u32.to_le_bytes());
        assert!(matches!(
            ImageHeader::parse(&data),
            Err(crate::Error::Malformed { .. })
        ));
    }

    #[test]
    fn test_strides_nonzero() {
        for table_id in TableId::iter() {
            assert!(table_id.stride() >= 1, "{:?} has zero stride", table_id);
        }
    }
}
