//! In-memory construction of metadata blobs.
//!
//! [`ImageBuilder`] produces blobs that satisfy the exact offset/size contract the
//! parser validates: the fixed header first, then every table packed sequentially in
//! directory order. Conversion tools use it to emit images; the test suites use it to
//! build small, precisely-shaped fixtures.
//!
//! Rows are appended through typed `add_*` methods that return the new row's index,
//! so cross-table references can be wired up incrementally.

use strum::{EnumCount, IntoEnumIterator};

use crate::{
    metadata::{
        header::{TableId, METADATA_SANITY, METADATA_VERSION},
        reader::MetadataImage,
        tables::{
            AssemblyRow, EventRow, FieldRefRow, FieldRow, GenericContainerRow, GenericParamRow,
            ImageRow, InterfaceOffsetRow, MethodRow, ParamRow, PropertyRow, TypeDefRow, TypeRow,
        },
    },
    Result,
};

/// Builds a metadata blob table by table.
///
/// Tables start empty; anything not populated is emitted as a zero-size table
/// with a zero offset, which the parser treats as empty.
#[derive(Default)]
pub struct ImageBuilder {
    tables: Vec<Vec<u8>>,
}

fn push_u16(buffer: &mut Vec<u8>, value: u16) {
    buffer.extend_from_slice(&value.to_le_bytes());
}

fn push_i16(buffer: &mut Vec<u8>, value: i16) {
    buffer.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(buffer: &mut Vec<u8>, value: u32) {
    buffer.extend_from_slice(&value.to_le_bytes());
}

fn push_i32(buffer: &mut Vec<u8>, value: i32) {
    buffer.extend_from_slice(&value.to_le_bytes());
}

impl ImageBuilder {
    /// Create a builder with every table empty.
    #[must_use]
    pub fn new() -> Self {
        ImageBuilder {
            tables: vec![Vec::new(); <TableId as EnumCount>::COUNT],
        }
    }

    fn table(&mut self, table: TableId) -> &mut Vec<u8> {
        &mut self.tables[table as usize]
    }

    fn next_row(&self, table: TableId) -> u32 {
        (self.tables[table as usize].len() as u32) / table.stride()
    }

    /// Append a name to the string heap, returning its heap index.
    pub fn add_string(&mut self, value: &str) -> u32 {
        let heap = self.table(TableId::String);
        let index = heap.len() as u32;
        heap.extend_from_slice(value.as_bytes());
        heap.push(0);
        index
    }

    /// Append a string literal, returning its literal row index.
    pub fn add_string_literal(&mut self, value: &str) -> u32 {
        let data_index = {
            let data = self.table(TableId::StringLiteralData);
            let index = data.len() as u32;
            data.extend_from_slice(value.as_bytes());
            index
        };

        let index = self.next_row(TableId::StringLiteral);
        let rows = self.table(TableId::StringLiteral);
        push_u32(rows, value.len() as u32);
        push_u32(rows, data_index);
        index
    }

    /// Append a type definition row, returning its row index.
    pub fn add_type_def(&mut self, row: &TypeDefRow) -> u32 {
        let index = self.next_row(TableId::TypeDefinitions);
        let rows = self.table(TableId::TypeDefinitions);
        push_u32(rows, row.name);
        push_u32(rows, row.namespace);
        push_i32(rows, row.byval_type);
        push_i32(rows, row.declaring_type);
        push_i32(rows, row.parent);
        push_i32(rows, row.element_type);
        push_i32(rows, row.generic_container);
        push_u32(rows, row.flags);
        push_i32(rows, row.field_start);
        push_i32(rows, row.method_start);
        push_i32(rows, row.event_start);
        push_i32(rows, row.property_start);
        push_i32(rows, row.nested_types_start);
        push_i32(rows, row.interfaces_start);
        push_i32(rows, row.vtable_start);
        push_i32(rows, row.interface_offsets_start);
        push_u16(rows, row.method_count);
        push_u16(rows, row.property_count);
        push_u16(rows, row.field_count);
        push_u16(rows, row.event_count);
        push_u16(rows, row.nested_type_count);
        push_u16(rows, row.vtable_count);
        push_u16(rows, row.interfaces_count);
        push_u16(rows, row.interface_offsets_count);
        push_u32(rows, row.bitfield);
        push_u32(rows, row.token);
        index
    }

    /// Append a method row, returning its row index.
    pub fn add_method(&mut self, row: &MethodRow) -> u32 {
        let index = self.next_row(TableId::Methods);
        let rows = self.table(TableId::Methods);
        push_u32(rows, row.name);
        push_i32(rows, row.declaring_type);
        push_i32(rows, row.return_type);
        push_i32(rows, row.parameter_start);
        push_i32(rows, row.generic_container);
        push_u32(rows, row.token);
        push_u16(rows, row.flags);
        push_u16(rows, row.impl_flags);
        push_u16(rows, row.slot);
        push_u16(rows, row.parameter_count);
        index
    }

    /// Append a field row, returning its row index.
    pub fn add_field(&mut self, row: &FieldRow) -> u32 {
        let index = self.next_row(TableId::Fields);
        let rows = self.table(TableId::Fields);
        push_u32(rows, row.name);
        push_i32(rows, row.type_index);
        push_u32(rows, row.token);
        index
    }

    /// Append a parameter row, returning its row index.
    pub fn add_param(&mut self, row: &ParamRow) -> u32 {
        let index = self.next_row(TableId::Parameters);
        let rows = self.table(TableId::Parameters);
        push_u32(rows, row.name);
        push_u32(rows, row.token);
        push_i32(rows, row.type_index);
        index
    }

    /// Append a property row, returning its row index.
    pub fn add_property(&mut self, row: &PropertyRow) -> u32 {
        let index = self.next_row(TableId::Properties);
        let rows = self.table(TableId::Properties);
        push_u32(rows, row.name);
        push_i32(rows, row.get);
        push_i32(rows, row.set);
        push_u32(rows, row.attrs);
        push_u32(rows, row.token);
        index
    }

    /// Append an event row, returning its row index.
    pub fn add_event(&mut self, row: &EventRow) -> u32 {
        let index = self.next_row(TableId::Events);
        let rows = self.table(TableId::Events);
        push_u32(rows, row.name);
        push_i32(rows, row.type_index);
        push_i32(rows, row.add);
        push_i32(rows, row.remove);
        push_i32(rows, row.raise);
        push_u32(rows, row.token);
        index
    }

    /// Append an encoded type descriptor row, returning its row index.
    pub fn add_type(&mut self, row: &TypeRow) -> u32 {
        let index = self.next_row(TableId::Types);
        let rows = self.table(TableId::Types);
        rows.push(row.kind);
        rows.push(row.rank);
        push_u16(rows, row.attrs);
        push_i32(rows, row.data);
        rows.push(row.bits);
        rows.extend_from_slice(&row.pad);
        index
    }

    /// Append a generic parameter row, returning its row index.
    pub fn add_generic_param(&mut self, row: &GenericParamRow) -> u32 {
        let index = self.next_row(TableId::GenericParameters);
        let rows = self.table(TableId::GenericParameters);
        push_i32(rows, row.owner);
        push_u32(rows, row.name);
        push_i16(rows, row.constraints_start);
        push_i16(rows, row.constraints_count);
        push_u16(rows, row.num);
        push_u16(rows, row.flags);
        index
    }

    /// Append a generic container row, returning its row index.
    pub fn add_generic_container(&mut self, row: &GenericContainerRow) -> u32 {
        let index = self.next_row(TableId::GenericContainers);
        let rows = self.table(TableId::GenericContainers);
        push_i32(rows, row.owner);
        push_i32(rows, row.type_argc);
        push_i32(rows, row.is_method);
        push_i32(rows, row.generic_parameter_start);
        index
    }

    /// Append an interface offset row, returning its row index.
    pub fn add_interface_offset(&mut self, row: &InterfaceOffsetRow) -> u32 {
        let index = self.next_row(TableId::InterfaceOffsets);
        let rows = self.table(TableId::InterfaceOffsets);
        push_i32(rows, row.interface_type);
        push_i32(rows, row.offset);
        index
    }

    /// Append a field reference row, returning its row index.
    pub fn add_field_ref(&mut self, row: &FieldRefRow) -> u32 {
        let index = self.next_row(TableId::FieldRefs);
        let rows = self.table(TableId::FieldRefs);
        push_i32(rows, row.type_index);
        push_i32(rows, row.field_index);
        index
    }

    /// Append an image row, returning its row index.
    pub fn add_image(&mut self, row: &ImageRow) -> u32 {
        let index = self.next_row(TableId::Images);
        let rows = self.table(TableId::Images);
        push_u32(rows, row.name);
        push_i32(rows, row.assembly);
        push_i32(rows, row.type_start);
        push_u32(rows, row.type_count);
        push_i32(rows, row.entry_point);
        push_u32(rows, row.token);
        index
    }

    /// Append an assembly row, returning its row index.
    pub fn add_assembly(&mut self, row: &AssemblyRow) -> u32 {
        let index = self.next_row(TableId::Assemblies);
        let rows = self.table(TableId::Assemblies);
        push_i32(rows, row.image);
        push_u32(rows, row.token);
        push_i32(rows, row.referenced_assembly_start);
        push_i32(rows, row.referenced_assembly_count);
        push_u32(rows, row.name);
        index
    }

    /// Append a raw `u32` entry to an index table such as
    /// [`TableId::Interfaces`] or [`TableId::VtableMethods`], returning its
    /// entry index.
    pub fn add_index_entry(&mut self, table: TableId, value: u32) -> u32 {
        let index = self.next_row(table);
        push_u32(self.table(table), value);
        index
    }

    /// Serialize the header and all tables into one packed blob.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        let header_size = 8 + <TableId as EnumCount>::COUNT * 8;

        let mut blob = Vec::with_capacity(
            header_size + self.tables.iter().map(Vec::len).sum::<usize>(),
        );
        blob.extend_from_slice(&METADATA_SANITY.to_le_bytes());
        blob.extend_from_slice(&METADATA_VERSION.to_le_bytes());

        let mut cursor = header_size as u32;
        for table_id in TableId::iter() {
            let size = self.tables[table_id as usize].len() as u32;
            let offset = if size == 0 { 0 } else { cursor };
            blob.extend_from_slice(&offset.to_le_bytes());
            blob.extend_from_slice(&size.to_le_bytes());
            cursor += size;
        }

        for table in &self.tables {
            blob.extend_from_slice(table);
        }

        blob
    }

    /// Serialize the blob and parse it back into a [`MetadataImage`].
    ///
    /// # Errors
    /// Returns any validation error from [`MetadataImage::from_bytes`]; a builder
    /// used through the typed `add_*` methods always produces a valid blob.
    pub fn build(&self) -> Result<MetadataImage> {
        MetadataImage::from_bytes(self.bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::RowRead;

    #[test]
    fn test_built_blob_header_validates() {
        let image = ImageBuilder::new().build().unwrap();
        assert_eq!(image.header().sanity, METADATA_SANITY);
        assert_eq!(image.header().version, METADATA_VERSION);
    }

    #[test]
    fn test_type_def_round_trip() {
        let mut builder = ImageBuilder::new();
        let name = builder.add_string("Widget");
        let namespace = builder.add_string("App");

        let index = builder.add_type_def(&TypeDefRow {
            name,
            namespace,
            byval_type: 0,
            declaring_type: -1,
            parent: -1,
            element_type: -1,
            generic_container: -1,
            flags: 0,
            field_start: -1,
            method_start: -1,
            event_start: -1,
            property_start: -1,
            nested_types_start: -1,
            interfaces_start: -1,
            vtable_start: -1,
            interface_offsets_start: -1,
            method_count: 0,
            property_count: 0,
            field_count: 0,
            event_count: 0,
            nested_type_count: 0,
            vtable_count: 0,
            interfaces_count: 0,
            interface_offsets_count: 0,
            bitfield: 0x0000_0005,
            token: 0x0200_0001,
        });

        let image = builder.build().unwrap();
        let row: TypeDefRow = image.row(index).unwrap();
        assert_eq!(image.string(row.name).unwrap(), "Widget");
        assert_eq!(image.string(row.namespace).unwrap(), "App");
        assert_eq!(row.parent, -1);
        assert!(row.is_value_type());
        assert!(!row.is_enum());
        assert!(row.has_cctor());
        assert_eq!(row.token, 0x0200_0001);
    }

    #[test]
    fn test_index_entries() {
        let mut builder = ImageBuilder::new();
        builder.add_index_entry(TableId::Interfaces, 7);
        builder.add_index_entry(TableId::Interfaces, 9);
        let image = builder.build().unwrap();

        assert_eq!(image.index_entry(TableId::Interfaces, 0).unwrap(), 7);
        assert_eq!(image.index_entry(TableId::Interfaces, 1).unwrap(), 9);
        assert!(image.index_entry(TableId::Interfaces, 2).is_err());
    }

    #[test]
    fn test_method_row_table_constant() {
        assert_eq!(MethodRow::TABLE, TableId::Methods);
        assert_eq!(TableId::Methods.stride(), 32);
    }
}
