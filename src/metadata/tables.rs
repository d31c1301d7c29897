//! Typed row accessors for the metadata tables.
//!
//! Every fixed-stride table has a row struct here plus a [`RowRead`] implementation
//! that decodes one packed row. Decoding is reference-based: the reader hands each
//! implementation a bounds-checked slice of exactly one row, and the row struct owns
//! only plain integers — names and nested structures are resolved lazily through
//! the indices the row carries.
//!
//! Index conventions:
//! - `*_start` fields are absolute row indices into the referenced table; `-1`
//!   (or a negative value) means "none".
//! - `type index` fields index the [`crate::metadata::header::TableId::Types`]
//!   table of encoded type descriptors.

use crate::{
    metadata::{header::TableId, io::read_le_at},
    Result,
};

/// Trait for decoding one packed table row.
///
/// Implement this for each row struct; the reader validates bounds and row
/// alignment before calling [`RowRead::read_row`] with a slice of exactly
/// one row stride.
pub trait RowRead: Sized {
    /// The table this row type belongs to.
    const TABLE: TableId;

    /// Decode one row from `data`, which holds exactly one row stride.
    ///
    /// # Errors
    /// Returns an error if the row cannot be decoded; with a validated header this
    /// only happens on logically inconsistent field values.
    fn read_row(data: &[u8]) -> Result<Self>;
}

/// One type definition, `TableId::TypeDefinitions`.
#[derive(Debug, Clone)]
pub struct TypeDefRow {
    /// Name heap index
    pub name: u32,
    /// Namespace heap index
    pub namespace: u32,
    /// Type-table index of this type's by-value descriptor
    pub byval_type: i32,
    /// Type-definition row of the declaring type, `-1` if not nested
    pub declaring_type: i32,
    /// Type-table index of the parent (base) type, `-1` for the `object` root
    pub parent: i32,
    /// Type-table index of the element type (arrays, enums), `-1` if none
    pub element_type: i32,
    /// Generic container row, `-1` for non-generic types
    pub generic_container: i32,
    /// Type attribute flags
    pub flags: u32,
    /// First field row owned by this type
    pub field_start: i32,
    /// First method row owned by this type
    pub method_start: i32,
    /// First event row owned by this type
    pub event_start: i32,
    /// First property row owned by this type
    pub property_start: i32,
    /// First nested-type entry owned by this type
    pub nested_types_start: i32,
    /// First interface entry owned by this type
    pub interfaces_start: i32,
    /// First vtable-method entry owned by this type
    pub vtable_start: i32,
    /// First interface-offset entry owned by this type
    pub interface_offsets_start: i32,
    /// Number of methods
    pub method_count: u16,
    /// Number of properties
    pub property_count: u16,
    /// Number of fields
    pub field_count: u16,
    /// Number of events
    pub event_count: u16,
    /// Number of nested types
    pub nested_type_count: u16,
    /// Number of vtable slots emitted at conversion time
    pub vtable_count: u16,
    /// Number of directly implemented interfaces
    pub interfaces_count: u16,
    /// Number of interface-offset entries
    pub interface_offsets_count: u16,
    /// Packed boolean properties, see the accessor methods
    pub bitfield: u32,
    /// Metadata token of this type
    pub token: u32,
}

impl TypeDefRow {
    /// The type is a value type.
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        self.bitfield & 0x1 != 0
    }

    /// The type is an enum (implies value type).
    #[must_use]
    pub fn is_enum(&self) -> bool {
        self.bitfield & 0x2 != 0
    }

    /// The type declares a static constructor.
    #[must_use]
    pub fn has_cctor(&self) -> bool {
        self.bitfield & 0x4 != 0
    }

    /// The type is an interface.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.bitfield & 0x8 != 0
    }

    /// The type is abstract.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.bitfield & 0x10 != 0
    }

    /// Explicit field packing size in bytes, 0 when the natural packing applies.
    #[must_use]
    pub fn packing_size(&self) -> u8 {
        (self.bitfield >> 24) as u8
    }
}

impl RowRead for TypeDefRow {
    const TABLE: TableId = TableId::TypeDefinitions;

    fn read_row(data: &[u8]) -> Result<Self> {
        let mut offset = 0;
        Ok(TypeDefRow {
            name: read_le_at::<u32>(data, &mut offset)?,
            namespace: read_le_at::<u32>(data, &mut offset)?,
            byval_type: read_le_at::<i32>(data, &mut offset)?,
            declaring_type: read_le_at::<i32>(data, &mut offset)?,
            parent: read_le_at::<i32>(data, &mut offset)?,
            element_type: read_le_at::<i32>(data, &mut offset)?,
            generic_container: read_le_at::<i32>(data, &mut offset)?,
            flags: read_le_at::<u32>(data, &mut offset)?,
            field_start: read_le_at::<i32>(data, &mut offset)?,
            method_start: read_le_at::<i32>(data, &mut offset)?,
            event_start: read_le_at::<i32>(data, &mut offset)?,
            property_start: read_le_at::<i32>(data, &mut offset)?,
            nested_types_start: read_le_at::<i32>(data, &mut offset)?,
            interfaces_start: read_le_at::<i32>(data, &mut offset)?,
            vtable_start: read_le_at::<i32>(data, &mut offset)?,
            interface_offsets_start: read_le_at::<i32>(data, &mut offset)?,
            method_count: read_le_at::<u16>(data, &mut offset)?,
            property_count: read_le_at::<u16>(data, &mut offset)?,
            field_count: read_le_at::<u16>(data, &mut offset)?,
            event_count: read_le_at::<u16>(data, &mut offset)?,
            nested_type_count: read_le_at::<u16>(data, &mut offset)?,
            vtable_count: read_le_at::<u16>(data, &mut offset)?,
            interfaces_count: read_le_at::<u16>(data, &mut offset)?,
            interface_offsets_count: read_le_at::<u16>(data, &mut offset)?,
            bitfield: read_le_at::<u32>(data, &mut offset)?,
            token: read_le_at::<u32>(data, &mut offset)?,
        })
    }
}

/// One method definition, `TableId::Methods`.
#[derive(Debug, Clone)]
pub struct MethodRow {
    /// Name heap index
    pub name: u32,
    /// Owning type-definition row
    pub declaring_type: i32,
    /// Type-table index of the return type
    pub return_type: i32,
    /// First parameter row, `-1` when the method has no parameters
    pub parameter_start: i32,
    /// Generic container row, `-1` for non-generic methods
    pub generic_container: i32,
    /// Metadata token of this method
    pub token: u32,
    /// Method attribute flags
    pub flags: u16,
    /// Implementation attribute flags
    pub impl_flags: u16,
    /// Preassigned vtable slot, `u16::MAX` when not virtual
    pub slot: u16,
    /// Number of parameters
    pub parameter_count: u16,
}

/// Sentinel slot value for methods that do not participate in virtual dispatch.
pub const METHOD_NO_SLOT: u16 = u16::MAX;

bitflags::bitflags! {
    /// Method attribute flags carried by [`MethodRow::flags`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodFlags: u16 {
        /// Method is static
        const STATIC = 0x0010;
        /// Method participates in virtual dispatch
        const VIRTUAL = 0x0040;
        /// Method introduces a new vtable slot rather than overriding
        const NEW_SLOT = 0x0100;
        /// Method is abstract (no body of its own)
        const ABSTRACT = 0x0400;
        /// Method is a special runtime-named member (`.cctor`, `.ctor`)
        const SPECIAL_NAME = 0x0800;
    }
}

impl MethodRow {
    /// Decoded attribute flags.
    #[must_use]
    pub fn method_flags(&self) -> MethodFlags {
        MethodFlags::from_bits_truncate(self.flags)
    }

    /// The method participates in virtual dispatch.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.method_flags().contains(MethodFlags::VIRTUAL)
    }

    /// The method is static.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.method_flags().contains(MethodFlags::STATIC)
    }
}

impl RowRead for MethodRow {
    const TABLE: TableId = TableId::Methods;

    fn read_row(data: &[u8]) -> Result<Self> {
        let mut offset = 0;
        Ok(MethodRow {
            name: read_le_at::<u32>(data, &mut offset)?,
            declaring_type: read_le_at::<i32>(data, &mut offset)?,
            return_type: read_le_at::<i32>(data, &mut offset)?,
            parameter_start: read_le_at::<i32>(data, &mut offset)?,
            generic_container: read_le_at::<i32>(data, &mut offset)?,
            token: read_le_at::<u32>(data, &mut offset)?,
            flags: read_le_at::<u16>(data, &mut offset)?,
            impl_flags: read_le_at::<u16>(data, &mut offset)?,
            slot: read_le_at::<u16>(data, &mut offset)?,
            parameter_count: read_le_at::<u16>(data, &mut offset)?,
        })
    }
}

/// One field definition, `TableId::Fields`.
#[derive(Debug, Clone)]
pub struct FieldRow {
    /// Name heap index
    pub name: u32,
    /// Type-table index of the field type
    pub type_index: i32,
    /// Metadata token of this field
    pub token: u32,
}

/// Field attribute bit carried in the field type descriptor's attrs: field is static.
pub const FIELD_ATTRIBUTE_STATIC: u16 = 0x0010;

impl RowRead for FieldRow {
    const TABLE: TableId = TableId::Fields;

    fn read_row(data: &[u8]) -> Result<Self> {
        let mut offset = 0;
        Ok(FieldRow {
            name: read_le_at::<u32>(data, &mut offset)?,
            type_index: read_le_at::<i32>(data, &mut offset)?,
            token: read_le_at::<u32>(data, &mut offset)?,
        })
    }
}

/// One parameter definition, `TableId::Parameters`.
#[derive(Debug, Clone)]
pub struct ParamRow {
    /// Name heap index
    pub name: u32,
    /// Metadata token of this parameter
    pub token: u32,
    /// Type-table index of the parameter type
    pub type_index: i32,
}

impl RowRead for ParamRow {
    const TABLE: TableId = TableId::Parameters;

    fn read_row(data: &[u8]) -> Result<Self> {
        let mut offset = 0;
        Ok(ParamRow {
            name: read_le_at::<u32>(data, &mut offset)?,
            token: read_le_at::<u32>(data, &mut offset)?,
            type_index: read_le_at::<i32>(data, &mut offset)?,
        })
    }
}

/// One property definition, `TableId::Properties`.
#[derive(Debug, Clone)]
pub struct PropertyRow {
    /// Name heap index
    pub name: u32,
    /// Method row of the getter relative to the declaring type's `method_start`, `-1` if none
    pub get: i32,
    /// Method row of the setter relative to the declaring type's `method_start`, `-1` if none
    pub set: i32,
    /// Property attribute flags
    pub attrs: u32,
    /// Metadata token of this property
    pub token: u32,
}

impl RowRead for PropertyRow {
    const TABLE: TableId = TableId::Properties;

    fn read_row(data: &[u8]) -> Result<Self> {
        let mut offset = 0;
        Ok(PropertyRow {
            name: read_le_at::<u32>(data, &mut offset)?,
            get: read_le_at::<i32>(data, &mut offset)?,
            set: read_le_at::<i32>(data, &mut offset)?,
            attrs: read_le_at::<u32>(data, &mut offset)?,
            token: read_le_at::<u32>(data, &mut offset)?,
        })
    }
}

/// One event definition, `TableId::Events`.
#[derive(Debug, Clone)]
pub struct EventRow {
    /// Name heap index
    pub name: u32,
    /// Type-table index of the event handler type
    pub type_index: i32,
    /// `add` accessor method row relative to the declaring type's `method_start`, `-1` if none
    pub add: i32,
    /// `remove` accessor method row relative to the declaring type's `method_start`, `-1` if none
    pub remove: i32,
    /// `raise` accessor method row relative to the declaring type's `method_start`, `-1` if none
    pub raise: i32,
    /// Metadata token of this event
    pub token: u32,
}

impl RowRead for EventRow {
    const TABLE: TableId = TableId::Events;

    fn read_row(data: &[u8]) -> Result<Self> {
        let mut offset = 0;
        Ok(EventRow {
            name: read_le_at::<u32>(data, &mut offset)?,
            type_index: read_le_at::<i32>(data, &mut offset)?,
            add: read_le_at::<i32>(data, &mut offset)?,
            remove: read_le_at::<i32>(data, &mut offset)?,
            raise: read_le_at::<i32>(data, &mut offset)?,
            token: read_le_at::<u32>(data, &mut offset)?,
        })
    }
}

/// One generic parameter definition, `TableId::GenericParameters`.
#[derive(Debug, Clone)]
pub struct GenericParamRow {
    /// Owning generic container row
    pub owner: i32,
    /// Name heap index
    pub name: u32,
    /// First constraint entry, `-1` when unconstrained
    pub constraints_start: i16,
    /// Number of constraint entries
    pub constraints_count: i16,
    /// Zero-based position within the owning container
    pub num: u16,
    /// Variance and special-constraint flags
    pub flags: u16,
}

impl RowRead for GenericParamRow {
    const TABLE: TableId = TableId::GenericParameters;

    fn read_row(data: &[u8]) -> Result<Self> {
        let mut offset = 0;
        Ok(GenericParamRow {
            owner: read_le_at::<i32>(data, &mut offset)?,
            name: read_le_at::<u32>(data, &mut offset)?,
            constraints_start: read_le_at::<i16>(data, &mut offset)?,
            constraints_count: read_le_at::<i16>(data, &mut offset)?,
            num: read_le_at::<u16>(data, &mut offset)?,
            flags: read_le_at::<u16>(data, &mut offset)?,
        })
    }
}

/// One generic container definition, `TableId::GenericContainers`.
///
/// A container describes the generic parameter list of one generic type or
/// generic method.
#[derive(Debug, Clone)]
pub struct GenericContainerRow {
    /// Owning type-definition row (or method row for method containers)
    pub owner: i32,
    /// Number of generic parameters
    pub type_argc: i32,
    /// Non-zero when the owner is a generic method rather than a generic type
    pub is_method: i32,
    /// First generic parameter row of this container
    pub generic_parameter_start: i32,
}

impl RowRead for GenericContainerRow {
    const TABLE: TableId = TableId::GenericContainers;

    fn read_row(data: &[u8]) -> Result<Self> {
        let mut offset = 0;
        Ok(GenericContainerRow {
            owner: read_le_at::<i32>(data, &mut offset)?,
            type_argc: read_le_at::<i32>(data, &mut offset)?,
            is_method: read_le_at::<i32>(data, &mut offset)?,
            generic_parameter_start: read_le_at::<i32>(data, &mut offset)?,
        })
    }
}

/// One interface offset pair, `TableId::InterfaceOffsets`.
#[derive(Debug, Clone, Copy)]
pub struct InterfaceOffsetRow {
    /// Type-table index of the interface
    pub interface_type: i32,
    /// First vtable slot at which the interface's methods are laid out
    pub offset: i32,
}

impl RowRead for InterfaceOffsetRow {
    const TABLE: TableId = TableId::InterfaceOffsets;

    fn read_row(data: &[u8]) -> Result<Self> {
        let mut offset = 0;
        Ok(InterfaceOffsetRow {
            interface_type: read_le_at::<i32>(data, &mut offset)?,
            offset: read_le_at::<i32>(data, &mut offset)?,
        })
    }
}

/// One encoded type descriptor, `TableId::Types`.
///
/// This is the serialized form of a [`crate::typesystem::TypeDesc`]: the kind tag,
/// attribute flags, the boolean bits, and a kind-dependent payload value.
#[derive(Debug, Clone, Copy)]
pub struct TypeRow {
    /// Kind tag, see [`crate::typesystem::TypeKind`]
    pub kind: u8,
    /// Array rank for multi-dimensional arrays, 0 otherwise
    pub rank: u8,
    /// Attribute flags
    pub attrs: u16,
    /// Kind-dependent payload: type-definition row, element type-table index,
    /// or generic parameter number
    pub data: i32,
    /// Boolean bits: bit 0 by-ref, bit 1 pinned, bit 2 value type
    pub bits: u8,
    /// Reserved padding, must be zero
    pub pad: [u8; 3],
}

/// Bit in [`TypeRow::bits`]: the descriptor is passed by reference.
pub const TYPE_BIT_BYREF: u8 = 0x1;
/// Bit in [`TypeRow::bits`]: the descriptor is pinned.
pub const TYPE_BIT_PINNED: u8 = 0x2;
/// Bit in [`TypeRow::bits`]: the descriptor denotes a value type.
pub const TYPE_BIT_VALUETYPE: u8 = 0x4;

impl RowRead for TypeRow {
    const TABLE: TableId = TableId::Types;

    fn read_row(data: &[u8]) -> Result<Self> {
        let mut offset = 0;
        Ok(TypeRow {
            kind: read_le_at::<u8>(data, &mut offset)?,
            rank: read_le_at::<u8>(data, &mut offset)?,
            attrs: read_le_at::<u16>(data, &mut offset)?,
            data: read_le_at::<i32>(data, &mut offset)?,
            bits: read_le_at::<u8>(data, &mut offset)?,
            pad: [
                read_le_at::<u8>(data, &mut offset)?,
                read_le_at::<u8>(data, &mut offset)?,
                read_le_at::<u8>(data, &mut offset)?,
            ],
        })
    }
}

/// One string literal descriptor, `TableId::StringLiteral`.
#[derive(Debug, Clone, Copy)]
pub struct StringLiteralRow {
    /// Length of the literal in bytes
    pub length: u32,
    /// Byte offset into `TableId::StringLiteralData`
    pub data_index: u32,
}

impl RowRead for StringLiteralRow {
    const TABLE: TableId = TableId::StringLiteral;

    fn read_row(data: &[u8]) -> Result<Self> {
        let mut offset = 0;
        Ok(StringLiteralRow {
            length: read_le_at::<u32>(data, &mut offset)?,
            data_index: read_le_at::<u32>(data, &mut offset)?,
        })
    }
}

/// One field reference, `TableId::FieldRefs`.
#[derive(Debug, Clone, Copy)]
pub struct FieldRefRow {
    /// Type-table index of the declaring type
    pub type_index: i32,
    /// Field position within the declaring type's field list
    pub field_index: i32,
}

impl RowRead for FieldRefRow {
    const TABLE: TableId = TableId::FieldRefs;

    fn read_row(data: &[u8]) -> Result<Self> {
        let mut offset = 0;
        Ok(FieldRefRow {
            type_index: read_le_at::<i32>(data, &mut offset)?,
            field_index: read_le_at::<i32>(data, &mut offset)?,
        })
    }
}

/// One image definition, `TableId::Images`.
#[derive(Debug, Clone)]
pub struct ImageRow {
    /// Name heap index
    pub name: u32,
    /// Owning assembly row
    pub assembly: i32,
    /// First type-definition row of this image
    pub type_start: i32,
    /// Number of type definitions in this image
    pub type_count: u32,
    /// Method row of the entry point, `-1` if none
    pub entry_point: i32,
    /// Metadata token of this image
    pub token: u32,
}

impl RowRead for ImageRow {
    const TABLE: TableId = TableId::Images;

    fn read_row(data: &[u8]) -> Result<Self> {
        let mut offset = 0;
        Ok(ImageRow {
            name: read_le_at::<u32>(data, &mut offset)?,
            assembly: read_le_at::<i32>(data, &mut offset)?,
            type_start: read_le_at::<i32>(data, &mut offset)?,
            type_count: read_le_at::<u32>(data, &mut offset)?,
            entry_point: read_le_at::<i32>(data, &mut offset)?,
            token: read_le_at::<u32>(data, &mut offset)?,
        })
    }
}

/// One assembly definition, `TableId::Assemblies`.
#[derive(Debug, Clone)]
pub struct AssemblyRow {
    /// Image row of the assembly's single module image
    pub image: i32,
    /// Metadata token of this assembly
    pub token: u32,
    /// First referenced-assembly entry
    pub referenced_assembly_start: i32,
    /// Number of referenced-assembly entries
    pub referenced_assembly_count: i32,
    /// Name heap index
    pub name: u32,
}

impl RowRead for AssemblyRow {
    const TABLE: TableId = TableId::Assemblies;

    fn read_row(data: &[u8]) -> Result<Self> {
        let mut offset = 0;
        Ok(AssemblyRow {
            image: read_le_at::<i32>(data, &mut offset)?,
            token: read_le_at::<u32>(data, &mut offset)?,
            referenced_assembly_start: read_le_at::<i32>(data, &mut offset)?,
            referenced_assembly_count: read_le_at::<i32>(data, &mut offset)?,
            name: read_le_at::<u32>(data, &mut offset)?,
        })
    }
}
