//! Shared fixture helpers for the integration tests.
//!
//! Blob fixtures are built with [`ImageBuilder`]; the helpers here cut down the
//! boilerplate of fully specified rows.
#![allow(dead_code)]

use aotcore::metadata::tables::{FieldRow, MethodRow, TypeDefRow, TypeRow, METHOD_NO_SLOT};
use aotcore::typesystem::TypeKind;

/// Type-definition bitfield bits.
pub const BIT_VALUETYPE: u32 = 0x1;
pub const BIT_HAS_CCTOR: u32 = 0x4;
pub const BIT_INTERFACE: u32 = 0x8;

/// Method flag bits.
pub const FLAG_STATIC: u16 = 0x0010;
pub const FLAG_VIRTUAL: u16 = 0x0040;
pub const FLAG_NEW_SLOT: u16 = 0x0100;
pub const FLAG_ABSTRACT: u16 = 0x0400;

/// A type-definition row with every member range empty.
pub fn empty_type_def(name: u32, namespace: u32, token: u32) -> TypeDefRow {
    TypeDefRow {
        name,
        namespace,
        byval_type: -1,
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
        bitfield: 0,
        token,
    }
}

/// An encoded type descriptor row with no flags set.
pub fn type_row(kind: TypeKind, data: i32) -> TypeRow {
    TypeRow {
        kind: kind as u8,
        rank: 0,
        attrs: 0,
        data,
        bits: 0,
        pad: [0; 3],
    }
}

/// A type descriptor row carrying field attribute flags.
pub fn typed_field_row(kind: TypeKind, data: i32, attrs: u16) -> TypeRow {
    TypeRow {
        attrs,
        ..type_row(kind, data)
    }
}

/// A field row.
pub fn field_row(name: u32, type_index: u32, token: u32) -> FieldRow {
    FieldRow {
        name,
        type_index: type_index as i32,
        token,
    }
}

/// A parameterless method row.
pub fn method_row(
    name: u32,
    declaring_type: u32,
    return_type: u32,
    flags: u16,
    token: u32,
) -> MethodRow {
    MethodRow {
        name,
        declaring_type: declaring_type as i32,
        return_type: return_type as i32,
        parameter_start: -1,
        generic_container: -1,
        token,
        flags,
        impl_flags: 0,
        slot: METHOD_NO_SLOT,
        parameter_count: 0,
    }
}
