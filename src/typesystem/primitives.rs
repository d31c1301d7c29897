//! Primitive type sizes and alignments.
//!
//! The layout builder treats these as the leaves of every field graph. Sizes follow
//! the 64-bit target the engine is compiled for; there is no per-target abstraction
//! because generated code and the runtime always agree on the word size.

use crate::typesystem::descriptor::TypeKind;

/// Machine word size in bytes. References, pointers and native integers are one word.
pub const WORD_SIZE: u32 = 8;

/// Size in bytes of the object header every reference-type instance carries
/// (class pointer plus synchronization word).
pub const OBJECT_HEADER_SIZE: u32 = 16;

/// Size and alignment of a primitive kind, `None` for composite kinds.
///
/// `void` reports `None`; it is not a storable value and the layout builder
/// rejects fields of it separately.
#[must_use]
pub fn primitive_size_align(kind: TypeKind) -> Option<(u32, u32)> {
    match kind {
        TypeKind::Boolean | TypeKind::I1 | TypeKind::U1 => Some((1, 1)),
        TypeKind::Char | TypeKind::I2 | TypeKind::U2 => Some((2, 2)),
        TypeKind::I4 | TypeKind::U4 | TypeKind::R4 => Some((4, 4)),
        TypeKind::I8 | TypeKind::U8 | TypeKind::R8 => Some((8, 8)),
        TypeKind::I | TypeKind::U => Some((WORD_SIZE, WORD_SIZE)),
        _ => None,
    }
}

/// Whether a kind is stored as a machine pointer in object fields
/// (references, raw pointers, function pointers).
#[must_use]
pub fn is_pointer_sized(kind: TypeKind) -> bool {
    matches!(
        kind,
        TypeKind::String
            | TypeKind::Class
            | TypeKind::Object
            | TypeKind::Array
            | TypeKind::SzArray
            | TypeKind::Ptr
            | TypeKind::FnPtr
    )
}
