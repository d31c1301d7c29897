//! Instance and static field layout computation.
//!
//! Layout is computed once per class, ancestors first: a class's own fields are
//! appended after the inherited size, each at its natural alignment capped by the
//! class's explicit packing size (if any). Static fields are laid out in an
//! independent block starting at offset zero.
//!
//! The arithmetic here is pure; resolving each field's size and alignment
//! (which may recurse into value-type field graphs) is the context builder's
//! job, which hands the resolved shapes in.

/// Size and alignment of one field's storage, resolved by the context builder.
#[derive(Debug, Clone, Copy)]
pub struct FieldShape {
    /// Storage size in bytes
    pub size: u32,
    /// Natural alignment in bytes
    pub align: u32,
    /// Index into the owning class's field table
    pub field: u32,
    /// The field lives in the static block
    pub is_static: bool,
}

/// Byte offset assigned to one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldOffset {
    /// Index into the owning class's field table
    pub field: u32,
    /// Byte offset within the instance (or static block for static fields)
    pub offset: u32,
}

/// Computed layout of one class.
#[derive(Debug, Clone)]
pub struct ClassLayout {
    /// Full instance size in bytes, header included for reference types
    pub instance_size: u32,
    /// Instance alignment in bytes
    pub instance_align: u32,
    /// Size of the static block in bytes, 0 when the class has no static fields
    pub static_size: u32,
    /// Offsets of instance fields, in field-table order
    pub instance_offsets: Vec<FieldOffset>,
    /// Offsets of static fields within the static block, in field-table order
    pub static_offsets: Vec<FieldOffset>,
}

fn align_to(value: u32, align: u32) -> u32 {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// Lay out a class's own fields after its inherited size.
///
/// `base_size`/`base_align` describe the inherited prefix: the parent's instance
/// size for reference types, the parent's unpadded size for value types, or the
/// object header for a parentless reference type. `packing` caps every field's
/// alignment when non-zero.
#[must_use]
pub fn compute(
    shapes: &[FieldShape],
    base_size: u32,
    base_align: u32,
    packing: u8,
    is_value_type: bool,
) -> ClassLayout {
    let cap = |align: u32| -> u32 {
        if packing == 0 {
            align
        } else {
            align.min(u32::from(packing))
        }
    };

    let mut cursor = base_size;
    let mut instance_align = base_align.max(1);
    let mut instance_offsets = Vec::new();

    let mut static_cursor = 0_u32;
    let mut static_offsets = Vec::new();

    for shape in shapes {
        let align = cap(shape.align.max(1));
        if shape.is_static {
            static_cursor = align_to(static_cursor, align);
            static_offsets.push(FieldOffset {
                field: shape.field,
                offset: static_cursor,
            });
            static_cursor += shape.size;
        } else {
            cursor = align_to(cursor, align);
            instance_offsets.push(FieldOffset {
                field: shape.field,
                offset: cursor,
            });
            cursor += shape.size;
            instance_align = instance_align.max(align);
        }
    }

    let mut instance_size = align_to(cursor, instance_align);
    if is_value_type && instance_size == 0 {
        // An empty struct still occupies one addressable byte.
        instance_size = 1;
    }

    ClassLayout {
        instance_size,
        instance_align,
        static_size: static_cursor,
        instance_offsets,
        static_offsets,
    }
}
