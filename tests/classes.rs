//! Class building: field layout, vtable slot assignment and interface offsets.

mod common;

use std::sync::Arc;

use aotcore::prelude::*;
use aotcore::typesystem::OBJECT_HEADER_SIZE;
use common::*;

/// Base with a byte and an int field; Derived adds a long. Offsets respect
/// natural alignment, and the derived class appends after the inherited size.
fn inheritance_image() -> (MetadataImage, u32, u32) {
    let mut builder = ImageBuilder::new();

    let n_base = builder.add_string("Base");
    let n_derived = builder.add_string("Derived");
    let ns = builder.add_string("App");
    let n_b0 = builder.add_string("flag");
    let n_b1 = builder.add_string("count");
    let n_d0 = builder.add_string("total");

    let t_i1 = builder.add_type(&type_row(TypeKind::I1, 0));
    let t_i4 = builder.add_type(&type_row(TypeKind::I4, 0));
    let t_i8 = builder.add_type(&type_row(TypeKind::I8, 0));
    // Base's by-value descriptor; type-definition row 0 is Base.
    let t_base = builder.add_type(&type_row(TypeKind::Class, 0));

    let f0 = builder.add_field(&field_row(n_b0, t_i1, 0x0400_0001));
    builder.add_field(&field_row(n_b1, t_i4, 0x0400_0002));
    let f2 = builder.add_field(&field_row(n_d0, t_i8, 0x0400_0003));

    let mut base = empty_type_def(n_base, ns, 0x0200_0001);
    base.byval_type = t_base as i32;
    base.field_start = f0 as i32;
    base.field_count = 2;
    let base_row = builder.add_type_def(&base);

    let mut derived = empty_type_def(n_derived, ns, 0x0200_0002);
    derived.parent = t_base as i32;
    derived.field_start = f2 as i32;
    derived.field_count = 1;
    let derived_row = builder.add_type_def(&derived);

    (builder.build().unwrap(), base_row, derived_row)
}

#[test]
fn field_layout_respects_alignment_and_inheritance() {
    let (image, base_row, derived_row) = inheritance_image();
    let ctx = RuntimeContext::new(
        Arc::new(image),
        CodeRegistration::empty(),
        Arc::new(SystemAllocator),
    );

    let base = ctx.class_by_row(base_row).unwrap();
    let layout = base.layout().unwrap();
    // Reference type: fields start after the object header.
    assert_eq!(layout.instance_offsets[0].offset, OBJECT_HEADER_SIZE);
    assert_eq!(layout.instance_offsets[1].offset, OBJECT_HEADER_SIZE + 4);
    assert_eq!(layout.instance_size, OBJECT_HEADER_SIZE + 8);

    let derived = ctx.class_by_row(derived_row).unwrap();
    let derived_layout = derived.layout().unwrap();
    assert_eq!(derived_layout.instance_offsets[0].offset, layout.instance_size);
    assert_eq!(derived_layout.instance_size, layout.instance_size + 8);
    assert_eq!(derived.parent, Some(base.id));
}

#[test]
fn classes_are_built_once_per_row() {
    let (image, base_row, _) = inheritance_image();
    let ctx = RuntimeContext::new(
        Arc::new(image),
        CodeRegistration::empty(),
        Arc::new(SystemAllocator),
    );

    let a = ctx.class_by_row(base_row).unwrap();
    let b = ctx.class_by_row(base_row).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

/// Base declares Speak and Move; Derived overrides Move only. The override
/// reuses the ancestor's slot index.
fn vtable_image() -> (MetadataImage, u32, u32, CodeRegistration) {
    let mut builder = ImageBuilder::new();

    let n_base = builder.add_string("Animal");
    let n_derived = builder.add_string("Dog");
    let ns = builder.add_string("App");
    let n_speak = builder.add_string("Speak");
    let n_move = builder.add_string("Move");

    let t_void = builder.add_type(&type_row(TypeKind::Void, 0));
    let t_base = builder.add_type(&type_row(TypeKind::Class, 0));

    let m0 = builder.add_method(&method_row(
        n_speak,
        0,
        t_void,
        FLAG_VIRTUAL | FLAG_NEW_SLOT,
        0x0600_0001,
    ));
    builder.add_method(&method_row(
        n_move,
        0,
        t_void,
        FLAG_VIRTUAL | FLAG_NEW_SLOT,
        0x0600_0002,
    ));
    let m2 = builder.add_method(&method_row(n_move, 1, t_void, FLAG_VIRTUAL, 0x0600_0003));

    let mut base = empty_type_def(n_base, ns, 0x0200_0001);
    base.byval_type = t_base as i32;
    base.method_start = m0 as i32;
    base.method_count = 2;
    let base_row = builder.add_type_def(&base);

    let mut derived = empty_type_def(n_derived, ns, 0x0200_0002);
    derived.parent = t_base as i32;
    derived.method_start = m2 as i32;
    derived.method_count = 1;
    let derived_row = builder.add_type_def(&derived);

    // Entry points indexed by method row.
    let code = CodeRegistration::new(vec![0x1000, 0x2000, 0x3000], vec![], vec![]);
    (builder.build().unwrap(), base_row, derived_row, code)
}

#[test]
fn override_reuses_ancestor_slot() {
    let (image, base_row, derived_row, code) = vtable_image();
    let ctx = RuntimeContext::new(Arc::new(image), code, Arc::new(SystemAllocator));

    let base = ctx.class_by_row(base_row).unwrap();
    let base_vtable = base.vtable().unwrap();
    assert_eq!(base_vtable.len(), 2);
    assert_eq!(base_vtable.slots[0].name, "Speak");
    assert_eq!(base_vtable.slots[1].name, "Move");
    assert_eq!(base_vtable.slots[1].pointer, Some(0x2000));

    let derived = ctx.class_by_row(derived_row).unwrap();
    let derived_vtable = derived.vtable().unwrap();
    // Same slot count: the override replaced slot 1 in place.
    assert_eq!(derived_vtable.len(), 2);
    assert_eq!(derived_vtable.slots[1].method.class, derived.id);
    assert_eq!(derived_vtable.slots[1].pointer, Some(0x3000));
    // Speak is still the base's.
    assert_eq!(derived_vtable.slots[0].method.class, base.id);
    assert_eq!(derived_vtable.slots[0].pointer, Some(0x1000));
}

/// Widget implements IDisposable; the interface gets a contiguous run appended
/// after the class's own virtual slots.
fn interface_image() -> (MetadataImage, u32, u32, CodeRegistration) {
    let mut builder = ImageBuilder::new();

    let n_iface = builder.add_string("IDisposable");
    let n_widget = builder.add_string("Widget");
    let ns = builder.add_string("App");
    let n_dispose = builder.add_string("Dispose");

    let t_void = builder.add_type(&type_row(TypeKind::Void, 0));
    let t_iface = builder.add_type(&type_row(TypeKind::Class, 0));

    let m0 = builder.add_method(&method_row(
        n_dispose,
        0,
        t_void,
        FLAG_VIRTUAL | FLAG_NEW_SLOT | FLAG_ABSTRACT,
        0x0600_0001,
    ));
    let m1 = builder.add_method(&method_row(
        n_dispose,
        1,
        t_void,
        FLAG_VIRTUAL | FLAG_NEW_SLOT,
        0x0600_0002,
    ));

    let mut iface = empty_type_def(n_iface, ns, 0x0200_0001);
    iface.byval_type = t_iface as i32;
    iface.bitfield = BIT_INTERFACE;
    iface.method_start = m0 as i32;
    iface.method_count = 1;
    let iface_row = builder.add_type_def(&iface);

    let impl_entry = builder.add_index_entry(
        aotcore::metadata::header::TableId::Interfaces,
        t_iface,
    );

    let mut widget = empty_type_def(n_widget, ns, 0x0200_0002);
    widget.method_start = m1 as i32;
    widget.method_count = 1;
    widget.interfaces_start = impl_entry as i32;
    widget.interfaces_count = 1;
    let widget_row = builder.add_type_def(&widget);

    let code = CodeRegistration::new(vec![0, 0x5000], vec![], vec![]);
    (builder.build().unwrap(), iface_row, widget_row, code)
}

#[test]
fn interface_offsets_point_at_contiguous_runs() {
    let (image, _iface_row, widget_row, code) = interface_image();
    let ctx = RuntimeContext::new(Arc::new(image), code, Arc::new(SystemAllocator));

    let widget = ctx.class_by_row(widget_row).unwrap();
    let vtable = widget.vtable().unwrap();
    let offsets = widget.interface_offsets().unwrap();

    assert_eq!(offsets.len(), 1);
    // Own virtual Dispose occupies slot 0; the interface run starts at 1.
    assert_eq!(offsets[0].offset, 1);
    assert_eq!(vtable.len(), 2);
    assert_eq!(vtable.slots[1].name, "Dispose");
    assert_eq!(vtable.slots[1].pointer, Some(0x5000));
    // The run slot points at the implementing method, not the abstract one.
    assert_eq!(vtable.slots[1].method.class, widget.id);
}

/// IFoo declares `Dispose`; Base implements it; Derived overrides it without
/// a new slot. Interface dispatch through Derived must reach the override.
fn interface_override_image() -> (MetadataImage, u32, u32, CodeRegistration) {
    let mut builder = ImageBuilder::new();

    let n_iface = builder.add_string("IFoo");
    let n_base = builder.add_string("Base");
    let n_derived = builder.add_string("Derived");
    let ns = builder.add_string("App");
    let n_dispose = builder.add_string("Dispose");

    let t_void = builder.add_type(&type_row(TypeKind::Void, 0));
    let t_iface = builder.add_type(&type_row(TypeKind::Class, 0));
    let t_base = builder.add_type(&type_row(TypeKind::Class, 1));

    let m0 = builder.add_method(&method_row(
        n_dispose,
        0,
        t_void,
        FLAG_VIRTUAL | FLAG_NEW_SLOT | FLAG_ABSTRACT,
        0x0600_0001,
    ));
    let m1 = builder.add_method(&method_row(
        n_dispose,
        1,
        t_void,
        FLAG_VIRTUAL | FLAG_NEW_SLOT,
        0x0600_0002,
    ));
    let m2 = builder.add_method(&method_row(n_dispose, 2, t_void, FLAG_VIRTUAL, 0x0600_0003));

    let mut iface = empty_type_def(n_iface, ns, 0x0200_0001);
    iface.byval_type = t_iface as i32;
    iface.bitfield = BIT_INTERFACE;
    iface.method_start = m0 as i32;
    iface.method_count = 1;
    builder.add_type_def(&iface);

    let impl_entry = builder.add_index_entry(
        aotcore::metadata::header::TableId::Interfaces,
        t_iface,
    );

    let mut base = empty_type_def(n_base, ns, 0x0200_0002);
    base.byval_type = t_base as i32;
    base.method_start = m1 as i32;
    base.method_count = 1;
    base.interfaces_start = impl_entry as i32;
    base.interfaces_count = 1;
    let base_row = builder.add_type_def(&base);

    let mut derived = empty_type_def(n_derived, ns, 0x0200_0003);
    derived.parent = t_base as i32;
    derived.method_start = m2 as i32;
    derived.method_count = 1;
    let derived_row = builder.add_type_def(&derived);

    let code = CodeRegistration::new(vec![0, 0x100, 0x200], vec![], vec![]);
    (builder.build().unwrap(), base_row, derived_row, code)
}

#[test]
fn override_reaches_inherited_interface_run() {
    let (image, base_row, derived_row, code) = interface_override_image();
    let ctx = RuntimeContext::new(Arc::new(image), code, Arc::new(SystemAllocator));

    let base = ctx.class_by_row(base_row).unwrap();
    let base_offsets = base.interface_offsets().unwrap();
    assert_eq!(base_offsets.len(), 1);
    let run = base_offsets[0].offset as usize;
    assert_eq!(base.vtable().unwrap().slots[run].pointer, Some(0x100));

    let derived = ctx.class_by_row(derived_row).unwrap();
    let derived_offsets = derived.interface_offsets().unwrap();
    // The inherited run keeps its slot index.
    assert_eq!(derived_offsets[0].offset as usize, run);

    // Both the primary slot and the interface-run duplicate dispatch to the
    // override.
    let vtable = derived.vtable().unwrap();
    assert_eq!(vtable.slots[0].pointer, Some(0x200));
    assert_eq!(vtable.slots[run].pointer, Some(0x200));
    assert_eq!(vtable.slots[run].method.class, derived.id);
}

#[test]
fn value_type_layout_has_no_header() {
    let mut builder = ImageBuilder::new();
    let n_point = builder.add_string("Point");
    let ns = builder.add_string("App");
    let n_x = builder.add_string("x");
    let n_y = builder.add_string("y");

    let t_i4 = builder.add_type(&type_row(TypeKind::I4, 0));
    let f0 = builder.add_field(&field_row(n_x, t_i4, 0x0400_0001));
    builder.add_field(&field_row(n_y, t_i4, 0x0400_0002));

    let mut point = empty_type_def(n_point, ns, 0x0200_0001);
    point.bitfield = BIT_VALUETYPE;
    point.field_start = f0 as i32;
    point.field_count = 2;
    let row = builder.add_type_def(&point);

    let ctx = RuntimeContext::new(
        Arc::new(builder.build().unwrap()),
        CodeRegistration::empty(),
        Arc::new(SystemAllocator),
    );

    let point = ctx.class_by_row(row).unwrap();
    assert!(point.is_value_type);
    let layout = point.layout().unwrap();
    assert_eq!(layout.instance_offsets[0].offset, 0);
    assert_eq!(layout.instance_offsets[1].offset, 4);
    assert_eq!(layout.instance_size, 8);
}

#[test]
fn hierarchy_chain_supports_constant_time_subclass_checks() {
    let (image, base_row, derived_row) = inheritance_image();
    let ctx = RuntimeContext::new(
        Arc::new(image),
        CodeRegistration::empty(),
        Arc::new(SystemAllocator),
    );

    let base = ctx.class_by_row(base_row).unwrap();
    let derived = ctx.class_by_row(derived_row).unwrap();

    assert_eq!(base.depth().unwrap(), 1);
    assert_eq!(derived.depth().unwrap(), 2);
    assert_eq!(derived.hierarchy().unwrap(), &[base.id, derived.id]);

    assert!(derived.is_subclass_of(&base).unwrap());
    assert!(!base.is_subclass_of(&derived).unwrap());
    assert!(ctx.is_assignable(&base, &derived).unwrap());
    assert!(!ctx.is_assignable(&derived, &base).unwrap());
    assert!(ctx.is_assignable(&base, &base).unwrap());
}

#[test]
fn interface_targets_are_assignable_from_implementors() {
    let (image, iface_row, widget_row, code) = interface_image();
    let ctx = RuntimeContext::new(Arc::new(image), code, Arc::new(SystemAllocator));

    let iface = ctx.class_by_row(iface_row).unwrap();
    let widget = ctx.class_by_row(widget_row).unwrap();

    assert!(ctx.is_assignable(&iface, &widget).unwrap());
    assert!(!ctx.is_assignable(&widget, &iface).unwrap());
}

#[test]
fn load_all_classes_builds_the_image() {
    let (image, _, _) = inheritance_image();
    let ctx = RuntimeContext::new(
        Arc::new(image),
        CodeRegistration::empty(),
        Arc::new(SystemAllocator),
    );
    ctx.load_all_classes().unwrap();
    assert_eq!(ctx.class_count(), 2);
}
