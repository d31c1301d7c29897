//! Virtual dispatch table construction.
//!
//! Slot assignment is ancestor-first: the parent's slots are copied with their
//! indices intact, overrides replace the matched ancestor slot in place, and
//! newly introduced virtual methods append fresh slots. An override matches its
//! ancestor slot by exact (name, signature) comparison over interned descriptors;
//! covariant signatures introduce a new slot instead.
//!
//! Interface dispatch reuses the same table: every implemented interface gets a
//! contiguous run of slots, inherited runs keep the parent's offsets, and newly
//! implemented interfaces get fresh runs appended after the last virtual slot.

use std::sync::Arc;

use crate::{
    runtime::class::{ClassId, MethodHandle, MethodInfo, MethodSig},
    typesystem::TypeRc,
    Result,
};

/// Opaque generated-code entry point.
pub type MethodPointer = usize;

/// One vtable slot: the owning method descriptor plus its entry point.
#[derive(Debug, Clone)]
pub struct VTableSlot {
    /// Method occupying this slot
    pub method: MethodHandle,
    /// Generated-code entry point; `None` for abstract methods
    pub pointer: Option<MethodPointer>,
    /// Method name, kept for override and interface matching
    pub name: String,
    /// Method signature, kept for override and interface matching
    pub signature: MethodSig,
}

/// Per-class virtual dispatch table.
#[derive(Debug, Clone, Default)]
pub struct VTable {
    /// Slots in index order; a subclass reuses the ancestor's index for overrides
    pub slots: Vec<VTableSlot>,
}

impl VTable {
    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the table has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Index of the slot matching (name, signature) exactly, if any.
    #[must_use]
    pub fn find_slot(&self, name: &str, signature: &MethodSig) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.name == name && &slot.signature == signature)
    }
}

/// Starting vtable index of one implemented interface's contiguous slot run.
#[derive(Debug, Clone)]
pub struct InterfaceOffsetEntry {
    /// Interned descriptor of the interface
    pub interface: TypeRc,
    /// First vtable slot of the interface's run
    pub offset: u32,
}

/// Build a class's vtable from its parent's table and its own method list.
///
/// Each method's entry point comes from its resolved [`MethodInfo::pointer`];
/// abstract methods occupy their slot with no pointer. An override replaces
/// every inherited slot with a matching (name, signature), interface-run
/// duplicates included.
pub fn build(class: ClassId, methods: &[MethodInfo], parent: Option<&VTable>) -> VTable {
    let mut table = parent.cloned().unwrap_or_default();
    let inherited = table.slots.len();

    for (index, method) in methods.iter().enumerate() {
        if !method.is_virtual() {
            continue;
        }

        let handle = MethodHandle {
            class,
            index: index as u32,
        };
        let slot = VTableSlot {
            method: handle,
            pointer: method.pointer,
            name: method.name.clone(),
            signature: method.signature.clone(),
        };

        let mut overrode = false;
        if !method.is_new_slot() {
            // The parent's table may hold the matched method more than once:
            // its primary slot plus a duplicate in every interface run that
            // dispatches to it. The override must land in all of them, or
            // interface dispatch keeps the stale ancestor entry.
            for existing in table.slots[..inherited]
                .iter_mut()
                .filter(|s| s.name == method.name && s.signature == method.signature)
            {
                *existing = slot.clone();
                overrode = true;
            }
        }
        if !overrode {
            table.slots.push(slot);
        }
    }

    table
}

/// Compute the interface offset table, extending the vtable with fresh runs for
/// interfaces this class introduces.
///
/// Inherited entries are kept as-is (their runs live in the inherited slot
/// range). Each direct interface not already covered gets a contiguous run
/// appended at the end of the vtable, one slot per interface method, each slot
/// pointing at this class's matching implementation.
///
/// `interface_methods` resolves an interface descriptor to its (name, signature)
/// method list; the context supplies it from the class arena.
///
/// # Errors
/// Returns [`crate::Error::TypeError`] if the class has no implementation for an
/// interface method.
pub fn interface_offsets(
    class_name: &str,
    direct_interfaces: &[TypeRc],
    inherited: &[InterfaceOffsetEntry],
    vtable: &mut VTable,
    interface_methods: &mut dyn FnMut(&TypeRc) -> Result<Vec<(String, MethodSig)>>,
) -> Result<Vec<InterfaceOffsetEntry>> {
    let mut entries: Vec<InterfaceOffsetEntry> = inherited.to_vec();

    for interface in direct_interfaces {
        if entries
            .iter()
            .any(|entry| Arc::ptr_eq(&entry.interface, interface))
        {
            continue;
        }

        let offset = vtable.slots.len() as u32;
        for (name, signature) in interface_methods(interface)? {
            let Some(implementation) = vtable.find_slot(&name, &signature) else {
                return Err(crate::Error::TypeError(format!(
                    "{class_name} does not implement {name} of {interface}"
                )));
            };
            let slot = vtable.slots[implementation].clone();
            vtable.slots.push(slot);
        }

        entries.push(InterfaceOffsetEntry {
            interface: Arc::clone(interface),
            offset,
        });
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::MethodFlags;
    use crate::typesystem::{TypeInterner, TypeKind};

    fn method(
        name: &str,
        sig: MethodSig,
        flags: MethodFlags,
        pointer: Option<MethodPointer>,
    ) -> MethodInfo {
        MethodInfo {
            name: name.to_string(),
            token: 0x0600_0001,
            flags,
            signature: sig,
            generic_container: None,
            pointer,
        }
    }

    fn void_sig(interner: &TypeInterner) -> MethodSig {
        MethodSig {
            return_type: interner.primitive(TypeKind::Void).unwrap(),
            params: Vec::new(),
        }
    }

    #[test]
    fn test_override_keeps_ancestor_slot() {
        let interner = TypeInterner::new();
        let sig = void_sig(&interner);

        let base_methods = [
            method("Speak", sig.clone(), MethodFlags::VIRTUAL | MethodFlags::NEW_SLOT, Some(0x10)),
            method("Move", sig.clone(), MethodFlags::VIRTUAL | MethodFlags::NEW_SLOT, Some(0x20)),
        ];
        let base_vtable = build(ClassId(0), &base_methods, None);
        assert_eq!(base_vtable.len(), 2);

        // Derived overrides Move: slot index 1 is reused.
        let derived_methods = [method("Move", sig, MethodFlags::VIRTUAL, Some(0x30))];
        let derived = build(ClassId(1), &derived_methods, Some(&base_vtable));
        assert_eq!(derived.len(), 2);
        assert_eq!(derived.slots[1].method, MethodHandle { class: ClassId(1), index: 0 });
        assert_eq!(derived.slots[1].pointer, Some(0x30));
        // The untouched slot still belongs to the base.
        assert_eq!(derived.slots[0].method.class, ClassId(0));
    }

    #[test]
    fn test_different_signature_gets_new_slot() {
        let interner = TypeInterner::new();
        let void = void_sig(&interner);
        let int_sig = MethodSig {
            return_type: interner.primitive(TypeKind::I4).unwrap(),
            params: Vec::new(),
        };

        let base_methods =
            [method("Get", void, MethodFlags::VIRTUAL | MethodFlags::NEW_SLOT, Some(0x10))];
        let base_vtable = build(ClassId(0), &base_methods, None);

        // Same name, different return type: exact matching appends a slot.
        let derived_methods = [method("Get", int_sig, MethodFlags::VIRTUAL, Some(0x20))];
        let derived = build(ClassId(1), &derived_methods, Some(&base_vtable));
        assert_eq!(derived.len(), 2);
        assert_eq!(derived.slots[0].method.class, ClassId(0));
        assert_eq!(derived.slots[1].method.class, ClassId(1));
    }

    #[test]
    fn test_non_virtual_methods_take_no_slot() {
        let interner = TypeInterner::new();
        let sig = void_sig(&interner);
        let methods = [
            method("Helper", sig.clone(), MethodFlags::empty(), Some(0x10)),
            method("Run", sig, MethodFlags::VIRTUAL | MethodFlags::NEW_SLOT, Some(0x20)),
        ];
        let vtable = build(ClassId(0), &methods, None);
        assert_eq!(vtable.len(), 1);
        assert_eq!(vtable.slots[0].name, "Run");
    }

    #[test]
    fn test_interface_run_is_contiguous_and_appended() {
        let interner = TypeInterner::new();
        let sig = void_sig(&interner);
        let iface = interner.defined(7, false);

        let methods = [
            method("Dispose", sig.clone(), MethodFlags::VIRTUAL | MethodFlags::NEW_SLOT, Some(0x10)),
            method("Reset", sig.clone(), MethodFlags::VIRTUAL | MethodFlags::NEW_SLOT, Some(0x20)),
        ];
        let mut vtable = build(ClassId(0), &methods, None);

        let sig_for_iface = sig.clone();
        let entries = interface_offsets(
            "Widget",
            &[Arc::clone(&iface)],
            &[],
            &mut vtable,
            &mut |_| {
                Ok(vec![
                    ("Reset".to_string(), sig_for_iface.clone()),
                    ("Dispose".to_string(), sig_for_iface.clone()),
                ])
            },
        )
        .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].offset, 2);
        assert_eq!(vtable.len(), 4);
        // The run mirrors the implementing slots, in interface order.
        assert_eq!(vtable.slots[2].name, "Reset");
        assert_eq!(vtable.slots[3].name, "Dispose");
    }

    #[test]
    fn test_override_updates_inherited_interface_run() {
        let interner = TypeInterner::new();
        let sig = void_sig(&interner);
        let iface = interner.defined(7, false);

        let base_methods = [method(
            "Dispose",
            sig.clone(),
            MethodFlags::VIRTUAL | MethodFlags::NEW_SLOT,
            Some(0x100),
        )];
        let mut base_vtable = build(ClassId(0), &base_methods, None);
        let run_sig = sig.clone();
        interface_offsets(
            "Base",
            &[Arc::clone(&iface)],
            &[],
            &mut base_vtable,
            &mut |_| Ok(vec![("Dispose".to_string(), run_sig.clone())]),
        )
        .unwrap();
        // Primary slot 0 plus the interface-run duplicate at 1.
        assert_eq!(base_vtable.len(), 2);

        let derived_methods = [method("Dispose", sig, MethodFlags::VIRTUAL, Some(0x200))];
        let derived = build(ClassId(1), &derived_methods, Some(&base_vtable));
        assert_eq!(derived.len(), 2);
        for slot in &derived.slots {
            assert_eq!(slot.method.class, ClassId(1));
            assert_eq!(slot.pointer, Some(0x200));
        }
    }

    #[test]
    fn test_inherited_interface_not_relaid() {
        let interner = TypeInterner::new();
        let sig = void_sig(&interner);
        let iface = interner.defined(7, false);

        let methods =
            [method("Dispose", sig.clone(), MethodFlags::VIRTUAL | MethodFlags::NEW_SLOT, Some(0x10))];
        let mut vtable = build(ClassId(1), &methods, None);

        let inherited = [InterfaceOffsetEntry {
            interface: Arc::clone(&iface),
            offset: 0,
        }];
        let entries = interface_offsets(
            "Derived",
            &[Arc::clone(&iface)],
            &inherited,
            &mut vtable,
            &mut |_| panic!("inherited interface must not be resolved again"),
        )
        .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].offset, 0);
        assert_eq!(vtable.len(), 1);
    }

    #[test]
    fn test_missing_implementation_is_an_error() {
        let interner = TypeInterner::new();
        let sig = void_sig(&interner);
        let iface = interner.defined(7, false);

        let mut vtable = VTable::default();
        let result = interface_offsets("Empty", &[iface], &[], &mut vtable, &mut |_| {
            Ok(vec![("Dispose".to_string(), sig.clone())])
        });
        assert!(matches!(result, Err(crate::Error::TypeError(_))));
    }
}
