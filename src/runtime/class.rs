//! Runtime class objects and their member tables.
//!
//! A [`RuntimeClass`] is the dispatch-ready representation of one concrete type:
//! its member tables, ancestry, layout, vtable and initialization state. Classes
//! live in the context's arena for the life of the process and are addressed by a
//! stable [`ClassId`] handle, so ancestry and interface graphs are index lists
//! rather than owning pointer cycles.
//!
//! The immutable identity of a class (name, members, ancestry) is fixed when the
//! arena entry is created; the derived parts (layout, vtable, interface offsets,
//! static storage) are filled in exactly once behind `OnceLock` cells by the
//! builder, so no thread can observe a partially built class through the arena.

use std::sync::{Arc, OnceLock};

use crate::{
    metadata::tables::MethodFlags,
    runtime::{
        init::ClassInit,
        layout::ClassLayout,
        statics::StaticStorage,
        vtable::{InterfaceOffsetEntry, VTable},
    },
    typesystem::TypeRc,
};

/// Stable arena handle of a [`RuntimeClass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(pub u32);

/// Identifies one method as (owning class, index into that class's method table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodHandle {
    /// Owning class
    pub class: ClassId,
    /// Index into [`RuntimeClass::methods`]
    pub index: u32,
}

/// Identifies one field as (owning class, index into that class's field table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldHandle {
    /// Owning class
    pub class: ClassId,
    /// Index into [`RuntimeClass::fields`]
    pub index: u32,
}

/// A method signature over interned descriptors.
///
/// Equality is exact: parameter and return descriptors compare by pointer, which
/// is structural equality for interned types. Override matching uses this
/// directly, so covariant returns never match.
#[derive(Debug, Clone)]
pub struct MethodSig {
    /// Interned return type
    pub return_type: TypeRc,
    /// Interned parameter types, in order
    pub params: Vec<TypeRc>,
}

impl PartialEq for MethodSig {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.return_type, &other.return_type)
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(other.params.iter())
                .all(|(a, b)| Arc::ptr_eq(a, b))
    }
}

impl Eq for MethodSig {}

/// One entry in a class's method table.
#[derive(Debug, Clone)]
pub struct MethodInfo {
    /// Method name
    pub name: String,
    /// Metadata token
    pub token: u32,
    /// Attribute flags
    pub flags: MethodFlags,
    /// Full signature
    pub signature: MethodSig,
    /// Generic container row for generic methods
    pub generic_container: Option<u32>,
    /// Generated-code entry point, resolved from the code registration;
    /// `None` for abstract methods and methods without a compiled body
    pub pointer: Option<usize>,
}

impl MethodInfo {
    /// The method participates in virtual dispatch.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.flags.contains(MethodFlags::VIRTUAL)
    }

    /// The method introduces a new slot rather than overriding an ancestor's.
    #[must_use]
    pub fn is_new_slot(&self) -> bool {
        self.flags.contains(MethodFlags::NEW_SLOT)
    }
}

/// One entry in a class's field table.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    /// Field name
    pub name: String,
    /// Metadata token
    pub token: u32,
    /// Interned field type
    pub field_type: TypeRc,
    /// The field is static (stored in the class's static block)
    pub is_static: bool,
}

/// One entry in a class's property table.
#[derive(Debug, Clone)]
pub struct PropertyInfo {
    /// Property name
    pub name: String,
    /// Metadata token
    pub token: u32,
    /// Getter, if present
    pub get: Option<MethodHandle>,
    /// Setter, if present
    pub set: Option<MethodHandle>,
}

/// One entry in a class's event table.
#[derive(Debug, Clone)]
pub struct EventInfo {
    /// Event name
    pub name: String,
    /// Metadata token
    pub token: u32,
    /// Interned handler type
    pub event_type: TypeRc,
    /// `add` accessor, if present
    pub add: Option<MethodHandle>,
    /// `remove` accessor, if present
    pub remove: Option<MethodHandle>,
    /// `raise` accessor, if present
    pub raise: Option<MethodHandle>,
}

/// Dispatch-ready runtime representation of one concrete (possibly instantiated)
/// type.
pub struct RuntimeClass {
    /// Arena handle of this class
    pub id: ClassId,
    /// Type-definition row this class was built from
    pub def_row: u32,
    /// Metadata token
    pub token: u32,
    /// Simple name
    pub name: String,
    /// Namespace, empty for the global namespace
    pub namespace: String,
    /// Canonical by-value descriptor
    pub byval: TypeRc,
    /// Parent class; only the `object` root (and interfaces) have none
    pub parent: Option<ClassId>,
    /// Element class descriptor for arrays and enums
    pub element: Option<TypeRc>,
    /// Generic definition this class was instantiated from, if any
    pub generic_definition: Option<ClassId>,
    /// Interned type arguments, present only for instantiations
    pub type_args: Option<Arc<[TypeRc]>>,
    /// The instantiation is a shared body serving all reference-like argument
    /// combinations
    pub is_shared: bool,
    /// The class is a value type
    pub is_value_type: bool,
    /// The class is an interface
    pub is_interface: bool,
    /// The class is abstract
    pub is_abstract: bool,
    /// The class declares a static constructor
    pub has_cctor: bool,
    /// Explicit packing size in bytes, 0 for natural packing
    pub packing: u8,
    /// Owned field table, fixed at build time
    pub fields: Vec<FieldInfo>,
    /// Owned method table, fixed at build time
    pub methods: Vec<MethodInfo>,
    /// Owned property table, fixed at build time
    pub properties: Vec<PropertyInfo>,
    /// Owned event table, fixed at build time
    pub events: Vec<EventInfo>,
    /// Directly implemented interfaces, as interned descriptors
    pub interfaces: Vec<TypeRc>,

    /// Instance and static layout, filled once by the builder
    pub(crate) layout: OnceLock<ClassLayout>,
    /// Virtual dispatch table, filled once by the builder
    pub(crate) vtable: OnceLock<VTable>,
    /// Interface offset table, filled once by the builder
    pub(crate) interface_offsets: OnceLock<Vec<InterfaceOffsetEntry>>,
    /// Ancestor chain, root first and ending with this class; filled once by
    /// the builder
    pub(crate) hierarchy: OnceLock<Arc<[ClassId]>>,
    /// Static field block, allocated at the first initialization transition
    pub(crate) statics: OnceLock<StaticStorage>,
    /// Initialization state machine
    pub(crate) init: ClassInit,
}

impl RuntimeClass {
    /// Full name in `Namespace.Name` form.
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// The computed layout.
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeError`] if the builder has not finished this
    /// class; arena consumers that obtained the class through the context never
    /// see that state.
    pub fn layout(&self) -> crate::Result<&ClassLayout> {
        self.layout
            .get()
            .ok_or_else(|| crate::Error::TypeError(format!("{} has no layout yet", self.full_name())))
    }

    /// The built vtable.
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeError`] if the builder has not finished this
    /// class.
    pub fn vtable(&self) -> crate::Result<&VTable> {
        self.vtable
            .get()
            .ok_or_else(|| crate::Error::TypeError(format!("{} has no vtable yet", self.full_name())))
    }

    /// The interface offset table.
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeError`] if the builder has not finished this
    /// class.
    pub fn interface_offsets(&self) -> crate::Result<&[InterfaceOffsetEntry]> {
        self.interface_offsets
            .get()
            .map(Vec::as_slice)
            .ok_or_else(|| {
                crate::Error::TypeError(format!("{} has no interface offsets yet", self.full_name()))
            })
    }

    /// Ancestor chain, root first and ending with this class.
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeError`] if the builder has not finished this
    /// class.
    pub fn hierarchy(&self) -> crate::Result<&[ClassId]> {
        self.hierarchy.get().map(|chain| &chain[..]).ok_or_else(|| {
            crate::Error::TypeError(format!("{} has no hierarchy yet", self.full_name()))
        })
    }

    /// Depth in the class hierarchy; a root class has depth 1.
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeError`] if the builder has not finished this
    /// class.
    pub fn depth(&self) -> crate::Result<u32> {
        Ok(self.hierarchy()?.len() as u32)
    }

    /// Whether `ancestor` is this class or appears in its ancestor chain.
    ///
    /// Constant time: the chain is root-first, so the candidate can only sit at
    /// the index given by its own depth.
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeError`] if either class is unfinished.
    pub fn is_subclass_of(&self, ancestor: &RuntimeClass) -> crate::Result<bool> {
        let chain = self.hierarchy()?;
        let depth = ancestor.hierarchy()?.len();
        Ok(chain.get(depth - 1).is_some_and(|&id| id == ancestor.id))
    }

    /// The static field block, present once the class reached its first
    /// initialization transition.
    #[must_use]
    pub fn statics(&self) -> Option<&StaticStorage> {
        self.statics.get()
    }

    /// Whether the class has completed its initialization transition.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.init.is_initialized()
    }

    /// Find a method table index by exact name and signature.
    #[must_use]
    pub fn find_method(&self, name: &str, signature: &MethodSig) -> Option<u32> {
        self.methods
            .iter()
            .position(|m| m.name == name && &m.signature == signature)
            .map(|index| index as u32)
    }
}
