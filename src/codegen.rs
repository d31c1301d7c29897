//! Generated-code registration tables.
//!
//! Ahead-of-time compiled code hands the runtime its entry points at startup:
//! a method pointer table, an invoker table with a per-method invoker index, and
//! adjustor thunks for value-type methods whose calling convention needs the
//! `this` pointer shifted past the box header. The engine treats all of them as
//! opaque addresses indexed by position; it never calls through them itself.
//!
//! Static constructors are registered here too, keyed by class token. Hosts
//! register a closure per class with a `.cctor`; the initialization machinery
//! runs it at the class's first use.

use std::sync::Arc;

use dashmap::DashMap;

use crate::runtime::{statics::StaticStorage, vtable::MethodPointer};

/// Host-registered static constructor body.
///
/// Receives the class's freshly allocated static block. A returned error message
/// becomes the class's recorded, absorbing initialization failure.
pub type StaticCtor =
    Arc<dyn Fn(&StaticStorage) -> std::result::Result<(), String> + Send + Sync>;

/// Registration handed over by generated code at startup.
///
/// The positional tables are fixed at construction; adjustor thunks and static
/// constructors can be registered afterwards from any thread.
#[derive(Default)]
pub struct CodeRegistration {
    /// Method entry points, indexed by method row; 0 means no compiled body
    method_pointers: Vec<MethodPointer>,
    /// Signature-specific invoker functions
    invokers: Vec<MethodPointer>,
    /// Per-method index into the invoker table, parallel to `method_pointers`
    invoker_indices: Vec<u32>,
    /// Value-type calling-convention thunks, keyed by method token
    adjustor_thunks: DashMap<u32, MethodPointer>,
    /// Static constructors, keyed by class token
    cctors: DashMap<u32, StaticCtor>,
}

impl CodeRegistration {
    /// Registration with no compiled code, used by hosts that only exercise the
    /// metadata and type system layers.
    #[must_use]
    pub fn empty() -> Self {
        CodeRegistration::default()
    }

    /// Build a registration from the positional tables generated code exports.
    #[must_use]
    pub fn new(
        method_pointers: Vec<MethodPointer>,
        invokers: Vec<MethodPointer>,
        invoker_indices: Vec<u32>,
    ) -> Self {
        CodeRegistration {
            method_pointers,
            invokers,
            invoker_indices,
            adjustor_thunks: DashMap::new(),
            cctors: DashMap::new(),
        }
    }

    /// Entry point of the method at `row`, if it has a compiled body.
    #[must_use]
    pub fn method_pointer(&self, row: u32) -> Option<MethodPointer> {
        match self.method_pointers.get(row as usize) {
            Some(&pointer) if pointer != 0 => Some(pointer),
            _ => None,
        }
    }

    /// Invoker function for the method at `row`, if one is registered.
    #[must_use]
    pub fn invoker(&self, row: u32) -> Option<MethodPointer> {
        let index = *self.invoker_indices.get(row as usize)?;
        self.invokers.get(index as usize).copied()
    }

    /// Register an adjustor thunk for a value-type method token.
    pub fn register_adjustor_thunk(&self, token: u32, pointer: MethodPointer) {
        self.adjustor_thunks.insert(token, pointer);
    }

    /// Adjustor thunk for a method token, if one was registered.
    #[must_use]
    pub fn adjustor_thunk(&self, token: u32) -> Option<MethodPointer> {
        self.adjustor_thunks.get(&token).map(|entry| *entry)
    }

    /// Register the static constructor body for a class token.
    pub fn register_cctor(&self, class_token: u32, ctor: StaticCtor) {
        self.cctors.insert(class_token, ctor);
    }

    /// Static constructor for a class token, if one was registered.
    #[must_use]
    pub fn cctor(&self, class_token: u32) -> Option<StaticCtor> {
        self.cctors.get(&class_token).map(|entry| Arc::clone(&entry))
    }
}
