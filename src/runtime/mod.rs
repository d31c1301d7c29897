//! Runtime class construction, layout, dispatch and initialization.
//!
//! The [`RuntimeContext`] is the root owner of all engine state; everything else
//! here is reached through it. Classes are arena-allocated, built single-flight
//! per type-definition row, and move monotonically through size computation,
//! vtable construction and (on first use) static initialization.
//!
//! # Key Components
//!
//! - [`RuntimeContext`] - Process-wide state object and class builder
//! - [`RuntimeClass`] / [`ClassId`] - Arena-held class objects with stable handles
//! - [`layout`] - Field offset and size computation
//! - [`vtable`] - Slot assignment and interface offset runs
//! - [`init::ClassInit`] - At-most-once static initialization
//! - [`alloc::RuntimeAllocator`] - Injected allocation seam

pub mod alloc;
pub mod class;
pub mod context;
pub mod init;
pub mod layout;
pub mod statics;
pub mod vtable;

pub use alloc::{RuntimeAllocator, SystemAllocator};
pub use class::{
    ClassId, EventInfo, FieldHandle, FieldInfo, MethodHandle, MethodInfo, MethodSig, PropertyInfo,
    RuntimeClass,
};
pub use context::RuntimeContext;
pub use layout::{ClassLayout, FieldOffset};
pub use statics::StaticStorage;
pub use vtable::{InterfaceOffsetEntry, MethodPointer, VTable, VTableSlot};
