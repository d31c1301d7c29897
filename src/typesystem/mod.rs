//! Canonical type descriptors and the process-wide intern table.
//!
//! Everything downstream of metadata parsing speaks in [`TypeRc`] handles produced
//! by the [`TypeInterner`]: structurally equal shapes are guaranteed to share one
//! `Arc`, so type equality is pointer equality. The module also carries the
//! primitive size tables the layout builder is built on.
//!
//! # Key Components
//!
//! - [`TypeDesc`] / [`TypeKind`] / [`TypePayload`] - The shape representation
//! - [`TypeInterner`] - Canonicalization with structural-hash lookup
//! - [`hash::TypeShapeHash`] - FNV-1a style structural hash builder
//! - [`primitives`] - Primitive sizes, word size, object header size

pub mod descriptor;
pub mod hash;
pub mod interner;
pub mod primitives;

pub use descriptor::{TypeDesc, TypeKind, TypePayload, TypeRc};
pub use interner::{TypeInterner, TYPE_GRAPH_DEPTH_LIMIT};
pub use primitives::{is_pointer_sized, primitive_size_align, OBJECT_HEADER_SIZE, WORD_SIZE};
