//! Convenient re-exports of the most commonly used types.
//!
//! Import this module to get the essential engine surface in one line:
//!
//! ```rust
//! use aotcore::prelude::*;
//! ```

/// The error type for all engine operations
pub use crate::Error;

/// The result type used throughout the engine
pub use crate::Result;

/// The process-wide state root
pub use crate::runtime::RuntimeContext;

/// Loaded, validated metadata blob
pub use crate::metadata::reader::MetadataImage;

/// Blob construction for tools and tests
pub use crate::metadata::builder::ImageBuilder;

/// Usage token encoding and the decoded result
pub use crate::metadata::token::{UsageKind, UsageToken};
pub use crate::metadata::usage::UsageResult;

/// Canonical type descriptors and the intern table
pub use crate::typesystem::{TypeDesc, TypeInterner, TypeKind, TypePayload, TypeRc};

/// Runtime classes and handles
pub use crate::runtime::{ClassId, FieldHandle, MethodHandle, RuntimeClass};

/// Allocation seam
pub use crate::runtime::{RuntimeAllocator, SystemAllocator};

/// Generated-code registration
pub use crate::codegen::{CodeRegistration, StaticCtor};

/// Generic instantiation and runtime generic contexts
pub use crate::generics::{
    GenericCache, InstantiatedMethod, RgctxKind, RgctxSlotDef, RgctxTable, RgctxValue,
};
