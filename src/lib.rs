// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]

//! # aotcore
//!
//! The type and dispatch core of an ahead-of-time compiled managed runtime.
//! `aotcore` loads a packed metadata blob, canonicalizes type descriptors in a
//! process-wide intern table, builds dispatch-ready runtime classes (field
//! layout, vtable, interface offsets), instantiates generic types with
//! single-flight caching and full code sharing, resolves runtime generic
//! context slots, and decodes the usage tokens generated code references
//! runtime structures through.
//!
//! ## Features
//!
//! - **Memory-mapped metadata** - The blob is validated once and read in place
//! - **Pointer-identity types** - Structurally equal type shapes intern to the
//!   same descriptor, so equality is pointer comparison
//! - **At-most-once building** - Classes, generic instantiations and static
//!   initializers each run exactly once under concurrent first use
//! - **Explicit state root** - All mutable engine state hangs off one
//!   [`RuntimeContext`]; there are no hidden globals
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use aotcore::prelude::*;
//!
//! let image = Arc::new(MetadataImage::from_file("global-metadata.dat".as_ref())?);
//! let ctx = RuntimeContext::new(image, CodeRegistration::empty(), Arc::new(SystemAllocator));
//!
//! // Build every non-generic class in the image.
//! ctx.load_all_classes()?;
//!
//! // Decode a usage token the way generated code would.
//! let token = UsageToken::encode(UsageKind::TypeInfo, 0)?;
//! match ctx.decode_usage(token)? {
//!     UsageResult::TypeInfo(class) => println!("{}", class.full_name()),
//!     _ => unreachable!(),
//! }
//! # Ok::<(), aotcore::Error>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     RuntimeContext                       │
//! ├────────────┬───────────────┬──────────────┬──────────────┤
//! │ metadata   │ typesystem    │ runtime      │ generics     │
//! │ blob, rows │ intern table  │ class arena, │ inst cache,  │
//! │ tokens     │ descriptors   │ layout,      │ sharing,     │
//! │            │               │ vtable, init │ rgctx        │
//! └────────────┴───────────────┴──────────────┴──────────────┘
//! ```

#[macro_use]
mod error;
#[macro_use]
mod macros;

pub mod codegen;
pub mod generics;
pub mod metadata;
pub mod prelude;
pub mod runtime;
pub mod typesystem;

pub use codegen::{CodeRegistration, StaticCtor};
pub use error::Error;
pub use metadata::reader::MetadataImage;
pub use runtime::{RuntimeContext, SystemAllocator};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
