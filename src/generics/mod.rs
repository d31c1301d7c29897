//! Generic instantiation, code sharing and runtime generic contexts.
//!
//! # Key Components
//!
//! - [`cache::GenericCache`] - Canonicalizing, single-flight instantiation cache
//! - [`inst`] - Generic argument substitution over interned descriptors
//! - [`sharing`] - The deterministic full-sharing routing policy
//! - [`rgctx`] - Per-instantiation context slot tables with memoized resolution

pub mod cache;
pub mod inst;
pub mod rgctx;
pub mod sharing;

pub use cache::{GenericCache, GenericKey, InstantiatedMethod, MethodKey};
pub use rgctx::{RgctxKind, RgctxSlotDef, RgctxTable, RgctxValue};
