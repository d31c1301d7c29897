//! The process-wide type intern table.
//!
//! [`TypeInterner`] canonicalizes every type shape to a single [`TypeRc`]: two
//! requests for structurally equal shapes return the same `Arc`, so equality
//! reduces to pointer comparison everywhere downstream. The table is insert-only
//! and fully concurrent; descriptors are never removed for the life of the
//! process.
//!
//! Lookup is keyed by the structural [`shape hash`](crate::typesystem::TypeDesc::shape_hash)
//! with collisions resolved by a full structural compare. Candidates are never
//! compared by pointer before interning.
//!
//! # Examples
//!
//! ```rust
//! use aotcore::typesystem::{TypeInterner, TypeKind};
//!
//! let interner = TypeInterner::new();
//! let a = interner.primitive(TypeKind::I4)?;
//! let b = interner.primitive(TypeKind::I4)?;
//! assert!(std::sync::Arc::ptr_eq(&a, &b));
//! # Ok::<(), aotcore::Error>(())
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::{
    metadata::{
        reader::MetadataImage,
        tables::{GenericParamRow, TypeDefRow, TypeRow, TYPE_BIT_BYREF, TYPE_BIT_PINNED},
    },
    typesystem::descriptor::{TypeDesc, TypeKind, TypePayload, TypeRc},
    Result,
};

/// Maximum nesting depth of a type graph the resolver will follow.
///
/// Valid metadata produces shallow graphs; hitting this limit means the encoded
/// descriptors form a cycle or absurd nesting.
pub const TYPE_GRAPH_DEPTH_LIMIT: usize = 128;

/// Insert-only intern table mapping type shapes to canonical descriptors.
///
/// Concurrent interning of the same shape from multiple threads is safe and
/// returns the same pointer to every caller; the bucket entry guard makes the
/// compare-and-insert step atomic per hash bucket.
pub struct TypeInterner {
    /// Hash buckets of interned descriptors; collisions share a bucket
    buckets: DashMap<u64, Vec<TypeRc>>,
    /// Number of distinct interned shapes
    count: AtomicUsize,
}

impl TypeInterner {
    /// Create an empty intern table.
    #[must_use]
    pub fn new() -> Self {
        TypeInterner {
            buckets: DashMap::new(),
            count: AtomicUsize::new(0),
        }
    }

    /// Number of distinct shapes interned so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Canonicalize a shape, returning the process-wide descriptor for it.
    ///
    /// If an equal shape was interned before, its existing `Arc` is returned and
    /// `desc` is dropped.
    pub fn intern(&self, desc: TypeDesc) -> TypeRc {
        let hash = desc.shape_hash();

        // The entry guard holds the bucket exclusively, so the find-or-insert
        // below is atomic with respect to other interns of the same hash.
        let mut bucket = self.buckets.entry(hash).or_default();
        if let Some(existing) = bucket.iter().find(|candidate| ***candidate == desc) {
            return Arc::clone(existing);
        }

        let interned: TypeRc = Arc::new(desc);
        bucket.push(Arc::clone(&interned));
        self.count.fetch_add(1, Ordering::Relaxed);
        interned
    }

    /// Singleton descriptor for a payload-free kind (primitives, `string`,
    /// `object`, typed references).
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeError`] if `kind` requires a payload.
    pub fn primitive(&self, kind: TypeKind) -> Result<TypeRc> {
        match kind {
            TypeKind::Ptr
            | TypeKind::SzArray
            | TypeKind::Array
            | TypeKind::Class
            | TypeKind::ValueType
            | TypeKind::Var
            | TypeKind::MVar
            | TypeKind::GenericInst => Err(crate::Error::TypeError(format!(
                "{kind:?} is not a payload-free kind"
            ))),
            _ => Ok(self.intern(TypeDesc {
                kind,
                attrs: 0,
                byref: false,
                pinned: false,
                payload: TypePayload::None,
            })),
        }
    }

    /// Canonical descriptor for a single-dimensional array of `element`.
    pub fn szarray(&self, element: TypeRc) -> TypeRc {
        self.intern(TypeDesc {
            kind: TypeKind::SzArray,
            attrs: 0,
            byref: false,
            pinned: false,
            payload: TypePayload::Element(element),
        })
    }

    /// Canonical descriptor for an unmanaged pointer to `element`.
    pub fn pointer(&self, element: TypeRc) -> TypeRc {
        self.intern(TypeDesc {
            kind: TypeKind::Ptr,
            attrs: 0,
            byref: false,
            pinned: false,
            payload: TypePayload::Element(element),
        })
    }

    /// Canonical descriptor for a defined type.
    pub fn defined(&self, type_def_row: u32, value_type: bool) -> TypeRc {
        self.intern(TypeDesc {
            kind: if value_type {
                TypeKind::ValueType
            } else {
                TypeKind::Class
            },
            attrs: 0,
            byref: false,
            pinned: false,
            payload: TypePayload::TypeDef(type_def_row),
        })
    }

    /// Canonical descriptor for a generic instantiation.
    ///
    /// The arguments must already be interned; the instantiation itself is then
    /// canonical by construction.
    pub fn generic_inst(&self, definition: u32, args: Vec<TypeRc>) -> TypeRc {
        self.intern(TypeDesc {
            kind: TypeKind::GenericInst,
            attrs: 0,
            byref: false,
            pinned: false,
            payload: TypePayload::GenericInst {
                definition,
                args: Arc::from(args),
            },
        })
    }

    /// Resolve an encoded descriptor from the type table into a canonical [`TypeRc`].
    ///
    /// Composite descriptors are resolved recursively; element references index the
    /// same table.
    ///
    /// # Errors
    /// - [`crate::Error::OutOfBounds`] if `type_index` is past the type table
    /// - [`crate::Error::Malformed`] on an unrecognized kind tag or invalid payload
    /// - [`crate::Error::TypeNotFound`] if a referenced type definition is missing
    /// - [`crate::Error::RecursionLimit`] if the descriptor graph nests past
    ///   [`TYPE_GRAPH_DEPTH_LIMIT`]
    pub fn resolve(&self, image: &MetadataImage, type_index: u32) -> Result<TypeRc> {
        self.resolve_depth(image, type_index, 0)
    }

    fn resolve_depth(&self, image: &MetadataImage, type_index: u32, depth: usize) -> Result<TypeRc> {
        if depth >= TYPE_GRAPH_DEPTH_LIMIT {
            return Err(crate::Error::RecursionLimit(TYPE_GRAPH_DEPTH_LIMIT));
        }

        let row: TypeRow = image.row(type_index)?;
        let kind = TypeKind::from_tag(row.kind)?;
        let byref = row.bits & TYPE_BIT_BYREF != 0;
        let pinned = row.bits & TYPE_BIT_PINNED != 0;

        let payload = match kind {
            TypeKind::Class | TypeKind::ValueType => {
                let def_row = u32::try_from(row.data)
                    .map_err(|_| crate::Error::TypeNotFound(row.data as u32))?;
                if def_row >= image.row_count::<TypeDefRow>() {
                    return Err(crate::Error::TypeNotFound(def_row));
                }
                TypePayload::TypeDef(def_row)
            }
            TypeKind::Ptr | TypeKind::SzArray => {
                let element_index = u32::try_from(row.data).map_err(|_| {
                    malformed_error!("Negative element type index - {}", row.data)
                })?;
                TypePayload::Element(self.resolve_depth(image, element_index, depth + 1)?)
            }
            TypeKind::Array => {
                if row.rank == 0 {
                    return Err(malformed_error!(
                        "Multi-dimensional array descriptor {} has rank 0",
                        type_index
                    ));
                }
                let element_index = u32::try_from(row.data).map_err(|_| {
                    malformed_error!("Negative element type index - {}", row.data)
                })?;
                TypePayload::Array {
                    element: self.resolve_depth(image, element_index, depth + 1)?,
                    rank: row.rank,
                }
            }
            TypeKind::Var | TypeKind::MVar => {
                let param_index = u32::try_from(row.data).map_err(|_| {
                    malformed_error!("Negative generic parameter index - {}", row.data)
                })?;
                let param: GenericParamRow = image.row(param_index)?;
                let owner = u32::try_from(param.owner).map_err(|_| {
                    malformed_error!("Generic parameter {} has no owner", param_index)
                })?;
                TypePayload::GenericParam {
                    owner,
                    num: param.num,
                }
            }
            TypeKind::GenericInst => {
                // Instantiations are built dynamically through the cache; the
                // static type table never encodes one.
                return Err(malformed_error!(
                    "Type table entry {} encodes a generic instantiation",
                    type_index
                ));
            }
            _ => TypePayload::None,
        };

        Ok(self.intern(TypeDesc {
            kind,
            attrs: row.attrs,
            byref,
            pinned,
            payload,
        }))
    }
}

impl Default for TypeInterner {
    fn default() -> Self {
        TypeInterner::new()
    }
}
