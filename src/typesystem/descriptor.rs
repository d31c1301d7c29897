//! Canonical type descriptors.
//!
//! A [`TypeDesc`] is the runtime's view of one type shape: a kind tag, attribute
//! flags, the by-ref/pinned/value-type bits, and a kind-dependent payload. All
//! descriptors are produced by the [`crate::typesystem::TypeInterner`]; after
//! interning, structural equality and pointer equality coincide, so generated code
//! can compare types by address.
//!
//! Composite descriptors (arrays, pointers, generic instantiations) hold their
//! children as already-interned [`TypeRc`] handles. This is what allows both
//! [`PartialEq`] and the structural hash to treat children by pointer identity.

use std::fmt;
use std::sync::Arc;

use crate::typesystem::hash::TypeShapeHash;

/// Reference-counted handle to an interned type descriptor.
pub type TypeRc = Arc<TypeDesc>;

/// Kind tag of a type descriptor.
///
/// The discriminants are the on-disk encoding used by [`crate::metadata::tables::TypeRow::kind`]
/// and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeKind {
    /// `void`
    Void = 1,
    /// `bool`
    Boolean = 2,
    /// UTF-16 code unit
    Char = 3,
    /// Signed 8-bit integer
    I1 = 4,
    /// Unsigned 8-bit integer
    U1 = 5,
    /// Signed 16-bit integer
    I2 = 6,
    /// Unsigned 16-bit integer
    U2 = 7,
    /// Signed 32-bit integer
    I4 = 8,
    /// Unsigned 32-bit integer
    U4 = 9,
    /// Signed 64-bit integer
    I8 = 10,
    /// Unsigned 64-bit integer
    U8 = 11,
    /// 32-bit float
    R4 = 12,
    /// 64-bit float
    R8 = 13,
    /// Immutable string reference
    String = 14,
    /// Unmanaged pointer to an element type
    Ptr = 15,
    /// Value type defined in the type-definition table
    ValueType = 17,
    /// Reference type defined in the type-definition table
    Class = 18,
    /// Generic type parameter (`T` on a type)
    Var = 19,
    /// Multi-dimensional array with explicit rank
    Array = 20,
    /// Instantiated generic type
    GenericInst = 21,
    /// Typed reference
    TypedByRef = 22,
    /// Native-width signed integer
    I = 24,
    /// Native-width unsigned integer
    U = 25,
    /// Function pointer
    FnPtr = 27,
    /// The `object` root reference type
    Object = 28,
    /// Single-dimensional, zero-based array
    SzArray = 29,
    /// Generic method parameter (`T` on a method)
    MVar = 30,
}

impl TypeKind {
    /// Decode a kind tag byte.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] on an unrecognized tag; an unknown kind
    /// means the metadata blob is corrupt, not that the engine should guess.
    pub fn from_tag(tag: u8) -> crate::Result<Self> {
        Ok(match tag {
            1 => TypeKind::Void,
            2 => TypeKind::Boolean,
            3 => TypeKind::Char,
            4 => TypeKind::I1,
            5 => TypeKind::U1,
            6 => TypeKind::I2,
            7 => TypeKind::U2,
            8 => TypeKind::I4,
            9 => TypeKind::U4,
            10 => TypeKind::I8,
            11 => TypeKind::U8,
            12 => TypeKind::R4,
            13 => TypeKind::R8,
            14 => TypeKind::String,
            15 => TypeKind::Ptr,
            17 => TypeKind::ValueType,
            18 => TypeKind::Class,
            19 => TypeKind::Var,
            20 => TypeKind::Array,
            21 => TypeKind::GenericInst,
            22 => TypeKind::TypedByRef,
            24 => TypeKind::I,
            25 => TypeKind::U,
            27 => TypeKind::FnPtr,
            28 => TypeKind::Object,
            29 => TypeKind::SzArray,
            30 => TypeKind::MVar,
            _ => return Err(malformed_error!("Unrecognized type kind tag - {}", tag)),
        })
    }
}

/// Kind-dependent payload of a [`TypeDesc`].
#[derive(Debug, Clone)]
pub enum TypePayload {
    /// No payload (primitives, `string`, `object`, typed references)
    None,
    /// Type-definition row for [`TypeKind::Class`] and [`TypeKind::ValueType`]
    TypeDef(u32),
    /// Interned element type for [`TypeKind::Ptr`] and [`TypeKind::SzArray`]
    Element(TypeRc),
    /// Interned element type plus rank for [`TypeKind::Array`]
    Array {
        /// Element type
        element: TypeRc,
        /// Number of dimensions, at least 1
        rank: u8,
    },
    /// Generic parameter position for [`TypeKind::Var`] and [`TypeKind::MVar`]
    GenericParam {
        /// Generic container row of the owner
        owner: u32,
        /// Zero-based parameter position
        num: u16,
    },
    /// Instantiated generic type for [`TypeKind::GenericInst`]
    GenericInst {
        /// Type-definition row of the generic definition
        definition: u32,
        /// Interned, ordered type arguments
        args: Arc<[TypeRc]>,
    },
}

/// One type shape.
///
/// Construct descriptors through the [`crate::typesystem::TypeInterner`] only;
/// a `TypeDesc` created by hand never satisfies the pointer-identity contract.
#[derive(Debug, Clone)]
pub struct TypeDesc {
    /// Kind tag
    pub kind: TypeKind,
    /// Attribute flags from the defining metadata
    pub attrs: u16,
    /// The descriptor is passed by reference
    pub byref: bool,
    /// The descriptor is pinned
    pub pinned: bool,
    /// Kind-dependent payload
    pub payload: TypePayload,
}

impl TypeDesc {
    /// Structural hash of this shape, used for intern-table bucketing.
    ///
    /// Children contribute by pointer identity, which is sound because they are
    /// interned before the parent is constructed.
    #[must_use]
    pub fn shape_hash(&self) -> u64 {
        let mut hash = TypeShapeHash::new()
            .add_component(&(self.kind as u8))
            .add_component(&self.attrs)
            .add_component(&(self.byref, self.pinned));

        match &self.payload {
            TypePayload::None => {}
            TypePayload::TypeDef(row) => hash = hash.add_component(row),
            TypePayload::Element(element) => {
                hash = hash.add_raw(Arc::as_ptr(element) as u64);
            }
            TypePayload::Array { element, rank } => {
                hash = hash.add_raw(Arc::as_ptr(element) as u64).add_component(rank);
            }
            TypePayload::GenericParam { owner, num } => {
                hash = hash.add_component(&(owner, num));
            }
            TypePayload::GenericInst { definition, args } => {
                hash = hash.add_component(definition);
                for arg in args.iter() {
                    hash = hash.add_raw(Arc::as_ptr(arg) as u64);
                }
            }
        }

        hash.finalize()
    }

    /// Whether this shape is represented uniformly as a machine pointer.
    ///
    /// Reference-like shapes are eligible for generic code sharing: one shared
    /// instantiation body can serve every combination of such arguments. Generic
    /// instantiations are classified by the sharing layer, which can consult the
    /// definition's type-definition row; here they report `false`.
    #[must_use]
    pub fn is_reference_like(&self) -> bool {
        !self.byref
            && matches!(
                self.kind,
                TypeKind::String
                    | TypeKind::Class
                    | TypeKind::Object
                    | TypeKind::Array
                    | TypeKind::SzArray
                    | TypeKind::Ptr
            )
    }

    /// Whether this shape denotes a value type.
    #[must_use]
    pub fn is_value_kind(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Void
                | TypeKind::Boolean
                | TypeKind::Char
                | TypeKind::I1
                | TypeKind::U1
                | TypeKind::I2
                | TypeKind::U2
                | TypeKind::I4
                | TypeKind::U4
                | TypeKind::I8
                | TypeKind::U8
                | TypeKind::R4
                | TypeKind::R8
                | TypeKind::I
                | TypeKind::U
                | TypeKind::ValueType
                | TypeKind::TypedByRef
        )
    }
}

impl PartialEq for TypeDesc {
    /// Structural equality over already-interned children.
    ///
    /// Child descriptors compare by pointer, which equals structural comparison
    /// once they are interned.
    fn eq(&self, other: &Self) -> bool {
        if self.kind != other.kind
            || self.attrs != other.attrs
            || self.byref != other.byref
            || self.pinned != other.pinned
        {
            return false;
        }

        match (&self.payload, &other.payload) {
            (TypePayload::None, TypePayload::None) => true,
            (TypePayload::TypeDef(a), TypePayload::TypeDef(b)) => a == b,
            (TypePayload::Element(a), TypePayload::Element(b)) => Arc::ptr_eq(a, b),
            (
                TypePayload::Array {
                    element: a,
                    rank: ra,
                },
                TypePayload::Array {
                    element: b,
                    rank: rb,
                },
            ) => ra == rb && Arc::ptr_eq(a, b),
            (
                TypePayload::GenericParam { owner: oa, num: na },
                TypePayload::GenericParam { owner: ob, num: nb },
            ) => oa == ob && na == nb,
            (
                TypePayload::GenericInst {
                    definition: da,
                    args: aa,
                },
                TypePayload::GenericInst {
                    definition: db,
                    args: ab,
                },
            ) => {
                da == db
                    && aa.len() == ab.len()
                    && aa.iter().zip(ab.iter()).all(|(a, b)| Arc::ptr_eq(a, b))
            }
            _ => false,
        }
    }
}

impl Eq for TypeDesc {}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            TypePayload::None => write!(f, "{:?}", self.kind),
            TypePayload::TypeDef(row) => write!(f, "{:?}#{}", self.kind, row),
            TypePayload::Element(element) => match self.kind {
                TypeKind::Ptr => write!(f, "{element}*"),
                _ => write!(f, "{element}[]"),
            },
            TypePayload::Array { element, rank } => {
                write!(f, "{}[{}]", element, ",".repeat(usize::from(*rank) - 1))
            }
            TypePayload::GenericParam { num, .. } => write!(f, "!{num}"),
            TypePayload::GenericInst { definition, args } => {
                write!(f, "#{definition}<")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ">")
            }
        }
    }
}
