//! Metadata usage decoding.
//!
//! Generated code references runtime structures through encoded
//! [`UsageToken`](crate::metadata::token::UsageToken)s; decoding turns one token
//! into a live value, dispatching on the usage kind to the type interner, the
//! class builder, the method and field tables or the string-literal heap.
//!
//! The two sentinel tokens decode to [`UsageResult::NoData`] and
//! [`UsageResult::AmbiguousMethod`]. These are terminal results, not failures:
//! callers branch on them explicitly, and retrying can never change them.

use std::sync::Arc;

use crate::{
    metadata::token::{UsageKind, UsageToken, USAGE_AMBIGUOUS_METHOD, USAGE_NO_DATA},
    runtime::{
        class::{FieldHandle, MethodHandle, RuntimeClass},
        context::RuntimeContext,
        vtable::MethodPointer,
    },
    typesystem::TypeRc,
    Result,
};

/// Outcome of decoding one usage token.
#[derive(Clone)]
pub enum UsageResult {
    /// The slot carries no data; nothing to patch
    NoData,
    /// The conversion step could not disambiguate the referenced method;
    /// using the slot is an error at the call site, not at decode time
    AmbiguousMethod,
    /// An interned type descriptor
    TypeDesc(TypeRc),
    /// A fully built, dispatch-ready runtime class
    TypeInfo(Arc<RuntimeClass>),
    /// A method definition and its entry point
    MethodDef {
        /// The resolved method
        method: MethodHandle,
        /// Compiled entry point, if any
        pointer: Option<MethodPointer>,
    },
    /// A field information record
    FieldInfo(FieldHandle),
    /// The interned string object for a literal
    StringLiteral(Arc<str>),
    /// A generic method reference; the caller instantiates it against its
    /// runtime generic context
    MethodRef {
        /// The underlying method definition
        method: MethodHandle,
        /// Compiled entry point of the definition body, if any
        pointer: Option<MethodPointer>,
    },
    /// The RVA-backed initial data of a field
    FieldRva(FieldHandle),
}

impl RuntimeContext {
    /// Decode a usage token into a live value.
    ///
    /// Sentinels decode to their fixed results regardless of the bits below the
    /// kind field. Everything else dispatches on the kind and resolves through
    /// this context, building classes on demand where needed.
    ///
    /// # Errors
    /// Propagates metadata corruption (bad kind bits, out-of-range indices) and
    /// class build failures. Sentinels are never errors.
    pub fn decode_usage(&self, token: UsageToken) -> Result<UsageResult> {
        match token.value() {
            USAGE_NO_DATA => return Ok(UsageResult::NoData),
            USAGE_AMBIGUOUS_METHOD => return Ok(UsageResult::AmbiguousMethod),
            _ => {}
        }

        let index = token.index();
        match token.kind()? {
            UsageKind::TypeDesc => {
                let desc = self.interner().resolve(self.image(), index)?;
                Ok(UsageResult::TypeDesc(desc))
            }
            UsageKind::TypeInfo => {
                let desc = self.interner().resolve(self.image(), index)?;
                Ok(UsageResult::TypeInfo(self.class_from_type(&desc)?))
            }
            UsageKind::MethodDef => {
                let (class, method) = self.method_by_row(index)?;
                let pointer = class.methods[method.index as usize].pointer;
                Ok(UsageResult::MethodDef { method, pointer })
            }
            UsageKind::MethodRef => {
                let (class, method) = self.method_by_row(index)?;
                let pointer = class.methods[method.index as usize].pointer;
                Ok(UsageResult::MethodRef { method, pointer })
            }
            UsageKind::FieldInfo => Ok(UsageResult::FieldInfo(self.field_by_ref(index)?)),
            UsageKind::FieldRva => Ok(UsageResult::FieldRva(self.field_by_ref(index)?)),
            UsageKind::StringLiteral => {
                Ok(UsageResult::StringLiteral(self.string_literal(index)?))
            }
        }
    }
}
