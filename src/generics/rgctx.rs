//! Runtime generic context (RGCTX) slot resolution.
//!
//! Each generic instantiation carries a table of context slots the compiled body
//! loads from: types, classes and methods whose identity depends on the generic
//! arguments. A slot is declared with a data kind and an opaque payload at
//! conversion time and decoded lazily; the decoded value is memoized per slot,
//! since the generic context of a given call site never changes after the
//! instantiation exists.
//!
//! Constrained-call slots additionally take a receiver type at resolution time:
//! a value-type receiver picks the direct (adjustor-thunked) dispatch path, a
//! reference receiver picks the boxed virtual path.

use std::sync::{Arc, OnceLock};

use crate::{
    generics::inst,
    runtime::{
        class::{MethodHandle, RuntimeClass},
        context::RuntimeContext,
        vtable::MethodPointer,
    },
    typesystem::TypeRc,
    Result,
};

/// Data kind of one RGCTX slot.
///
/// The discriminants are the on-disk encoding and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RgctxKind {
    /// An interned type descriptor
    Type = 1,
    /// A fully built runtime class
    Class = 2,
    /// A method entry
    Method = 3,
    /// The array type of an element type
    Array = 4,
    /// A constrained call, dispatched by receiver kind
    Constrained = 5,
}

impl RgctxKind {
    /// Decode a kind tag.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an unknown tag.
    pub fn from_tag(tag: u8) -> Result<Self> {
        Ok(match tag {
            1 => RgctxKind::Type,
            2 => RgctxKind::Class,
            3 => RgctxKind::Method,
            4 => RgctxKind::Array,
            5 => RgctxKind::Constrained,
            _ => return Err(malformed_error!("Unrecognized RGCTX kind tag - {}", tag)),
        })
    }
}

/// One slot declaration: kind plus opaque payload.
///
/// `data` is a type-table index for `Type`/`Class`/`Array`/`Constrained` slots
/// and a method row for `Method` slots; `extra` carries the constrained method
/// row and is unused otherwise.
#[derive(Debug, Clone, Copy)]
pub struct RgctxSlotDef {
    /// Data kind
    pub kind: RgctxKind,
    /// Primary payload
    pub data: u32,
    /// Secondary payload, used by constrained slots
    pub extra: u32,
}

/// A decoded slot value.
#[derive(Clone)]
pub enum RgctxValue {
    /// An interned, fully substituted type descriptor
    Type(TypeRc),
    /// A dispatch-ready runtime class
    Class(Arc<RuntimeClass>),
    /// A method entry with its resolved entry point
    Method {
        /// The resolved method
        method: MethodHandle,
        /// Entry point, adjustor-thunked for value-type constrained dispatch
        pointer: Option<MethodPointer>,
    },
}

/// The RGCTX of one generic instantiation (or generic method instance).
pub struct RgctxTable {
    /// Type arguments of the owning class instantiation
    class_args: Arc<[TypeRc]>,
    /// Type arguments of the owning method instance, if any
    method_args: Option<Arc<[TypeRc]>>,
    slots: Vec<RgctxSlotDef>,
    values: Vec<OnceLock<std::result::Result<RgctxValue, String>>>,
}

impl RgctxTable {
    /// Create a table over fixed slot declarations and generic arguments.
    #[must_use]
    pub fn new(
        slots: Vec<RgctxSlotDef>,
        class_args: Arc<[TypeRc]>,
        method_args: Option<Arc<[TypeRc]>>,
    ) -> Self {
        let values = slots.iter().map(|_| OnceLock::new()).collect();
        RgctxTable {
            class_args,
            method_args,
            slots,
            values,
        }
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the table has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Resolve slot `index`, memoizing the decoded value.
    ///
    /// `receiver` is required for constrained slots and ignored otherwise.
    ///
    /// # Errors
    /// - [`crate::Error::OutOfBounds`] for an invalid slot index
    /// - [`crate::Error::TypeError`] for a constrained slot without a receiver,
    ///   or any recorded decode failure
    pub fn resolve(
        &self,
        ctx: &RuntimeContext,
        index: usize,
        receiver: Option<&TypeRc>,
    ) -> Result<RgctxValue> {
        let (Some(slot), Some(cell)) = (self.slots.get(index), self.values.get(index)) else {
            return Err(crate::Error::OutOfBounds);
        };

        // A missing receiver is a caller mistake, not a decode outcome; it must
        // not poison the memo cell.
        if slot.kind == RgctxKind::Constrained && receiver.is_none() && cell.get().is_none() {
            return Err(crate::Error::TypeError(
                "Constrained slot requires a receiver type".to_string(),
            ));
        }

        let outcome = cell.get_or_init(|| {
            self.decode(ctx, *slot, receiver).map_err(|e| e.to_string())
        });
        match outcome {
            Ok(value) => Ok(value.clone()),
            Err(message) => Err(crate::Error::TypeError(message.clone())),
        }
    }

    fn substituted_type(&self, ctx: &RuntimeContext, type_index: u32) -> Result<TypeRc> {
        let raw = ctx.interner().resolve(ctx.image(), type_index)?;
        inst::substitute(
            ctx.interner(),
            &raw,
            &self.class_args,
            self.method_args.as_deref(),
        )
    }

    fn decode(
        &self,
        ctx: &RuntimeContext,
        slot: RgctxSlotDef,
        receiver: Option<&TypeRc>,
    ) -> Result<RgctxValue> {
        match slot.kind {
            RgctxKind::Type => Ok(RgctxValue::Type(self.substituted_type(ctx, slot.data)?)),
            RgctxKind::Class => {
                let desc = self.substituted_type(ctx, slot.data)?;
                Ok(RgctxValue::Class(ctx.class_from_type(&desc)?))
            }
            RgctxKind::Array => {
                let element = self.substituted_type(ctx, slot.data)?;
                Ok(RgctxValue::Type(ctx.interner().szarray(element)))
            }
            RgctxKind::Method => {
                let (class, handle) = ctx.method_by_row(slot.data)?;
                let pointer = class.methods[handle.index as usize].pointer;
                Ok(RgctxValue::Method {
                    method: handle,
                    pointer,
                })
            }
            RgctxKind::Constrained => {
                let Some(receiver) = receiver else {
                    return Err(crate::Error::TypeError(
                        "Constrained slot requires a receiver type".to_string(),
                    ));
                };

                let (class, handle) = ctx.method_by_row(slot.extra)?;
                let method = &class.methods[handle.index as usize];

                let pointer = if receiver.is_value_kind() {
                    // Direct dispatch on the unboxed receiver; the adjustor
                    // thunk fixes the calling convention when one exists.
                    ctx.code()
                        .adjustor_thunk(method.token)
                        .or(method.pointer)
                } else {
                    method.pointer
                };

                Ok(RgctxValue::Method {
                    method: handle,
                    pointer,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags_round_trip() {
        for (tag, kind) in [
            (1_u8, RgctxKind::Type),
            (2, RgctxKind::Class),
            (3, RgctxKind::Method),
            (4, RgctxKind::Array),
            (5, RgctxKind::Constrained),
        ] {
            assert_eq!(RgctxKind::from_tag(tag).unwrap(), kind);
        }
        assert!(RgctxKind::from_tag(0).is_err());
        assert!(RgctxKind::from_tag(6).is_err());
    }
}
