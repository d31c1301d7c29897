//! Generic argument substitution.
//!
//! Turns a descriptor containing generic variables into a concrete shape by
//! replacing every `Var`/`MVar` with the corresponding argument, re-interning
//! each rewritten composite so the result is canonical. Descriptors without
//! variables pass through unchanged (same `Arc`).

use std::sync::Arc;

use crate::{
    typesystem::{TypeDesc, TypeInterner, TypeKind, TypePayload, TypeRc, TYPE_GRAPH_DEPTH_LIMIT},
    Result,
};

/// Substitute generic arguments into `desc`.
///
/// `class_args` replaces type-level variables; `method_args` (when present)
/// replaces method-level variables.
///
/// # Errors
/// - [`crate::Error::TypeError`] if a variable's position is out of range or a
///   method variable appears without method arguments
/// - [`crate::Error::RecursionLimit`] on absurdly nested shapes
pub fn substitute(
    interner: &TypeInterner,
    desc: &TypeRc,
    class_args: &[TypeRc],
    method_args: Option<&[TypeRc]>,
) -> Result<TypeRc> {
    substitute_depth(interner, desc, class_args, method_args, 0)
}

fn substitute_depth(
    interner: &TypeInterner,
    desc: &TypeRc,
    class_args: &[TypeRc],
    method_args: Option<&[TypeRc]>,
    depth: usize,
) -> Result<TypeRc> {
    if depth >= TYPE_GRAPH_DEPTH_LIMIT {
        return Err(crate::Error::RecursionLimit(TYPE_GRAPH_DEPTH_LIMIT));
    }

    match (&desc.kind, &desc.payload) {
        (TypeKind::Var, TypePayload::GenericParam { num, .. }) => class_args
            .get(usize::from(*num))
            .cloned()
            .ok_or_else(|| {
                crate::Error::TypeError(format!("Type argument {num} out of range"))
            }),
        (TypeKind::MVar, TypePayload::GenericParam { num, .. }) => method_args
            .and_then(|args| args.get(usize::from(*num)))
            .cloned()
            .ok_or_else(|| {
                crate::Error::TypeError(format!("Method argument {num} out of range"))
            }),
        (_, TypePayload::Element(element)) => {
            let substituted =
                substitute_depth(interner, element, class_args, method_args, depth + 1)?;
            if Arc::ptr_eq(&substituted, element) {
                return Ok(Arc::clone(desc));
            }
            Ok(interner.intern(TypeDesc {
                kind: desc.kind,
                attrs: desc.attrs,
                byref: desc.byref,
                pinned: desc.pinned,
                payload: TypePayload::Element(substituted),
            }))
        }
        (_, TypePayload::Array { element, rank }) => {
            let substituted =
                substitute_depth(interner, element, class_args, method_args, depth + 1)?;
            if Arc::ptr_eq(&substituted, element) {
                return Ok(Arc::clone(desc));
            }
            Ok(interner.intern(TypeDesc {
                kind: desc.kind,
                attrs: desc.attrs,
                byref: desc.byref,
                pinned: desc.pinned,
                payload: TypePayload::Array {
                    element: substituted,
                    rank: *rank,
                },
            }))
        }
        (_, TypePayload::GenericInst { definition, args }) => {
            let mut changed = false;
            let mut rewritten = Vec::with_capacity(args.len());
            for arg in args.iter() {
                let substituted =
                    substitute_depth(interner, arg, class_args, method_args, depth + 1)?;
                changed |= !Arc::ptr_eq(&substituted, arg);
                rewritten.push(substituted);
            }
            if !changed {
                return Ok(Arc::clone(desc));
            }
            Ok(interner.generic_inst(*definition, rewritten))
        }
        _ => Ok(Arc::clone(desc)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(interner: &TypeInterner, num: u16) -> TypeRc {
        interner.intern(TypeDesc {
            kind: TypeKind::Var,
            attrs: 0,
            byref: false,
            pinned: false,
            payload: TypePayload::GenericParam { owner: 0, num },
        })
    }

    #[test]
    fn test_variable_replaced_by_argument() {
        let interner = TypeInterner::new();
        let t = var(&interner, 0);
        let int = interner.primitive(TypeKind::I4).unwrap();

        let result = substitute(&interner, &t, &[Arc::clone(&int)], None).unwrap();
        assert!(Arc::ptr_eq(&result, &int));
    }

    #[test]
    fn test_nested_composite_rewritten_and_canonical() {
        let interner = TypeInterner::new();
        let t = var(&interner, 0);
        let array_of_t = interner.szarray(t);
        let int = interner.primitive(TypeKind::I4).unwrap();

        let result = substitute(&interner, &array_of_t, &[Arc::clone(&int)], None).unwrap();
        assert!(Arc::ptr_eq(&result, &interner.szarray(int)));
    }

    #[test]
    fn test_variable_free_shape_passes_through() {
        let interner = TypeInterner::new();
        let int = interner.primitive(TypeKind::I4).unwrap();
        let array = interner.szarray(Arc::clone(&int));

        let result = substitute(&interner, &array, &[int], None).unwrap();
        assert!(Arc::ptr_eq(&result, &array));
    }

    #[test]
    fn test_out_of_range_argument() {
        let interner = TypeInterner::new();
        let t = var(&interner, 3);
        let int = interner.primitive(TypeKind::I4).unwrap();
        assert!(matches!(
            substitute(&interner, &t, &[int], None),
            Err(crate::Error::TypeError(_))
        ));
    }
}
