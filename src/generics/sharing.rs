//! Generic code sharing policy.
//!
//! One compiled body can serve every instantiation whose arguments are all
//! represented as machine pointers. The policy is deliberately narrow and
//! deterministic: an argument list shares exactly when every argument is
//! reference-like, and the shared key replaces each argument with `object`.
//! Any value-type argument anywhere in the list forces a fully specialized
//! instantiation.
//!
//! Most argument kinds classify from the descriptor alone; a generic
//! instantiation argument is reference-like exactly when its definition is a
//! reference type, which takes a look at the definition's row.

use crate::{
    metadata::{reader::MetadataImage, tables::TypeDefRow},
    typesystem::{TypeInterner, TypeKind, TypePayload, TypeRc},
    Result,
};

/// Whether an argument list routes to the shared body.
///
/// # Errors
/// Propagates row access errors while classifying a generic instantiation
/// argument.
pub fn is_shareable(image: &MetadataImage, args: &[TypeRc]) -> Result<bool> {
    if args.is_empty() {
        return Ok(false);
    }
    for arg in args {
        if !reference_like(image, arg)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// One argument's sharing classification.
fn reference_like(image: &MetadataImage, arg: &TypeRc) -> Result<bool> {
    if arg.is_reference_like() {
        return Ok(true);
    }
    match (&arg.kind, &arg.payload) {
        (TypeKind::GenericInst, TypePayload::GenericInst { definition, .. }) if !arg.byref => {
            let def: TypeDefRow = image.row(*definition)?;
            Ok(!def.is_value_type())
        }
        _ => Ok(false),
    }
}

/// The canonical shared key for a shareable argument list: every argument
/// becomes `object`.
///
/// # Errors
/// Never fails for a shareable list; propagates interner errors otherwise.
pub fn shared_arguments(interner: &TypeInterner, args: &[TypeRc]) -> crate::Result<Vec<TypeRc>> {
    let object = interner.primitive(TypeKind::Object)?;
    Ok(args.iter().map(|_| object.clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::builder::ImageBuilder;
    use std::sync::Arc;

    fn empty_image() -> MetadataImage {
        ImageBuilder::new().build().unwrap()
    }

    #[test]
    fn test_all_reference_args_share() {
        let image = empty_image();
        let interner = TypeInterner::new();
        let string = interner.primitive(TypeKind::String).unwrap();
        let object = interner.primitive(TypeKind::Object).unwrap();
        let array = interner.szarray(Arc::clone(&string));

        assert!(is_shareable(&image, &[string, object, array]).unwrap());
    }

    #[test]
    fn test_pointer_argument_shares() {
        let image = empty_image();
        let interner = TypeInterner::new();
        let int = interner.primitive(TypeKind::I4).unwrap();
        let ptr = interner.pointer(int);

        assert!(is_shareable(&image, &[ptr]).unwrap());
    }

    #[test]
    fn test_value_type_argument_blocks_sharing() {
        let image = empty_image();
        let interner = TypeInterner::new();
        let string = interner.primitive(TypeKind::String).unwrap();
        let int = interner.primitive(TypeKind::I4).unwrap();

        assert!(!is_shareable(&image, &[string, int]).unwrap());
        assert!(!is_shareable(&image, &[]).unwrap());
    }

    #[test]
    fn test_shared_key_is_all_object() {
        let interner = TypeInterner::new();
        let string = interner.primitive(TypeKind::String).unwrap();
        let array = interner.szarray(Arc::clone(&string));
        let object = interner.primitive(TypeKind::Object).unwrap();

        let shared = shared_arguments(&interner, &[string, array]).unwrap();
        assert_eq!(shared.len(), 2);
        assert!(shared.iter().all(|arg| Arc::ptr_eq(arg, &object)));
    }
}
