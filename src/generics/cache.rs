//! The generic instantiation cache.
//!
//! Instantiation is canonicalizing and single-flight: the argument list is
//! interned element-wise first, the (definition, canonical arguments) key is
//! looked up, and a miss builds exactly one instantiated class even under
//! concurrent first use — losers block on the winner's completion cell and share
//! its arena entry. Shareable argument lists (see [`crate::generics::sharing`])
//! are routed to one shared body keyed on all-`object` arguments before the
//! lookup, so the routing never depends on request order.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::{
    generics::{inst, sharing},
    metadata::tables::{GenericContainerRow, MethodRow, TypeDefRow},
    runtime::{
        class::{ClassId, FieldInfo, MethodHandle, MethodInfo, MethodSig, RuntimeClass},
        context::RuntimeContext,
        init::ClassInit,
    },
    typesystem::{TypePayload, TypeRc},
    Result,
};

/// Cache key: a generic definition plus its canonicalized argument list.
///
/// Arguments compare and hash by pointer, which is structural identity for
/// interned descriptors.
#[derive(Clone)]
pub struct GenericKey {
    /// Type-definition row of the generic definition
    pub definition: u32,
    /// Canonical, interned argument list
    pub args: Arc<[TypeRc]>,
}

impl PartialEq for GenericKey {
    fn eq(&self, other: &Self) -> bool {
        self.definition == other.definition
            && self.args.len() == other.args.len()
            && self
                .args
                .iter()
                .zip(other.args.iter())
                .all(|(a, b)| Arc::ptr_eq(a, b))
    }
}

impl Eq for GenericKey {}

impl Hash for GenericKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.definition.hash(state);
        for arg in self.args.iter() {
            (Arc::as_ptr(arg) as usize).hash(state);
        }
    }
}

/// Cache key: a generic method definition plus its canonicalized argument
/// list. Same identity rules as [`GenericKey`].
#[derive(Clone)]
pub struct MethodKey {
    /// Method row of the generic method definition
    pub method_row: u32,
    /// Canonical, interned method argument list
    pub args: Arc<[TypeRc]>,
}

impl PartialEq for MethodKey {
    fn eq(&self, other: &Self) -> bool {
        self.method_row == other.method_row
            && self.args.len() == other.args.len()
            && self
                .args
                .iter()
                .zip(other.args.iter())
                .all(|(a, b)| Arc::ptr_eq(a, b))
    }
}

impl Eq for MethodKey {}

impl Hash for MethodKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.method_row.hash(state);
        for arg in self.args.iter() {
            (Arc::as_ptr(arg) as usize).hash(state);
        }
    }
}

/// One instantiated generic method: the definition's handle plus the
/// substituted signature and routing decision.
#[derive(Debug)]
pub struct InstantiatedMethod {
    /// Method row of the definition
    pub method_row: u32,
    /// The definition within its declaring class
    pub method: MethodHandle,
    /// Declaring class
    pub class: ClassId,
    /// Canonical, interned method arguments
    pub args: Arc<[TypeRc]>,
    /// Signature with method-level variables substituted away
    pub signature: MethodSig,
    /// Routed to the shared body
    pub is_shared: bool,
    /// Entry point of the compiled body
    pub pointer: Option<usize>,
}

/// Process-wide instantiation cache.
pub struct GenericCache {
    /// Completion cells per key; losers of a build race block here
    entries: DashMap<GenericKey, Arc<OnceLock<std::result::Result<u32, String>>>>,
    /// Completion cells per generic method instantiation
    method_entries:
        DashMap<MethodKey, Arc<OnceLock<std::result::Result<Arc<InstantiatedMethod>, String>>>>,
    /// Number of instantiation builds actually performed
    builds: AtomicUsize,
    /// Number of method instantiation builds actually performed
    method_builds: AtomicUsize,
}

impl GenericCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        GenericCache {
            entries: DashMap::new(),
            method_entries: DashMap::new(),
            builds: AtomicUsize::new(0),
            method_builds: AtomicUsize::new(0),
        }
    }

    /// Number of instantiated classes actually built (cache misses).
    #[must_use]
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// Number of instantiated methods actually built (cache misses).
    #[must_use]
    pub fn method_build_count(&self) -> usize {
        self.method_builds.load(Ordering::SeqCst)
    }

    /// Get or build the instantiation of `definition` with `args`.
    ///
    /// # Errors
    /// - [`crate::Error::TypeError`] if `definition` is not generic or the
    ///   argument count mismatches its container
    /// - Propagated build errors from the class builder
    pub fn instantiate(
        &self,
        ctx: &RuntimeContext,
        definition: u32,
        args: &[TypeRc],
    ) -> Result<Arc<RuntimeClass>> {
        let def: TypeDefRow = ctx.image().row(definition)?;
        let container_row = u32::try_from(def.generic_container).map_err(|_| {
            crate::Error::TypeError(format!(
                "Type definition {definition} is not a generic definition"
            ))
        })?;
        let container: GenericContainerRow = ctx.image().row(container_row)?;
        if args.len() != container.type_argc as usize {
            return Err(crate::Error::TypeError(format!(
                "Expected {} type arguments, got {}",
                container.type_argc,
                args.len()
            )));
        }

        // Canonicalize the argument list through the interner; the instantiation
        // descriptor's payload is the canonical sequence.
        let requested = ctx.interner().generic_inst(definition, args.to_vec());
        let TypePayload::GenericInst {
            args: canonical, ..
        } = &requested.payload
        else {
            return Err(crate::Error::TypeError(
                "Instantiation descriptor lost its arguments".to_string(),
            ));
        };

        let shared = sharing::is_shareable(ctx.image(), canonical)?;
        let key_args: Arc<[TypeRc]> = if shared {
            let rewritten = sharing::shared_arguments(ctx.interner(), canonical)?;
            let canonical_shared = ctx.interner().generic_inst(definition, rewritten);
            let TypePayload::GenericInst { args, .. } = &canonical_shared.payload else {
                return Err(crate::Error::TypeError(
                    "Shared descriptor lost its arguments".to_string(),
                ));
            };
            Arc::clone(args)
        } else {
            Arc::clone(canonical)
        };

        let key = GenericKey {
            definition,
            args: Arc::clone(&key_args),
        };
        let cell = self.entries.entry(key).or_default().clone();

        let outcome = cell.get_or_init(|| {
            self.builds.fetch_add(1, Ordering::SeqCst);
            self.build(ctx, definition, key_args, shared)
                .map(|class| class.id.0)
                .map_err(|e| e.to_string())
        });

        match outcome {
            Ok(id) => ctx.class(ClassId(*id)),
            Err(message) => Err(crate::Error::TypeError(message.clone())),
        }
    }

    /// Get or build the instantiation of the generic method `method_row` with
    /// `args`.
    ///
    /// Canonicalization and routing mirror [`GenericCache::instantiate`]:
    /// structurally equal argument lists return the same entry, reference-like
    /// lists share one all-`object` entry, and concurrent first use performs
    /// exactly one build.
    ///
    /// # Errors
    /// - [`crate::Error::TypeError`] if `method_row` is not a generic method or
    ///   the argument count mismatches its container
    /// - Propagated build errors from the declaring class
    pub fn instantiate_method(
        &self,
        ctx: &RuntimeContext,
        method_row: u32,
        args: &[TypeRc],
    ) -> Result<Arc<InstantiatedMethod>> {
        let row: MethodRow = ctx.image().row(method_row)?;
        let container_row = u32::try_from(row.generic_container).map_err(|_| {
            crate::Error::TypeError(format!("Method {method_row} is not a generic definition"))
        })?;
        let container: GenericContainerRow = ctx.image().row(container_row)?;
        if container.is_method == 0 {
            return Err(crate::Error::TypeError(format!(
                "Method {method_row} references a type-level generic container"
            )));
        }
        if args.len() != container.type_argc as usize {
            return Err(crate::Error::TypeError(format!(
                "Expected {} method arguments, got {}",
                container.type_argc,
                args.len()
            )));
        }

        let shared = sharing::is_shareable(ctx.image(), args)?;
        let key_args: Arc<[TypeRc]> = if shared {
            sharing::shared_arguments(ctx.interner(), args)?.into()
        } else {
            args.to_vec().into()
        };
        let key = MethodKey {
            method_row,
            args: Arc::clone(&key_args),
        };
        let cell = self.method_entries.entry(key).or_default().clone();

        let outcome = cell.get_or_init(|| {
            self.method_builds.fetch_add(1, Ordering::SeqCst);
            self.build_method(ctx, method_row, key_args, shared)
                .map_err(|e| e.to_string())
        });

        match outcome {
            Ok(method) => Ok(Arc::clone(method)),
            Err(message) => Err(crate::Error::TypeError(message.clone())),
        }
    }

    /// Build one instantiated method from its definition.
    fn build_method(
        &self,
        ctx: &RuntimeContext,
        method_row: u32,
        args: Arc<[TypeRc]>,
        is_shared: bool,
    ) -> Result<Arc<InstantiatedMethod>> {
        let (class, handle) = ctx.method_by_row(method_row)?;
        let template = &class.methods[handle.index as usize];
        let class_args: &[TypeRc] = class.type_args.as_deref().unwrap_or(&[]);
        let interner = ctx.interner();

        let return_type = inst::substitute(
            interner,
            &template.signature.return_type,
            class_args,
            Some(&args),
        )?;
        let params = template
            .signature
            .params
            .iter()
            .map(|p| inst::substitute(interner, p, class_args, Some(&args)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Arc::new(InstantiatedMethod {
            method_row,
            method: handle,
            class: class.id,
            args,
            signature: MethodSig {
                return_type,
                params,
            },
            is_shared,
            // Shared and specialized instances alike execute the definition's
            // compiled body.
            pointer: template.pointer,
        }))
    }

    /// Build one instantiated class from its definition's template.
    fn build(
        &self,
        ctx: &RuntimeContext,
        definition: u32,
        args: Arc<[TypeRc]>,
        is_shared: bool,
    ) -> Result<Arc<RuntimeClass>> {
        let template = ctx.class_by_row(definition)?;
        let interner = ctx.interner();

        let fields: Vec<FieldInfo> = template
            .fields
            .iter()
            .map(|field| {
                Ok(FieldInfo {
                    name: field.name.clone(),
                    token: field.token,
                    field_type: inst::substitute(interner, &field.field_type, &args, None)?,
                    is_static: field.is_static,
                })
            })
            .collect::<Result<_>>()?;

        let methods: Vec<MethodInfo> = template
            .methods
            .iter()
            .map(|method| {
                let return_type =
                    inst::substitute(interner, &method.signature.return_type, &args, None)?;
                let params = method
                    .signature
                    .params
                    .iter()
                    .map(|p| inst::substitute(interner, p, &args, None))
                    .collect::<Result<Vec<_>>>()?;
                Ok(MethodInfo {
                    name: method.name.clone(),
                    token: method.token,
                    flags: method.flags,
                    signature: MethodSig {
                        return_type,
                        params,
                    },
                    generic_container: method.generic_container,
                    // The instantiation executes the definition's compiled body;
                    // shared and specialized instances alike.
                    pointer: method.pointer,
                })
            })
            .collect::<Result<_>>()?;

        let interfaces = template
            .interfaces
            .iter()
            .map(|interface| inst::substitute(interner, interface, &args, None))
            .collect::<Result<Vec<_>>>()?;

        let byval = interner.generic_inst(definition, args.to_vec());
        let parent = template.parent;
        let parent_class = parent.map(|id| ctx.class(id)).transpose()?;

        let class = ctx.adopt_class(|id| {
            let remap = |handle: Option<crate::runtime::class::MethodHandle>| {
                handle.map(|h| crate::runtime::class::MethodHandle {
                    class: id,
                    index: h.index,
                })
            };
            let properties = template
                .properties
                .iter()
                .map(|p| crate::runtime::class::PropertyInfo {
                    name: p.name.clone(),
                    token: p.token,
                    get: remap(p.get),
                    set: remap(p.set),
                })
                .collect();
            let events = template
                .events
                .iter()
                .map(|e| crate::runtime::class::EventInfo {
                    name: e.name.clone(),
                    token: e.token,
                    event_type: e.event_type.clone(),
                    add: remap(e.add),
                    remove: remap(e.remove),
                    raise: remap(e.raise),
                })
                .collect();
            RuntimeClass {
                id,
                def_row: definition,
                token: template.token,
                name: template.name.clone(),
                namespace: template.namespace.clone(),
                byval,
                parent,
                element: template.element.clone(),
                generic_definition: Some(template.id),
                type_args: Some(Arc::clone(&args)),
                is_shared,
                is_value_type: template.is_value_type,
                is_interface: template.is_interface,
                is_abstract: template.is_abstract,
                has_cctor: template.has_cctor,
                packing: template.packing,
                fields,
                methods,
                properties,
                events,
                interfaces,
                layout: OnceLock::new(),
                vtable: OnceLock::new(),
                interface_offsets: OnceLock::new(),
                hierarchy: OnceLock::new(),
                statics: OnceLock::new(),
                init: ClassInit::new(),
            }
        })?;

        ctx.finish_class(&class, parent_class.as_deref())?;
        Ok(class)
    }
}

impl Default for GenericCache {
    fn default() -> Self {
        GenericCache::new()
    }
}
