//! The process-wide runtime context.
//!
//! [`RuntimeContext`] is the explicit root of all mutable engine state: the
//! metadata image, the type intern table, the class arena, the generic
//! instantiation cache, the generated-code registration and the injected
//! allocator. It is constructed before any metadata is consumed and dropped only
//! at process exit; nothing in the engine lives in an implicit global.
//!
//! Classes are built on demand and at most once per type-definition row. A
//! build is single-flight: concurrent first requests for the same row block on
//! the winner's completion cell and then share the same arena entry. A finished
//! class is published with its layout, vtable and interface offsets already in
//! place, so partial state never escapes the building thread.

use std::cell::RefCell;
use std::sync::{Arc, OnceLock};

use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;
use rayon::prelude::*;

use crate::{
    codegen::CodeRegistration,
    generics::cache::GenericCache,
    metadata::{
        header::TableId,
        reader::MetadataImage,
        tables::{
            EventRow, FieldRefRow, FieldRow, MethodFlags, MethodRow, ParamRow, PropertyRow,
            TypeDefRow, FIELD_ATTRIBUTE_STATIC,
        },
    },
    runtime::{
        alloc::RuntimeAllocator,
        class::{
            ClassId, EventInfo, FieldHandle, FieldInfo, MethodHandle, MethodInfo, MethodSig,
            PropertyInfo, RuntimeClass,
        },
        init::ClassInit,
        layout::{self, FieldShape},
        statics::StaticStorage,
        vtable,
    },
    typesystem::{
        primitive_size_align, TypeInterner, TypeKind, TypePayload, TypeRc, OBJECT_HEADER_SIZE,
        WORD_SIZE,
    },
    Result,
};

/// Maximum class-build nesting one thread may accumulate (inheritance chains
/// plus value-type field graphs).
const CLASS_BUILD_DEPTH_LIMIT: usize = 128;

thread_local! {
    /// Type-definition rows the current thread is in the middle of building.
    /// Guards against cyclic metadata re-entering a build cell on the same
    /// thread, which the completion cell alone cannot detect.
    static BUILD_STACK: RefCell<Vec<u32>> = const { RefCell::new(Vec::new()) };
}

/// Root object owning all engine state.
pub struct RuntimeContext {
    image: Arc<MetadataImage>,
    interner: TypeInterner,
    code: CodeRegistration,
    allocator: Arc<dyn RuntimeAllocator>,

    /// Class arena; [`ClassId`] is an index into this vector
    classes: boxcar::Vec<Arc<RuntimeClass>>,
    /// Serializes id assignment with arena insertion
    arena_lock: std::sync::Mutex<()>,
    /// Finished classes by type-definition row
    by_row: SkipMap<u32, u32>,
    /// Single-flight completion cells for in-progress builds, by row
    building: DashMap<u32, Arc<OnceLock<std::result::Result<u32, String>>>>,
    /// Generic instantiation cache
    generics: GenericCache,
    /// Interned string literal objects by literal row
    literals: DashMap<u32, Arc<str>>,
}

impl RuntimeContext {
    /// Create a context over a loaded metadata image.
    #[must_use]
    pub fn new(
        image: Arc<MetadataImage>,
        code: CodeRegistration,
        allocator: Arc<dyn RuntimeAllocator>,
    ) -> Self {
        RuntimeContext {
            image,
            interner: TypeInterner::new(),
            code,
            allocator,
            classes: boxcar::Vec::new(),
            arena_lock: std::sync::Mutex::new(()),
            by_row: SkipMap::new(),
            building: DashMap::new(),
            generics: GenericCache::new(),
            literals: DashMap::new(),
        }
    }

    /// The metadata image this context resolves against.
    #[must_use]
    pub fn image(&self) -> &MetadataImage {
        &self.image
    }

    /// The type intern table.
    #[must_use]
    pub fn interner(&self) -> &TypeInterner {
        &self.interner
    }

    /// The generated-code registration.
    #[must_use]
    pub fn code(&self) -> &CodeRegistration {
        &self.code
    }

    /// The generic instantiation cache.
    #[must_use]
    pub fn generics(&self) -> &GenericCache {
        &self.generics
    }

    /// Look up an arena entry by handle.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for a handle this context never
    /// issued.
    pub fn class(&self, id: ClassId) -> Result<Arc<RuntimeClass>> {
        self.classes
            .get(id.0 as usize)
            .map(Arc::clone)
            .ok_or(crate::Error::OutOfBounds)
    }

    /// Number of classes built so far.
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.classes.count()
    }

    /// Get or build the runtime class for a type-definition row.
    ///
    /// Concurrent calls for the same row perform exactly one build; losers block
    /// until the winner publishes and then share its result.
    ///
    /// # Errors
    /// Propagates metadata corruption found while building, and
    /// [`crate::Error::RecursionLimit`] for cyclic inheritance or field graphs.
    pub fn class_by_row(&self, def_row: u32) -> Result<Arc<RuntimeClass>> {
        if let Some(entry) = self.by_row.get(&def_row) {
            return self.class(ClassId(*entry.value()));
        }

        if def_row >= self.image.row_count::<TypeDefRow>() {
            return Err(crate::Error::TypeNotFound(def_row));
        }

        let cycle = BUILD_STACK.with(|stack| {
            let stack = stack.borrow();
            stack.contains(&def_row) || stack.len() >= CLASS_BUILD_DEPTH_LIMIT
        });
        if cycle {
            return Err(crate::Error::RecursionLimit(CLASS_BUILD_DEPTH_LIMIT));
        }

        let cell = self
            .building
            .entry(def_row)
            .or_default()
            .clone();

        let outcome = cell.get_or_init(|| {
            BUILD_STACK.with(|stack| stack.borrow_mut().push(def_row));
            let built = self.build_class(def_row);
            BUILD_STACK.with(|stack| {
                stack.borrow_mut().pop();
            });

            match built {
                Ok(class) => {
                    self.by_row.insert(def_row, class.id.0);
                    Ok(class.id.0)
                }
                Err(error) => Err(error.to_string()),
            }
        });

        match outcome {
            Ok(id) => self.class(ClassId(*id)),
            Err(message) => Err(crate::Error::TypeError(message.clone())),
        }
    }

    /// Get or build the runtime class behind an interned descriptor.
    ///
    /// Defined types resolve through their type-definition row; generic
    /// instantiations route through the instantiation cache.
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeError`] for shapes that have no runtime class
    /// (primitives without a backing definition, generic parameters).
    pub fn class_from_type(&self, desc: &TypeRc) -> Result<Arc<RuntimeClass>> {
        match &desc.payload {
            TypePayload::TypeDef(row) => self.class_by_row(*row),
            TypePayload::GenericInst { definition, args } => {
                self.generics.instantiate(self, *definition, args)
            }
            _ => Err(crate::Error::TypeError(format!(
                "{desc} has no runtime class"
            ))),
        }
    }

    /// Build every non-generic class in the image, in parallel.
    ///
    /// This is the eager image-load path; lazy on-demand building remains
    /// available either way.
    ///
    /// # Errors
    /// Returns the first build error encountered.
    pub fn load_all_classes(&self) -> Result<()> {
        let rows: Vec<u32> = (0..self.image.row_count::<TypeDefRow>())
            .filter(|&row| {
                self.image
                    .row::<TypeDefRow>(row)
                    .map(|def| def.generic_container < 0)
                    .unwrap_or(true)
            })
            .collect();

        rows.par_iter().try_for_each(|&row| {
            self.class_by_row(row).map(|_| ())
        })
    }

    /// Resolve a method row to its owning class and handle.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for an invalid row, or
    /// [`crate::Error::Malformed`] if the row's declaring type does not own it.
    pub fn method_by_row(&self, method_row: u32) -> Result<(Arc<RuntimeClass>, MethodHandle)> {
        let row: MethodRow = self.image.row(method_row)?;
        let declaring = u32::try_from(row.declaring_type).map_err(|_| {
            malformed_error!("Method {} has no declaring type", method_row)
        })?;
        let class = self.class_by_row(declaring)?;

        let def: TypeDefRow = self.image.row(declaring)?;
        let start = u32::try_from(def.method_start).unwrap_or(u32::MAX);
        if method_row < start || method_row >= start + u32::from(def.method_count) {
            return Err(malformed_error!(
                "Method {} is outside its declaring type's method range",
                method_row
            ));
        }

        let handle = MethodHandle {
            class: class.id,
            index: method_row - start,
        };
        Ok((class, handle))
    }

    /// Resolve a field reference row to a field handle.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for an invalid row or field index.
    pub fn field_by_ref(&self, field_ref_row: u32) -> Result<FieldHandle> {
        let row: FieldRefRow = self.image.row(field_ref_row)?;
        let type_index = u32::try_from(row.type_index)
            .map_err(|_| malformed_error!("Field ref {} has no type", field_ref_row))?;
        let desc = self.interner.resolve(&self.image, type_index)?;
        let class = self.class_from_type(&desc)?;

        let index = u32::try_from(row.field_index)
            .map_err(|_| malformed_error!("Field ref {} has no field index", field_ref_row))?;
        if index as usize >= class.fields.len() {
            return Err(crate::Error::OutOfBounds);
        }
        Ok(FieldHandle {
            class: class.id,
            index,
        })
    }

    /// The interned string object for a literal row.
    ///
    /// The first request materializes the object; later requests from any thread
    /// share it.
    ///
    /// # Errors
    /// Propagates literal decoding errors from the image.
    pub fn string_literal(&self, index: u32) -> Result<Arc<str>> {
        if let Some(existing) = self.literals.get(&index) {
            return Ok(Arc::clone(&existing));
        }
        let value: Arc<str> = Arc::from(self.image.string_literal(index)?);
        Ok(Arc::clone(
            self.literals.entry(index).or_insert(value).value(),
        ))
    }

    /// Run the class's initializer if it has not run yet.
    ///
    /// Allocates the static block through the injected allocator on the first
    /// transition, then invokes the registered static constructor. Failure is
    /// recorded and re-surfaced on every later call.
    ///
    /// # Errors
    /// - [`crate::Error::TypeInitFailed`] with the recorded message
    /// - [`crate::Error::LockError`] on a poisoned initialization guard
    pub fn ensure_initialized(&self, class: &Arc<RuntimeClass>) -> Result<()> {
        class.init.ensure(&class.full_name(), || {
            let static_size = class
                .layout()
                .map_err(|e| e.to_string())?
                .static_size;

            let block = self
                .allocator
                .alloc_zeroed(static_size as usize, WORD_SIZE as usize)
                .map_err(|e| e.to_string())?;
            let _ = class.statics.set(StaticStorage::new(block));

            if class.has_cctor {
                if let Some(ctor) = self.code.cctor(class.token) {
                    let storage = class
                        .statics
                        .get()
                        .ok_or_else(|| "static storage missing".to_string())?;
                    ctor(storage)?;
                }
            }
            Ok(())
        })
    }

    /// Insert a fully assembled class into the arena, assigning its id.
    pub(crate) fn adopt_class(
        &self,
        assemble: impl FnOnce(ClassId) -> RuntimeClass,
    ) -> Result<Arc<RuntimeClass>> {
        let _guard = self
            .arena_lock
            .lock()
            .map_err(|_| crate::Error::LockError)?;
        let id = ClassId(self.classes.count() as u32);
        let class = Arc::new(assemble(id));
        self.classes.push(Arc::clone(&class));
        Ok(class)
    }

    fn build_class(&self, def_row: u32) -> Result<Arc<RuntimeClass>> {
        let def: TypeDefRow = self.image.row(def_row)?;
        let name = self.image.string(def.name)?.to_string();
        let namespace = self.image.string(def.namespace)?.to_string();

        // Ancestors first; the parent is fully built (layout and vtable
        // included) before this class's own build continues.
        let parent = if def.parent >= 0 {
            let parent_desc = self.interner.resolve(&self.image, def.parent as u32)?;
            match &parent_desc.payload {
                TypePayload::TypeDef(row) => Some(self.class_by_row(*row)?),
                _ => {
                    return Err(malformed_error!(
                        "Type {} has a parent without a definition",
                        name
                    ))
                }
            }
        } else {
            None
        };

        let byval = if def.byval_type >= 0 {
            self.interner.resolve(&self.image, def.byval_type as u32)?
        } else {
            self.interner.defined(def_row, def.is_value_type())
        };

        let element = if def.element_type >= 0 {
            Some(self.interner.resolve(&self.image, def.element_type as u32)?)
        } else {
            None
        };

        let fields = self.read_fields(&def)?;
        let methods = self.read_methods(&def)?;
        let interfaces = self.read_interfaces(&def)?;
        let raw_properties = self.read_properties(&def)?;
        let raw_events = self.read_events(&def)?;

        // Member tables are complete; the arena assigns the id, which the
        // accessor handles below are built against.
        let method_count = methods.len();
        let class = self.adopt_class(|id| {
            let handle = |relative: i32| -> Option<MethodHandle> {
                u32::try_from(relative)
                    .ok()
                    .filter(|&index| (index as usize) < method_count)
                    .map(|index| MethodHandle { class: id, index })
            };
            let properties = raw_properties
                .into_iter()
                .map(|(name, token, get, set)| PropertyInfo {
                    name,
                    token,
                    get: handle(get),
                    set: handle(set),
                })
                .collect();
            let events = raw_events
                .into_iter()
                .map(|(name, token, event_type, add, remove, raise)| EventInfo {
                    name,
                    token,
                    event_type,
                    add: handle(add),
                    remove: handle(remove),
                    raise: handle(raise),
                })
                .collect();
            RuntimeClass {
                id,
                def_row,
                token: def.token,
                name,
                namespace,
                byval,
                parent: parent.as_ref().map(|p| p.id),
                element,
                generic_definition: None,
                type_args: None,
                is_shared: false,
                is_value_type: def.is_value_type(),
                is_interface: def.is_interface(),
                is_abstract: def.is_abstract(),
                has_cctor: def.has_cctor(),
                packing: def.packing_size(),
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

        self.finish_class(&class, parent.as_deref())?;
        Ok(class)
    }

    /// Compute layout, vtable and interface offsets for an assembled class.
    pub(crate) fn finish_class(
        &self,
        class: &Arc<RuntimeClass>,
        parent: Option<&RuntimeClass>,
    ) -> Result<()> {
        let (base_size, base_align) = match parent {
            Some(p) => {
                let parent_layout = p.layout()?;
                (parent_layout.instance_size, parent_layout.instance_align)
            }
            None if class.is_value_type || class.is_interface => (0, 1),
            None => (OBJECT_HEADER_SIZE, WORD_SIZE),
        };

        let mut shapes = Vec::with_capacity(class.fields.len());
        for (index, field) in class.fields.iter().enumerate() {
            let (size, align) = self.field_size_align(&field.field_type)?;
            shapes.push(FieldShape {
                size,
                align,
                field: index as u32,
                is_static: field.is_static,
            });
        }
        let computed = layout::compute(
            &shapes,
            base_size,
            base_align,
            class.packing,
            class.is_value_type,
        );
        let _ = class.layout.set(computed);

        let mut table = vtable::build(
            class.id,
            &class.methods,
            parent.map(|p| p.vtable()).transpose()?,
        );

        let inherited_offsets = match parent {
            Some(p) => p.interface_offsets()?.to_vec(),
            None => Vec::new(),
        };
        let offsets = vtable::interface_offsets(
            &class.full_name(),
            &class.interfaces,
            &inherited_offsets,
            &mut table,
            &mut |interface| self.interface_method_list(interface),
        )?;

        let chain: Arc<[ClassId]> = match parent {
            Some(p) => {
                let mut chain = p.hierarchy()?.to_vec();
                chain.push(class.id);
                chain.into()
            }
            None => Arc::from(vec![class.id]),
        };

        let _ = class.vtable.set(table);
        let _ = class.interface_offsets.set(offsets);
        let _ = class.hierarchy.set(chain);
        Ok(())
    }

    /// Whether a `source` instance can be assigned to a location of `target`'s
    /// type.
    ///
    /// Classes check the cached ancestor chain in constant time; interface
    /// targets check the source's interface offset table, which already
    /// includes inherited interfaces.
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeError`] if either class is unfinished.
    pub fn is_assignable(
        &self,
        target: &Arc<RuntimeClass>,
        source: &Arc<RuntimeClass>,
    ) -> Result<bool> {
        if Arc::ptr_eq(target, source) {
            return Ok(true);
        }
        if target.is_interface {
            return Ok(source
                .interface_offsets()?
                .iter()
                .any(|entry| Arc::ptr_eq(&entry.interface, &target.byval)));
        }
        source.is_subclass_of(target)
    }

    fn interface_method_list(&self, interface: &TypeRc) -> Result<Vec<(String, MethodSig)>> {
        let class = self.class_from_type(interface)?;
        Ok(class
            .methods
            .iter()
            .filter(|m| m.is_virtual())
            .map(|m| (m.name.clone(), m.signature.clone()))
            .collect())
    }

    fn read_fields(&self, def: &TypeDefRow) -> Result<Vec<FieldInfo>> {
        let mut fields = Vec::with_capacity(usize::from(def.field_count));
        if def.field_start < 0 {
            return Ok(fields);
        }
        let start = def.field_start as u32;
        for row_index in start..start + u32::from(def.field_count) {
            let row: FieldRow = self.image.row(row_index)?;
            let type_index = u32::try_from(row.type_index)
                .map_err(|_| malformed_error!("Field {} has no type", row_index))?;
            let field_type = self.interner.resolve(&self.image, type_index)?;
            fields.push(FieldInfo {
                name: self.image.string(row.name)?.to_string(),
                token: row.token,
                is_static: field_type.attrs & FIELD_ATTRIBUTE_STATIC != 0,
                field_type,
            });
        }
        Ok(fields)
    }

    fn read_methods(&self, def: &TypeDefRow) -> Result<Vec<MethodInfo>> {
        let mut methods = Vec::with_capacity(usize::from(def.method_count));
        if def.method_start < 0 {
            return Ok(methods);
        }
        let start = def.method_start as u32;
        for row_index in start..start + u32::from(def.method_count) {
            let row: MethodRow = self.image.row(row_index)?;
            let return_type = {
                let index = u32::try_from(row.return_type)
                    .map_err(|_| malformed_error!("Method {} has no return type", row_index))?;
                self.interner.resolve(&self.image, index)?
            };

            let mut params = Vec::with_capacity(usize::from(row.parameter_count));
            if row.parameter_start >= 0 {
                let param_start = row.parameter_start as u32;
                for param_index in param_start..param_start + u32::from(row.parameter_count) {
                    let param: ParamRow = self.image.row(param_index)?;
                    let index = u32::try_from(param.type_index).map_err(|_| {
                        malformed_error!("Parameter {} has no type", param_index)
                    })?;
                    params.push(self.interner.resolve(&self.image, index)?);
                }
            }

            let flags = row.method_flags();
            let pointer = if flags.contains(MethodFlags::ABSTRACT) {
                None
            } else {
                self.code.method_pointer(row_index)
            };
            methods.push(MethodInfo {
                name: self.image.string(row.name)?.to_string(),
                token: row.token,
                flags,
                signature: MethodSig {
                    return_type,
                    params,
                },
                generic_container: u32::try_from(row.generic_container).ok(),
                pointer,
            });
        }
        Ok(methods)
    }

    fn read_interfaces(&self, def: &TypeDefRow) -> Result<Vec<TypeRc>> {
        let mut interfaces = Vec::with_capacity(usize::from(def.interfaces_count));
        if def.interfaces_start < 0 {
            return Ok(interfaces);
        }
        let start = def.interfaces_start as u32;
        for entry in start..start + u32::from(def.interfaces_count) {
            let type_index = self.image.index_entry(TableId::Interfaces, entry)?;
            interfaces.push(self.interner.resolve(&self.image, type_index)?);
        }
        Ok(interfaces)
    }

    #[allow(clippy::type_complexity)]
    fn read_properties(&self, def: &TypeDefRow) -> Result<Vec<(String, u32, i32, i32)>> {
        let mut properties = Vec::with_capacity(usize::from(def.property_count));
        if def.property_start < 0 {
            return Ok(properties);
        }
        let start = def.property_start as u32;
        for row_index in start..start + u32::from(def.property_count) {
            let row: PropertyRow = self.image.row(row_index)?;
            properties.push((
                self.image.string(row.name)?.to_string(),
                row.token,
                row.get,
                row.set,
            ));
        }
        Ok(properties)
    }

    #[allow(clippy::type_complexity)]
    fn read_events(
        &self,
        def: &TypeDefRow,
    ) -> Result<Vec<(String, u32, TypeRc, i32, i32, i32)>> {
        let mut events = Vec::with_capacity(usize::from(def.event_count));
        if def.event_start < 0 {
            return Ok(events);
        }
        let start = def.event_start as u32;
        for row_index in start..start + u32::from(def.event_count) {
            let row: EventRow = self.image.row(row_index)?;
            let type_index = u32::try_from(row.type_index)
                .map_err(|_| malformed_error!("Event {} has no type", row_index))?;
            events.push((
                self.image.string(row.name)?.to_string(),
                row.token,
                self.interner.resolve(&self.image, type_index)?,
                row.add,
                row.remove,
                row.raise,
            ));
        }
        Ok(events)
    }

    /// Storage size and alignment of a field of type `desc`.
    pub(crate) fn field_size_align(&self, desc: &TypeRc) -> Result<(u32, u32)> {
        if desc.byref {
            return Ok((WORD_SIZE, WORD_SIZE));
        }
        if let Some(size_align) = primitive_size_align(desc.kind) {
            return Ok(size_align);
        }
        match (&desc.kind, &desc.payload) {
            (TypeKind::ValueType, TypePayload::TypeDef(row)) => {
                let class = self.class_by_row(*row)?;
                let class_layout = class.layout()?;
                Ok((class_layout.instance_size, class_layout.instance_align))
            }
            (TypeKind::GenericInst, TypePayload::GenericInst { definition, args }) => {
                let def: TypeDefRow = self.image.row(*definition)?;
                if def.is_value_type() {
                    let class = self.generics.instantiate(self, *definition, args)?;
                    let class_layout = class.layout()?;
                    Ok((class_layout.instance_size, class_layout.instance_align))
                } else {
                    Ok((WORD_SIZE, WORD_SIZE))
                }
            }
            (TypeKind::Void, _) => Err(malformed_error!("Field of type void")),
            // References, pointers, generic variables in a shared layout.
            _ => Ok((WORD_SIZE, WORD_SIZE)),
        }
    }
}
