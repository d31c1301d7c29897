//! Static initialization: at-most-once semantics, failure caching, static
//! storage allocation through the injected allocator.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use aotcore::prelude::*;
use aotcore::Error;
use common::*;

/// One class with a static int counter field and a static constructor.
fn cctor_image() -> (MetadataImage, u32) {
    let mut builder = ImageBuilder::new();
    let n_class = builder.add_string("Config");
    let ns = builder.add_string("App");
    let n_field = builder.add_string("revision");

    // A static i4 field: the descriptor carries the static attribute.
    let t_static_i4 = builder.add_type(&typed_field_row(TypeKind::I4, 0, 0x0010));
    let f0 = builder.add_field(&field_row(n_field, t_static_i4, 0x0400_0001));

    let mut def = empty_type_def(n_class, ns, 0x0200_0001);
    def.bitfield = BIT_HAS_CCTOR;
    def.field_start = f0 as i32;
    def.field_count = 1;
    let row = builder.add_type_def(&def);

    (builder.build().unwrap(), row)
}

#[test]
fn concurrent_first_use_runs_the_initializer_once() {
    let (image, row) = cctor_image();
    let code = CodeRegistration::empty();
    let runs = Arc::new(AtomicUsize::new(0));
    {
        let runs = Arc::clone(&runs);
        code.register_cctor(
            0x0200_0001,
            Arc::new(move |statics| {
                runs.fetch_add(1, Ordering::SeqCst);
                statics.write(0, &7_i32.to_le_bytes()).map_err(|e| e.to_string())
            }),
        );
    }

    let ctx = Arc::new(RuntimeContext::new(
        Arc::new(image),
        code,
        Arc::new(SystemAllocator),
    ));
    let class = ctx.class_by_row(row).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            let class = Arc::clone(&class);
            std::thread::spawn(move || ctx.ensure_initialized(&class))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(class.is_initialized());

    // The static block was allocated and populated exactly once.
    let statics = class.statics().unwrap();
    let mut out = [0_u8; 4];
    statics.read(0, &mut out).unwrap();
    assert_eq!(i32::from_le_bytes(out), 7);
}

#[test]
fn initializer_failure_is_recorded_and_resurfaced() {
    let (image, row) = cctor_image();
    let code = CodeRegistration::empty();
    let runs = Arc::new(AtomicUsize::new(0));
    {
        let runs = Arc::clone(&runs);
        code.register_cctor(
            0x0200_0001,
            Arc::new(move |_| {
                runs.fetch_add(1, Ordering::SeqCst);
                Err("revision table unavailable".to_string())
            }),
        );
    }

    let ctx = RuntimeContext::new(Arc::new(image), code, Arc::new(SystemAllocator));
    let class = ctx.class_by_row(row).unwrap();

    let first = ctx.ensure_initialized(&class);
    assert!(matches!(first, Err(Error::TypeInitFailed { .. })));

    // A second, unrelated access re-surfaces the same failure without
    // re-running the constructor.
    match ctx.ensure_initialized(&class) {
        Err(Error::TypeInitFailed { class: name, message }) => {
            assert_eq!(name, "App.Config");
            assert_eq!(message, "revision table unavailable");
        }
        other => panic!("expected recorded failure, got {other:?}"),
    }
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn allocation_failure_propagates_and_is_recorded() {
    struct ExhaustedAllocator;
    impl RuntimeAllocator for ExhaustedAllocator {
        fn alloc(&self, size: usize, align: usize) -> aotcore::Result<Box<[u8]>> {
            Err(Error::OutOfMemory { size, align })
        }
        fn alloc_zeroed(&self, size: usize, align: usize) -> aotcore::Result<Box<[u8]>> {
            Err(Error::OutOfMemory { size, align })
        }
    }

    let (image, row) = cctor_image();
    let ctx = RuntimeContext::new(
        Arc::new(image),
        CodeRegistration::empty(),
        Arc::new(ExhaustedAllocator),
    );
    let class = ctx.class_by_row(row).unwrap();

    // The failed allocation becomes the recorded initialization failure.
    assert!(matches!(
        ctx.ensure_initialized(&class),
        Err(Error::TypeInitFailed { .. })
    ));
    assert!(matches!(
        ctx.ensure_initialized(&class),
        Err(Error::TypeInitFailed { .. })
    ));
}

#[test]
fn class_without_cctor_initializes_trivially() {
    let mut builder = ImageBuilder::new();
    let n_class = builder.add_string("Plain");
    let ns = builder.add_string("App");
    let row = builder.add_type_def(&empty_type_def(n_class, ns, 0x0200_0001));

    let ctx = RuntimeContext::new(
        Arc::new(builder.build().unwrap()),
        CodeRegistration::empty(),
        Arc::new(SystemAllocator),
    );
    let class = ctx.class_by_row(row).unwrap();
    ctx.ensure_initialized(&class).unwrap();
    assert!(class.is_initialized());
    // No static fields: the block exists and is empty.
    assert_eq!(class.statics().unwrap().size(), 0);
}
