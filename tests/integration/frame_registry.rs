//! Registry and lifetime tests: wrapper liveness, reuse and frame retention.

use crate::integration::test_utils::*;
use anyhow::anyhow;
use dynframe::frame::{live_frames, registry};
use dynframe::{create_context, is_context, wrap, ConfigError, ContextOptions, DynamicCell};
use std::any::Any;
use std::rc::Rc;

#[test]
fn test_wrapper_is_context_until_last_clone_dropped() {
    let wrapper = wrap("tracked", |()| Ok(()));
    let id = wrapper.id();
    let copy = wrapper.clone();

    assert!(is_context(&id));
    assert!(copy.is_context());

    drop(wrapper);
    assert!(is_context(&id));
    drop(copy);
    assert!(!is_context(&id));
    assert!(registry::frame_of(id).is_none());
}

#[test]
fn test_wrapper_value_is_context_while_live() {
    let wrapper = wrap("live", |x: u8| Ok(x));
    let shared = Rc::new(wrapper.clone());
    assert!(is_context(&wrapper));
    assert!(is_context(&shared));
    assert!(is_context(&Some(wrapper.clone())));

    let id = wrapper.id();
    drop(wrapper);
    drop(shared);
    assert!(!is_context(&id));
}

#[test]
fn test_foreign_values_are_not_contexts() {
    assert!(!is_context(&42u32 as &dyn Any));
    assert!(!is_context(&"wrapper#1" as &dyn Any));
    let plain = |x: i32| x + 1;
    assert!(!is_context(&plain as &dyn Any));
}

#[test]
fn test_dropping_wrapper_releases_its_frame() {
    let before = live_frames();
    let wrapper = wrap("transient", |()| Ok(()));
    assert_eq!(live_frames(), before + 1);
    drop(wrapper);
    assert_eq!(live_frames(), before);
}

#[test]
fn test_descendants_keep_ancestor_frames_alive() {
    let before = live_frames();
    let outer = wrap("outer", |()| Ok(wrap("inner", |()| Ok(()))));
    let inner = outer.call(()).unwrap().completed().unwrap();
    let outer_id = outer.id();
    assert_eq!(live_frames(), before + 2);

    drop(outer);
    assert!(!is_context(&outer_id));
    // No wrapper names the outer frame any more, but the inner one still points at it
    assert_eq!(live_frames(), before + 2);
    assert_eq!(short_name(inner.frame().parent().unwrap().name()), "outer");

    drop(inner);
    assert_eq!(live_frames(), before);
}

#[test]
fn test_reuse_shares_the_existing_frame() {
    let log = new_log();
    let original = create_context(
        with_handler(
            ContextOptions::new().name("original"),
            Some(recorder(&log, "original", Reaction::Absorb)),
        )
        .body(|()| Ok(())),
    )
    .unwrap();

    let before = live_frames();
    let reused = create_context(
        ContextOptions::new()
            .name("ignored")
            .reuse(original.id())
            .body(|()| -> anyhow::Result<()> { Err(anyhow!("E1")) }),
    )
    .unwrap();

    assert_eq!(live_frames(), before);
    assert_ne!(reused.id(), original.id());
    assert!(Rc::ptr_eq(reused.frame(), original.frame()));
    assert_eq!(reused.name(), original.name());
    assert_eq!(registry::wrappers_for(original.frame()), 2);

    assert!(reused.call(()).unwrap().is_handled());
    let seen = log.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].label, "original");
    assert_eq!(short_names(seen[0].trace.frames()), vec!["original"]);
}

#[test]
fn test_reused_frame_outlives_original_wrapper() {
    let original = wrap("kept", |()| Ok(()));
    let reused = create_context(
        ContextOptions::new()
            .reuse(original.id())
            .body(|()| Ok(dynframe::current_context().map(|f| f.name().to_string()))),
    )
    .unwrap();

    drop(original);
    let name = reused.call(()).unwrap().completed().flatten().unwrap();
    assert_eq!(short_name(&name), "kept");
    assert_eq!(registry::wrappers_for(reused.frame()), 1);
}

#[test]
fn test_reuse_with_handler_is_rejected() {
    let original = wrap("target", |()| Ok(()));
    let result = create_context::<(), ()>(
        ContextOptions::new()
            .reuse(original.id())
            .on_error(|_fault| Ok(()))
            .body(|()| Ok(())),
    );
    assert!(matches!(result, Err(ConfigError::ReuseWithHandler)));
}

#[test]
fn test_reuse_with_bindings_is_rejected() {
    let cell = DynamicCell::declare("registry.reuse_bindings", 0u8).unwrap();
    let original = wrap("target", |()| Ok(()));
    let result = create_context::<(), ()>(
        ContextOptions::new()
            .reuse(original.id())
            .bind(&cell)
            .body(|()| Ok(())),
    );
    assert!(matches!(result, Err(ConfigError::ReuseWithBindings)));

    let empty = create_context::<(), ()>(
        ContextOptions::new()
            .reuse(original.id())
            .bindings(Vec::<String>::new())
            .body(|()| Ok(())),
    );
    assert!(matches!(empty, Err(ConfigError::ReuseWithBindings)));
}

#[test]
fn test_reuse_of_dead_wrapper_is_rejected() {
    let gone = wrap("gone", |()| Ok(()));
    let id = gone.id();
    drop(gone);

    let before = live_frames();
    let result = create_context::<(), ()>(ContextOptions::new().reuse(id).body(|()| Ok(())));
    assert!(matches!(result, Err(ConfigError::InvalidReuse(target)) if target == id));
    assert_eq!(live_frames(), before);
}

#[test]
fn test_missing_body_allocates_nothing() {
    let before = live_frames();
    let count = registry::live_count();
    let result = create_context::<(), ()>(ContextOptions::new().name("bodiless"));
    assert!(matches!(result, Err(ConfigError::MissingBody)));
    assert_eq!(live_frames(), before);
    assert_eq!(registry::live_count(), count);
}
