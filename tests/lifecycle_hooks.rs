//! Lifecycle hooks and object counters. Kept in its own binary because hooks
//! are process-wide.

use std::sync::Mutex;

use vtry::{
    hooks::{
        Hooks,
        lifecycle::{LifecycleEvent, Stage},
    },
    object::{
        Object, RefCounted,
        lifecycle::{construct, delete, objects_created, objects_destroyed, with_local},
    },
};

static EVENTS: Mutex<Vec<(Stage, &'static str, u32)>> = Mutex::new(Vec::new());

fn record(event: &LifecycleEvent<'_>) {
    EVENTS.lock().unwrap().push((
        event.stage(),
        event.object().class().name(),
        event.location().line(),
    ));
}

#[test]
fn test_hooks_and_counters() {
    Hooks::new()
        .on_create(record)
        .on_destroy(record)
        .tag("lifecycle-tests")
        .install()
        .unwrap();

    let (created, destroyed) = (objects_created(), objects_destroyed());

    let line = line!() + 1;
    let object = construct::<Object>(&()).unwrap();
    let counted = construct::<RefCounted>(&()).unwrap();
    counted.as_ref().take();
    let shared = counted.share().unwrap();
    assert!(!delete(shared).unwrap());
    assert!(delete(counted).unwrap());
    assert!(delete(object).unwrap());
    with_local::<Object, _>(&(), |_| Ok(())).unwrap();

    assert_eq!(objects_created() - created, 2);
    assert_eq!(objects_destroyed() - destroyed, 2);
    assert_eq!(
        *EVENTS.lock().unwrap(),
        [
            (Stage::Created, "Object", line),
            (Stage::Created, "RefCounted", line + 1),
            (Stage::Destroying, "RefCounted", line + 5),
            (Stage::Destroying, "Object", line + 6),
        ]
    );

    assert!(Hooks::new().install().is_err());
}
