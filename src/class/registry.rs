use core::{
    any::TypeId,
    sync::atomic::{AtomicU32, Ordering},
};

use hashbrown::HashMap;
use rustc_hash::FxBuildHasher;
use vtry_internals::InstanceVtable;

use super::{Class, ClassId, Instance, builder::ClassBuilder};
use crate::lock::GlobalLock;

type Classes = HashMap<TypeId, &'static Class, FxBuildHasher>;

static CLASSES: GlobalLock<Classes> = GlobalLock::new();
static NEXT_ID: AtomicU32 = AtomicU32::new(0);

/// Returns the descriptor of `T`, registering `T` and its ancestors on first
/// use.
///
/// Registration is idempotent and thread-safe. When two threads register the
/// same class at once, both build a descriptor and one of them is discarded,
/// so ids may have gaps.
///
/// [`Instance::define`] runs during registration and must not ask for the
/// descriptor of the class being defined.
pub fn class_of<T: Instance>() -> &'static Class {
    let type_id = TypeId::of::<T>();
    if let Some(class) = CLASSES
        .read()
        .get()
        .and_then(|classes| classes.get(&type_id).copied())
    {
        return class;
    }

    let built = build::<T>();
    let mut classes = CLASSES.write();
    let class: &'static Class = *classes
        .get_or_default()
        .entry(type_id)
        .or_insert_with(|| &*Box::leak(Box::new(built)));
    class
}

fn build<T: Instance>() -> Class {
    let is_root = TypeId::of::<T>() == TypeId::of::<T::Parent>();

    let (parent, ancestors, slots) = if is_root {
        (None, Box::default(), Vec::new())
    } else {
        let parent = class_of::<T::Parent>();
        let ancestors: Box<[&'static Class]> =
            parent.ancestors.iter().copied().chain([parent]).collect();
        (Some(parent), ancestors, parent.slots.to_vec())
    };
    let id = ClassId(NEXT_ID.fetch_add(1, Ordering::Relaxed));

    let mut builder = ClassBuilder::<T>::new(id, ancestors.len(), slots);
    T::define(&mut builder);
    tracing::debug!(
        class = T::NAME,
        id = id.get(),
        depth = ancestors.len(),
        methods = builder.slots.len(),
        "class registered"
    );

    Class {
        id,
        name: T::NAME,
        type_id: TypeId::of::<T>(),
        parent,
        ancestors,
        vtable: InstanceVtable::new::<T>(),
        constructor: builder.constructor,
        slots: builder.slots.into_boxed_slice(),
    }
}
