//! Creating and destroying objects.
//!
//! - [`construct`] allocates a zeroed heap instance and runs the class's
//!   constructor on it. A reference-counted class may instead hand back an
//!   existing instance, which makes singletons possible.
//! - [`delete`] releases a handle and, for the last owner, runs the
//!   destructor and frees the memory.
//! - [`with_local`] constructs an object on the stack for the duration of a
//!   closure.
//!
//! Construction and destruction failures are exceptions, and memory is never
//! leaked on the way out: a failed constructor frees the instance, and a
//! failed destructor still lets the memory go.

use core::{
    cell::Cell,
    mem::MaybeUninit,
    panic::Location,
    ptr::NonNull,
    sync::atomic::{AtomicUsize, Ordering},
};

use vtry_internals::RawInstance;

use super::{Obj, ObjMut, ObjRef, Object, RefCounted};
use crate::{
    class::{Class, Instance, class_of},
    exception::{GENERIC_CODE, TraceEntry, Try, rethrow},
    hooks::{
        self,
        lifecycle::{LifecycleEvent, Stage},
    },
};

static CREATED: AtomicUsize = AtomicUsize::new(0);
static DESTROYED: AtomicUsize = AtomicUsize::new(0);

/// Number of heap objects constructed so far, process-wide.
pub fn objects_created() -> usize {
    CREATED.load(Ordering::Relaxed)
}

/// Number of heap objects whose destruction has started, process-wide.
pub fn objects_destroyed() -> usize {
    DESTROYED.load(Ordering::Relaxed)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Placement {
    Heap,
    Local,
}

/// The memory a constructor initializes.
///
/// A constructor finishes with exactly one of [`build`](Self::build), which
/// moves the new value in, or [`substitute`](Self::substitute), which hands
/// back an existing instance instead.
pub struct Site<'a, T: Instance> {
    ptr: NonNull<T>,
    class: &'static Class,
    placement: Placement,
    written: &'a Cell<bool>,
}

impl<'a, T: Instance> Site<'a, T> {
    fn new(ptr: NonNull<T>, class: &'static Class, placement: Placement, written: &'a Cell<bool>) -> Self {
        Self {
            ptr,
            class,
            placement,
            written,
        }
    }

    /// The class being constructed.
    #[inline]
    pub fn class(&self) -> &'static Class {
        self.class
    }

    /// Whether the object lives on the stack, see [`with_local`].
    #[inline]
    pub fn is_local(&self) -> bool {
        self.placement == Placement::Local
    }

    /// A fresh header for the instance.
    pub fn object(&self) -> Object {
        Object::new(self.class)
    }

    /// Moves the finished value into the instance.
    pub fn build(self, value: T) -> Built<T> {
        // SAFETY: the site points to memory reserved for a `T`, written at most
        // once because `build` consumes the site.
        unsafe { self.ptr.write(value) };
        // SAFETY: the value was just written and starts with its header.
        unsafe { (*self.ptr.cast::<Object>().as_ptr()).class = self.class };
        self.written.set(true);
        Built {
            kind: BuiltKind::Fresh(self.ptr),
        }
    }

    /// Returns `existing` instead of constructing in place. The reserved
    /// memory is released.
    ///
    /// Only reference-counted classes may substitute, and never for a local
    /// object; other cases fail the construction.
    pub fn substitute(self, existing: Obj<T>) -> Built<T> {
        Built {
            kind: BuiltKind::Existing(existing),
        }
    }
}

impl<T: Instance> core::fmt::Debug for Site<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Site")
            .field("class", &self.class.name())
            .field("placement", &self.placement)
            .field("written", &self.written.get())
            .finish()
    }
}

/// Proof that a constructor finished, returned from it.
#[must_use = "a constructor must return what it built"]
pub struct Built<T: Instance> {
    kind: BuiltKind<T>,
}

enum BuiltKind<T: Instance> {
    Fresh(NonNull<T>),
    Existing(Obj<T>),
}

impl<T: Instance> Built<T> {
    /// Whether the constructor built in place rather than substituting.
    #[inline]
    pub fn is_fresh(&self) -> bool {
        matches!(self.kind, BuiltKind::Fresh(_))
    }

    /// A view of the instance the constructor returns.
    pub fn get(&self) -> ObjRef<'_, T> {
        match &self.kind {
            // SAFETY: the instance was initialized by `build` and is not
            // mutated while `self` is borrowed.
            BuiltKind::Fresh(ptr) => unsafe { ObjRef::from_raw(*ptr) },
            BuiltKind::Existing(existing) => existing.as_ref(),
        }
    }

    /// A handle to the instance the constructor returns, typically kept by a
    /// class that tracks its instances.
    ///
    /// # Safety
    ///
    /// 1. The instance must not be local (see [`Site::is_local`]).
    /// 2. The handle must not be used to delete the object unless it owns a
    ///    reference, and not before the construction returned.
    pub unsafe fn alias(&self) -> Obj<T> {
        match &self.kind {
            // SAFETY: heap instance per the caller's guarantee; ownership is
            // the caller's concern.
            BuiltKind::Fresh(ptr) => unsafe { Obj::from_raw(*ptr) },
            // SAFETY: as above.
            BuiltKind::Existing(existing) => unsafe { existing.alias() },
        }
    }
}

impl<T: Instance> core::fmt::Debug for Built<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.kind {
            BuiltKind::Fresh(_) => f.write_str("Built::Fresh"),
            BuiltKind::Existing(existing) => write!(f, "Built::Existing({existing:?})"),
        }
    }
}

fn entry_at(location: &'static Location<'static>) -> TraceEntry {
    TraceEntry::new(GENERIC_CODE).at(location.file(), location.line())
}

fn constructor_of<T: Instance>(
    class: &'static Class,
    location: &'static Location<'static>,
) -> crate::Result<crate::class::Constructor<T>> {
    match class.constructor::<T>() {
        Some(constructor) => Ok(constructor),
        None => Err(crate::exception::throw(entry_at(location).with_message(format_args!(
            "{} is abstract and cannot be instantiated.",
            class.name()
        )))),
    }
}

/// Runs `constructor` in its own region; a failure gets a note naming the
/// class.
fn run_constructor<T: Instance>(
    constructor: crate::class::Constructor<T>,
    site: Site<'_, T>,
    params: &T::Params,
    location: &'static Location<'static>,
) -> crate::Result<Built<T>> {
    let class = site.class;
    Try::run(|| constructor(site, params))
        .catch_all(|_| {
            Err(rethrow(entry_at(location).with_message(format_args!(
                "constructor of {} failed.",
                class.name()
            ))))
        })
        .end()
}

/// Constructs a heap object of class `T`.
///
/// Throws when `T` is abstract or its constructor throws. A reference-counted
/// class's constructor may return an existing instance instead; any other
/// class doing so is an error, and the returned handle is dropped unused.
#[track_caller]
pub fn construct<T: Instance>(params: &T::Params) -> crate::Result<Obj<T>> {
    let location = Location::caller();
    let class = class_of::<T>();
    let constructor = constructor_of::<T>(class, location)?;

    let Some(raw) = RawInstance::allocate_zeroed(class.vtable()) else {
        return Err(crate::exception::throw(entry_at(location).with_message(format_args!(
            "cannot allocate {} bytes for {}.",
            class.instance_size(),
            class.name()
        ))));
    };
    let ptr = raw.as_ptr::<T>();
    let written = Cell::new(false);

    let site = Site::new(ptr, class, Placement::Heap, &written);
    let built = match run_constructor(constructor, site, params, location) {
        Ok(built) => built,
        Err(thrown) => {
            if written.get() {
                // SAFETY: `build` initialized a `T`, and the constructor is
                // done with it.
                unsafe { raw.dispose() };
            } else {
                // SAFETY: the memory was never initialized.
                unsafe { raw.deallocate() };
            }
            return Err(thrown);
        }
    };

    match built.kind {
        BuiltKind::Fresh(_) => {
            let ptr = raw.into_raw::<T>();
            // SAFETY: `build` initialized the instance, which starts with its
            // header, and nothing else refers to it yet.
            unsafe { (*ptr.cast::<Object>().as_ptr()).created_at = Some(location) };
            // SAFETY: as above; the handle is the only one.
            let obj = unsafe { Obj::from_raw(ptr) };

            CREATED.fetch_add(1, Ordering::Relaxed);
            hooks::fire_create(&LifecycleEvent::new(
                Stage::Created,
                obj.as_ref().as_object(),
                location,
            ));
            tracing::debug!(class = class.name(), "object created");
            Ok(obj)
        }
        BuiltKind::Existing(existing) => {
            // SAFETY: the constructor did not write the memory.
            unsafe { raw.deallocate() };
            if !class.is_ref_counted() {
                return Err(crate::exception::throw(entry_at(location).with_message(format_args!(
                    "constructor of {} returned a non-input object ({}) that doesn't extend RefCounted.",
                    class.name(),
                    existing.class().name()
                ))));
            }
            tracing::debug!(class = class.name(), "existing object substituted");
            Ok(existing)
        }
    }
}

/// Releases one owner of `object` and tells whether that was the last one.
///
/// Objects that are not reference counted have a single owner, so this is
/// always `true` for them.
///
/// # Safety
///
/// The caller must own the reference it releases, and must destroy the object
/// or stop using it according to the result.
pub unsafe fn can_release(object: ObjRef<'_, Object>) -> bool {
    match object.try_cast::<RefCounted>() {
        // SAFETY: the caller owns the reference.
        Some(counted) => unsafe { counted.release() == 1 },
        None => true,
    }
}

/// Releases `obj` and destroys the object if it was its last owner.
///
/// Returns whether the object was destroyed. The destructor runs in its own
/// region; the memory is freed even when it throws, and the failure is passed
/// on.
#[track_caller]
pub fn delete<T: Instance>(obj: Obj<T>) -> crate::Result<bool> {
    let location = Location::caller();
    let class = obj.class();
    // SAFETY: the handle is consumed, so its reference is released exactly
    // once.
    if !unsafe { can_release(obj.as_ref().as_object()) } {
        return Ok(false);
    }

    let ptr = obj.into_raw().cast::<Object>();
    // SAFETY: the last owner gave up its handle, so access is exclusive.
    let mut this = unsafe { ObjMut::from_raw(ptr) };
    this.deleted_at = Some(location);
    DESTROYED.fetch_add(1, Ordering::Relaxed);
    hooks::fire_destroy(&LifecycleEvent::new(
        Stage::Destroying,
        this.as_ref(),
        location,
    ));
    tracing::debug!(class = class.name(), "object destroyed");

    let destructor = class.destructor();
    Try::run(|| match destructor {
        Some(destructor) => destructor(this),
        None => Ok(()),
    })
    .finally(|| {
        // SAFETY:
        // 1. The block was allocated by `construct` with this class's vtable.
        // 2. The destructor's view has been consumed and nothing else refers
        //    to the object.
        unsafe { RawInstance::from_raw_parts(ptr, class.vtable()).dispose() };
        Ok(())
    })
    .end()?;
    Ok(true)
}

/// Constructs a `T` on the stack, runs `body` with it, and destroys it.
///
/// Local objects are not counted and not reported to lifecycle hooks. Their
/// constructor may not substitute an existing instance, and they must not be
/// referenced past `body`. A reference-counted local object must hold exactly
/// one reference when `body` returns, the one its local owner gives up.
#[track_caller]
pub fn with_local<T: Instance, R>(
    params: &T::Params,
    body: impl FnOnce(ObjMut<'_, T>) -> crate::Result<R>,
) -> crate::Result<R> {
    let location = Location::caller();
    let class = class_of::<T>();
    let constructor = constructor_of::<T>(class, location)?;

    let mut storage = MaybeUninit::<T>::zeroed();
    let ptr = NonNull::from(&mut storage).cast::<T>();
    let written = Cell::new(false);

    let site = Site::new(ptr, class, Placement::Local, &written);
    let built = match run_constructor(constructor, site, params, location) {
        Ok(built) => built,
        Err(thrown) => {
            if written.get() {
                // SAFETY: `build` initialized the value, and the constructor
                // is done with it.
                unsafe { ptr.drop_in_place() };
            }
            return Err(thrown);
        }
    };
    if let BuiltKind::Existing(existing) = built.kind {
        return Err(crate::exception::throw(entry_at(location).with_message(format_args!(
            "A RefCounted object ({}) didn't use local memory.",
            existing.class().name()
        ))));
    }

    // SAFETY: the value is initialized and only reachable through this view
    // until `body` returns.
    let this = unsafe { ObjMut::from_raw(ptr) };
    Try::run(|| body(this))
        .finally(|| {
            // SAFETY: `body` is done, so nothing borrows the value mutably.
            let object = unsafe { ObjRef::from_raw(ptr.cast::<Object>()) };
            // SAFETY: the local owner releases its own reference.
            let last = unsafe { can_release(object) };
            if !last {
                return Err(crate::exception::throw(entry_at(location).with_message(format_args!(
                    "A {} object created locally cannot be released (holding RefCounted?).",
                    class.name()
                ))));
            }
            let outcome = match class.destructor() {
                // SAFETY: exclusive access, as above.
                Some(destructor) => destructor(unsafe { ObjMut::from_raw(ptr.cast::<Object>()) }),
                None => Ok(()),
            };
            // SAFETY: the destructor is done; the value is dropped once and the
            // storage is never read again.
            unsafe { ptr.drop_in_place() };
            outcome
        })
        .end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_lifecycle() {
        let before = objects_destroyed();
        let obj = construct::<Object>(&()).unwrap();
        assert_eq!(obj.class().name(), "Object");
        assert!(obj.created_at().is_some());
        assert!(delete(obj).unwrap());
        assert!(objects_destroyed() > before);
    }

    #[test]
    fn test_local_object() {
        let name = with_local::<Object, _>(&(), |mut this| {
            assert!(this.created_at().is_none());
            this.object_mut().set_extra(5_u8);
            Ok(this.class().name())
        })
        .unwrap();
        assert_eq!(name, "Object");
    }

    #[test]
    fn test_local_ref_counted_needs_one_reference() {
        let refs = with_local::<RefCounted, _>(&(), |this| {
            let counted = this.as_ref().cast::<RefCounted>()?;
            counted.take();
            Ok(counted.refs())
        });
        assert_eq!(refs.ok(), Some(1));

        let untaken = Try::run(|| with_local::<RefCounted, _>(&(), |_| Ok(0)))
            .catch_all(|exception| {
                assert!(exception.message().ends_with("cannot be released (holding RefCounted?)."));
                Ok(-1)
            })
            .end();
        assert_eq!(untaken.ok(), Some(-1));
    }

    #[test]
    fn test_local_ref_counted_must_be_released() {
        let outcome = Try::run(|| {
            with_local::<RefCounted, _>(&(), |this| {
                this.as_ref().cast::<RefCounted>()?.take();
                this.as_ref().cast::<RefCounted>()?.take();
                Ok(())
            })
        })
        .catch_all(|exception| {
            assert_eq!(
                exception.message(),
                "A RefCounted object created locally cannot be released (holding RefCounted?)."
            );
            Ok(())
        })
        .end();
        assert!(outcome.is_ok());
    }
}
