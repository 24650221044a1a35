//! Objects: instances of registered classes.
//!
//! Every class's instance type starts with its parent's, down to the
//! [`Object`] header, which records the dynamic class. Objects are reached
//! through handles: [`Obj`] owns a heap object, [`ObjRef`] and [`ObjMut`]
//! borrow one. Handles keep access to the whole instance, so an object seen
//! as a `Fruit` can be cast back to the `Orange` it is.
//!
//! Objects are created and destroyed with the functions in [`lifecycle`].
//! Classes extending [`RefCounted`] may be shared by several owners and are
//! only destroyed when the last one lets go.

pub mod lifecycle;

mod handle;
mod refcounted;

use core::{any::Any, fmt, panic::Location};

pub use self::{
    handle::{Obj, ObjMut, ObjRef},
    refcounted::{RELEASE, RefCounted, TAKE},
};
use self::lifecycle::{Built, Site};
use crate::class::{ClassBuilder, Inherited, Instance, Method, class_of};

/// The signature of destructors.
pub type Destructor = fn(ObjMut<'_, Object>) -> crate::Result<()>;

/// The destructor slot, declared by [`Object`].
pub static DESTROY: Method<Destructor> = Method::new("destroy");

/// The header at the start of every instance.
///
/// Headers only come from [`Site::object`], which ties them to the class
/// being constructed.
#[repr(C)]
pub struct Object {
    class: &'static crate::class::Class,
    extra: Option<Box<dyn Any + Send + Sync>>,
    created_at: Option<&'static Location<'static>>,
    deleted_at: Option<&'static Location<'static>>,
}

impl Object {
    pub(crate) fn new(class: &'static crate::class::Class) -> Self {
        Self {
            class,
            extra: None,
            created_at: None,
            deleted_at: None,
        }
    }

    /// The dynamic class of the object.
    #[inline]
    pub fn class(&self) -> &'static crate::class::Class {
        self.class
    }

    /// The per-object payload, if any.
    #[inline]
    pub fn extra(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.extra.as_deref()
    }

    /// Downcasts the payload.
    pub fn downcast_extra<E: Any>(&self) -> Option<&E> {
        self.extra.as_deref()?.downcast_ref()
    }

    /// Replaces the payload, returning the previous one. The payload is
    /// dropped by the root destructor.
    pub fn set_extra<E: Any + Send + Sync>(&mut self, extra: E) -> Option<Box<dyn Any + Send + Sync>> {
        self.extra.replace(Box::new(extra))
    }

    /// Where the object was constructed. `None` for local objects.
    #[inline]
    pub fn created_at(&self) -> Option<&'static Location<'static>> {
        self.created_at
    }

    /// Where deletion was requested, once it was.
    #[inline]
    pub fn deleted_at(&self) -> Option<&'static Location<'static>> {
        self.deleted_at
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.class.name())
            .field("extra", &self.extra.is_some())
            .field("created_at", &self.created_at)
            .field("deleted_at", &self.deleted_at)
            .finish()
    }
}

fn construct_object(site: Site<'_, Object>, _: &()) -> crate::Result<Built<Object>> {
    let object = site.object();
    Ok(site.build(object))
}

fn destroy_object(mut this: ObjMut<'_, Object>) -> crate::Result<()> {
    this.extra = None;
    Ok(())
}

// SAFETY: `Object` is `repr(C)` and is the root of the hierarchy.
unsafe impl Instance for Object {
    type Parent = Object;
    type Params = ();
    const NAME: &'static str = "Object";

    fn define(class: &mut ClassBuilder<Self>) {
        class
            .constructor(construct_object)
            .destructor(destroy_object);
    }
}

/// Runs the destructor that `Owner`'s destructor overrides. Call it at the
/// end of a destructor defined by `Owner`.
#[track_caller]
pub fn destroy_inherited<Owner: Instance>(this: ObjMut<'_, Object>) -> crate::Result<()> {
    match this.class().inherited(&DESTROY, class_of::<Owner>())? {
        Inherited::Implemented { method, .. } => method(this),
        Inherited::Exhausted => Ok(()),
    }
}
