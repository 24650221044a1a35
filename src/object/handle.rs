use core::{
    fmt,
    marker::PhantomData,
    ops::{Deref, DerefMut},
    ptr::NonNull,
};

use super::{Object, RefCounted};
use crate::{
    class::{Class, Extends, Inherited, Instance, Method, class_of},
    exception::GENERIC_CODE,
};

/// An owning handle to a heap object.
///
/// The handle is released with [`delete`](super::lifecycle::delete); dropping
/// it without doing so leaks the object. Reference-counted objects may have
/// several handles, created with [`share`](Self::share).
pub struct Obj<T: Instance> {
    ptr: NonNull<T>,
}

// SAFETY: `T: Instance` requires `Send + Sync`, and a handle only hands out
// access to `T`.
unsafe impl<T: Instance> Send for Obj<T> {}
// SAFETY: See above.
unsafe impl<T: Instance> Sync for Obj<T> {}

impl<T: Instance> Obj<T> {
    /// # Safety
    ///
    /// 1. `ptr` points to a live, initialized `T` allocated by the lifecycle
    ///    functions.
    /// 2. The handle owns the object, or one reference to it.
    #[inline]
    pub(crate) unsafe fn from_raw(ptr: NonNull<T>) -> Self {
        Self { ptr }
    }

    #[inline]
    pub(crate) fn into_raw(self) -> NonNull<T> {
        self.ptr
    }

    /// A shared view with full access to the class's methods.
    #[inline]
    pub fn as_ref(&self) -> ObjRef<'_, T> {
        // SAFETY: the handle keeps the object alive for the borrow.
        unsafe { ObjRef::from_raw(self.ptr) }
    }

    /// An exclusive view. Returns `None` for reference-counted objects, which
    /// may be reachable through other handles.
    pub fn get_mut(&mut self) -> Option<ObjMut<'_, T>> {
        if self.class().is_ref_counted() {
            return None;
        }
        // SAFETY: a non-counted object has exactly one handle, borrowed
        // mutably here.
        Some(unsafe { ObjMut::from_raw(self.ptr) })
    }

    /// The dynamic class.
    #[inline]
    pub fn class(&self) -> &'static Class {
        self.as_object().class()
    }

    /// The root header.
    #[inline]
    pub fn as_object(&self) -> &Object {
        // SAFETY: every instance starts with its `Object` header.
        unsafe { self.ptr.cast::<Object>().as_ref() }
    }

    /// Converts to a handle to an ancestor class.
    #[inline]
    pub fn upcast<A: Instance>(self) -> Obj<A>
    where
        T: Extends<A>,
    {
        Obj {
            ptr: self.ptr.cast(),
        }
    }

    /// Converts to a handle to `U` if the object is a `U`, and gives the
    /// handle back otherwise.
    pub fn downcast<U: Instance>(self) -> Result<Obj<U>, Self> {
        if self.class().extends(class_of::<U>()) {
            Ok(Obj {
                ptr: self.ptr.cast(),
            })
        } else {
            Err(self)
        }
    }

    /// Takes one more reference to a reference-counted object and returns a
    /// handle owning it.
    ///
    /// Throws when the class is not reference counted, or when nobody owns a
    /// reference yet. A fresh object starts with no references; its creator
    /// takes the first one.
    #[track_caller]
    pub fn share(&self) -> crate::Result<Self> {
        let Some(counted) = self.as_ref().try_cast::<RefCounted>() else {
            crate::throw!(
                GENERIC_CODE,
                "{} objects are not reference counted and cannot be shared.",
                self.class().name()
            );
        };
        if counted.refs() < 1 {
            crate::throw!(
                GENERIC_CODE,
                "{} object has no owner to share it with.",
                self.class().name()
            );
        }
        counted.take();
        // SAFETY: the reference taken above belongs to the new handle.
        Ok(unsafe { self.alias() })
    }

    /// Creates a second handle without touching the reference count.
    ///
    /// # Safety
    ///
    /// The caller must ensure the object is deleted through at most as many
    /// handles as it has owners.
    #[inline]
    pub unsafe fn alias(&self) -> Self {
        Self { ptr: self.ptr }
    }

    /// Whether both handles designate the same object.
    #[inline]
    pub fn ptr_eq<U: Instance>(&self, other: &Obj<U>) -> bool {
        self.ptr.cast::<()>() == other.ptr.cast::<()>()
    }
}

impl<T: Instance> Deref for Obj<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: the handle keeps the object alive for the borrow.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: Instance> fmt::Debug for Obj<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Obj({} @ {:p})", self.class().name(), self.ptr)
    }
}

/// A shared view of an object.
///
/// Unlike `&T`, the view keeps access to the whole instance, so it can be
/// cast down to the dynamic class and passed to methods of any class.
pub struct ObjRef<'a, T: Instance> {
    ptr: NonNull<T>,
    _borrow: PhantomData<&'a T>,
}

// SAFETY: an `ObjRef` behaves like `&T`, and `T: Sync`.
unsafe impl<T: Instance> Send for ObjRef<'_, T> {}
// SAFETY: See above.
unsafe impl<T: Instance> Sync for ObjRef<'_, T> {}

impl<T: Instance> Clone for ObjRef<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Instance> Copy for ObjRef<'_, T> {}

impl<'a, T: Instance> ObjRef<'a, T> {
    /// # Safety
    ///
    /// `ptr` points to a live, initialized instance of `T` or of a descendant,
    /// not mutated for `'a`.
    #[inline]
    pub(crate) unsafe fn from_raw(ptr: NonNull<T>) -> Self {
        Self {
            ptr,
            _borrow: PhantomData,
        }
    }

    /// The instance, for the whole borrow.
    #[inline]
    pub fn get(self) -> &'a T {
        // SAFETY: valid for `'a` by construction.
        unsafe { self.ptr.as_ref() }
    }

    /// The dynamic class.
    #[inline]
    pub fn class(self) -> &'static Class {
        self.object().class()
    }

    /// The root header.
    #[inline]
    pub fn object(self) -> &'a Object {
        // SAFETY: every instance starts with its `Object` header.
        unsafe { self.ptr.cast::<Object>().as_ref() }
    }

    /// The same object, viewed through its root header.
    #[inline]
    pub fn as_object(self) -> ObjRef<'a, Object> {
        ObjRef {
            ptr: self.ptr.cast(),
            _borrow: PhantomData,
        }
    }

    /// Views the object as an ancestor class.
    #[inline]
    pub fn upcast<A: Instance>(self) -> ObjRef<'a, A>
    where
        T: Extends<A>,
    {
        ObjRef {
            ptr: self.ptr.cast(),
            _borrow: PhantomData,
        }
    }

    /// Views the object as `U`, or `None` when it is not a `U`.
    pub fn try_cast<U: Instance>(self) -> Option<ObjRef<'a, U>> {
        self.class().extends(class_of::<U>()).then(|| ObjRef {
            ptr: self.ptr.cast(),
            _borrow: PhantomData,
        })
    }

    /// Views the object as `U`, throwing when it is not a `U`.
    #[track_caller]
    pub fn cast<U: Instance>(self) -> crate::Result<ObjRef<'a, U>> {
        match self.try_cast() {
            Some(cast) => Ok(cast),
            None => crate::throw!(
                GENERIC_CODE,
                "Object of class {} cannot be cast to {}.",
                self.class().name(),
                U::NAME
            ),
        }
    }

    /// The implementation of `key` for the object's dynamic class.
    #[track_caller]
    pub fn method<F: Copy + 'static>(self, key: &'static Method<F>) -> crate::Result<F> {
        self.class().method(key)
    }

    /// The implementation of `key` that `Owner`'s version overrides, as seen
    /// from the object's dynamic class.
    #[track_caller]
    pub fn inherited<Owner: Instance, F: Copy + 'static>(
        self,
        key: &'static Method<F>,
    ) -> crate::Result<Inherited<F>> {
        self.class().inherited(key, class_of::<Owner>())
    }
}

impl<T: Instance> Deref for ObjRef<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: valid for the borrow by construction.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: Instance> fmt::Debug for ObjRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjRef({} @ {:p})", self.class().name(), self.ptr)
    }
}

/// An exclusive view of an object, as passed to destructors and to the body
/// of [`with_local`](super::lifecycle::with_local).
pub struct ObjMut<'a, T: Instance> {
    ptr: NonNull<T>,
    _borrow: PhantomData<&'a mut T>,
}

// SAFETY: an `ObjMut` behaves like `&mut T`, and `T: Send + Sync`.
unsafe impl<T: Instance> Send for ObjMut<'_, T> {}
// SAFETY: See above.
unsafe impl<T: Instance> Sync for ObjMut<'_, T> {}

impl<'a, T: Instance> ObjMut<'a, T> {
    /// # Safety
    ///
    /// `ptr` points to a live, initialized instance of `T` or of a descendant,
    /// not accessed through anything else for `'a`.
    #[inline]
    pub(crate) unsafe fn from_raw(ptr: NonNull<T>) -> Self {
        Self {
            ptr,
            _borrow: PhantomData,
        }
    }

    /// A shorter exclusive view.
    #[inline]
    pub fn reborrow(&mut self) -> ObjMut<'_, T> {
        ObjMut {
            ptr: self.ptr,
            _borrow: PhantomData,
        }
    }

    /// A shared view for the duration of the borrow.
    #[inline]
    pub fn as_ref(&self) -> ObjRef<'_, T> {
        // SAFETY: shared access while `self` is borrowed.
        unsafe { ObjRef::from_raw(self.ptr) }
    }

    /// The dynamic class.
    #[inline]
    pub fn class(&self) -> &'static Class {
        self.as_ref().class()
    }

    /// The root header.
    #[inline]
    pub fn object_mut(&mut self) -> &mut Object {
        // SAFETY: every instance starts with its `Object` header, and the view
        // is exclusive.
        unsafe { self.ptr.cast::<Object>().as_mut() }
    }

    /// The same object, viewed through its root header.
    #[inline]
    pub fn into_object(self) -> ObjMut<'a, Object> {
        ObjMut {
            ptr: self.ptr.cast(),
            _borrow: PhantomData,
        }
    }

    /// Views the object as an ancestor class.
    #[inline]
    pub fn upcast<A: Instance>(self) -> ObjMut<'a, A>
    where
        T: Extends<A>,
    {
        ObjMut {
            ptr: self.ptr.cast(),
            _borrow: PhantomData,
        }
    }

    /// Views the object as `U`, throwing when it is not a `U`.
    #[track_caller]
    pub fn cast<U: Instance>(self) -> crate::Result<ObjMut<'a, U>> {
        if !self.class().extends(class_of::<U>()) {
            crate::throw!(
                GENERIC_CODE,
                "Object of class {} cannot be cast to {}.",
                self.class().name(),
                U::NAME
            );
        }
        Ok(ObjMut {
            ptr: self.ptr.cast(),
            _borrow: PhantomData,
        })
    }
}

impl<T: Instance> Deref for ObjMut<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: valid for the borrow by construction.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: Instance> DerefMut for ObjMut<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: exclusive for the borrow by construction.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T: Instance> fmt::Debug for ObjMut<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjMut({} @ {:p})", self.class().name(), self.ptr)
    }
}
