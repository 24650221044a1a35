use core::{
    ops::Deref,
    sync::atomic::{AtomicIsize, Ordering},
};

use super::{
    ObjRef, Object,
    lifecycle::{Built, Site},
};
use crate::class::{ClassBuilder, Instance, Method};

/// Takes a reference. Returns the count before the call.
pub static TAKE: Method<fn(ObjRef<'_, RefCounted>) -> isize> = Method::new("take");

/// Drops a reference. Returns the count before the call.
pub static RELEASE: Method<fn(ObjRef<'_, RefCounted>) -> isize> = Method::new("release");

/// Base class of objects with several owners.
///
/// A fresh object has a count of 0: whoever keeps it calls
/// [`take`](ObjRef::take), and every owner finishes with
/// [`delete`](super::lifecycle::delete), which only destroys the object when
/// it releases the last reference.
#[repr(C)]
pub struct RefCounted {
    base: Object,
    refs: AtomicIsize,
}

impl RefCounted {
    /// Wraps the header of a fresh instance, with no references.
    pub fn new(base: Object) -> Self {
        Self {
            base,
            refs: AtomicIsize::new(0),
        }
    }

    /// The current count.
    #[inline]
    pub fn refs(&self) -> isize {
        self.refs.load(Ordering::Acquire)
    }
}

impl Deref for RefCounted {
    type Target = Object;

    fn deref(&self) -> &Object {
        &self.base
    }
}

impl core::fmt::Debug for RefCounted {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RefCounted")
            .field("base", &self.base)
            .field("refs", &self.refs())
            .finish()
    }
}

impl<'a> ObjRef<'a, RefCounted> {
    /// Takes a reference through the class's `TAKE` method. Returns the count
    /// before the call.
    pub fn take(self) -> isize {
        match self.class().find_method(&TAKE) {
            Some(take) => take(self),
            None => take_reference(self),
        }
    }

    /// Drops a reference through the class's `RELEASE` method. Returns the
    /// count before the call.
    ///
    /// # Safety
    ///
    /// The caller must own the reference it drops, and must not use it
    /// afterwards. Prefer [`delete`](super::lifecycle::delete), which also
    /// destroys the object when the last reference goes.
    pub unsafe fn release(self) -> isize {
        match self.class().find_method(&RELEASE) {
            Some(release) => release(self),
            None => release_reference(self),
        }
    }

    /// The current count.
    #[inline]
    pub fn refs(self) -> isize {
        self.get().refs()
    }
}

fn take_reference(this: ObjRef<'_, RefCounted>) -> isize {
    this.get().refs.fetch_add(1, Ordering::AcqRel)
}

fn release_reference(this: ObjRef<'_, RefCounted>) -> isize {
    this.get().refs.fetch_sub(1, Ordering::AcqRel)
}

fn construct(site: Site<'_, RefCounted>, _: &()) -> crate::Result<Built<RefCounted>> {
    let base = site.object();
    Ok(site.build(RefCounted::new(base)))
}

// SAFETY: `RefCounted` is `repr(C)` and starts with its parent, `Object`.
unsafe impl Instance for RefCounted {
    type Parent = Object;
    type Params = ();
    const NAME: &'static str = "RefCounted";

    fn define(class: &mut ClassBuilder<Self>) {
        class
            .constructor(construct)
            .method(&TAKE, take_reference as fn(ObjRef<'_, RefCounted>) -> isize)
            .method(&RELEASE, release_reference as fn(ObjRef<'_, RefCounted>) -> isize);
    }
}

crate::extends!(RefCounted: Object);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::lifecycle::{construct, delete};

    #[test]
    fn test_counts_from_zero() {
        let counted = construct::<RefCounted>(&()).unwrap();
        assert_eq!(counted.as_ref().refs(), 0);
        assert_eq!(counted.as_ref().take(), 0);
        assert_eq!(counted.as_ref().take(), 1);
        assert_eq!(counted.as_ref().refs(), 2);

        let second = counted.share().unwrap();
        assert_eq!(counted.as_ref().refs(), 3);
        assert!(!delete(second).unwrap());
        assert!(!delete(counted.share().unwrap()).unwrap());
        // SAFETY: this handle owns one of the two remaining references.
        assert_eq!(unsafe { counted.as_ref().release() }, 2);
        assert!(delete(counted).unwrap());
    }

    #[test]
    fn test_share_requires_an_owner() {
        let result = crate::exception::Try::run(|| {
            let counted = construct::<RefCounted>(&())?;
            let shared = counted.share();
            counted.as_ref().take();
            assert!(delete(counted)?);
            shared.map(|_| ())
        })
        .catch_all(|exception| {
            assert_eq!(
                exception.message(),
                "RefCounted object has no owner to share it with."
            );
            Ok(())
        })
        .end();
        assert!(result.is_ok());
    }
}
