//! Method keys, type-erased implementations and inherited-method resolution.

use core::{any::Any, fmt, marker::PhantomData, ptr};

use triomphe::Arc;
use unsize::CoerceUnsize;

use super::{Class, ClassId, builder::Slot};
use crate::exception::GENERIC_CODE;

/// A method selector.
///
/// Declare one `static` per method; its address is its identity, and `F` is
/// the signature every implementation of it has, usually a `fn` pointer whose
/// first argument is the receiver:
///
/// ```rust
/// use vtry::{class::Method, object::{ObjRef, Object}};
///
/// pub static DESCRIBE: Method<fn(ObjRef<'_, Object>) -> vtry::Result<String>> =
///     Method::new("describe");
/// ```
pub struct Method<F> {
    name: &'static str,
    _signature: PhantomData<F>,
}

impl<F> Method<F> {
    /// Creates a selector. `name` is only used in diagnostics.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _signature: PhantomData,
        }
    }

    /// The diagnostic name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub(crate) fn id(&'static self) -> usize {
        ptr::from_ref(self).addr()
    }
}

impl<F> fmt::Debug for Method<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("signature", &core::any::type_name::<F>())
            .finish()
    }
}

pub(crate) trait ErasedMethod: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

impl<F: Any + Send + Sync> ErasedMethod for F {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A shared, type-erased method implementation. Subclasses copy their
/// parent's slots, so the same implementation is referenced many times.
pub(crate) type Implementation = Arc<dyn ErasedMethod>;

pub(crate) fn erase<F: Any + Send + Sync>(implementation: F) -> Implementation {
    Arc::new(implementation).unsize(unsize::Coercion!(to dyn ErasedMethod))
}

pub(crate) fn downcast<F: Copy + 'static>(implementation: &Implementation) -> Option<F> {
    <dyn ErasedMethod as ErasedMethod>::as_any(&**implementation)
        .downcast_ref::<F>()
        .copied()
}

/// The outcome of looking up the next implementation of a method above a
/// given class.
#[derive(Clone, Copy, Debug)]
pub enum Resolution {
    /// A class further up implements the method.
    Found {
        /// The class that supplied the implementation.
        class: &'static Class,
        /// The slot, as that class defines it.
        slot: &'static Slot,
    },
    /// No class further up supplies the method. An abstract declaration
    /// further up ends the walk the same way.
    Exhausted,
}

/// The typed counterpart of [`Resolution`], as returned by
/// [`Class::inherited`].
#[derive(Clone, Copy, Debug)]
pub enum Inherited<F> {
    /// A class further up implements the method.
    Implemented {
        /// The class that supplied the implementation.
        class: &'static Class,
        /// The implementation.
        method: F,
    },
    /// No class further up supplies the method.
    Exhausted,
}

impl<F: Copy> Inherited<F> {
    /// The implementation, if one was found.
    pub fn implementation(&self) -> Option<F> {
        match self {
            Self::Implemented { method, .. } => Some(*method),
            Self::Exhausted => None,
        }
    }
}

/// The class that declared a method abstract or supplied its first
/// implementation, as returned by [`base_method`].
#[derive(Clone, Copy, Debug)]
pub struct BaseMethod {
    /// The class at the base of the method's override chain.
    pub class: &'static Class,
    /// The slot, as that class defines it.
    pub slot: &'static Slot,
}

/// Finds the implementation of `key` that `current` overrides, as seen from
/// an instance of `class`.
///
/// The ancestry of `class` is walked from `class` toward the root. Entries up
/// to and including the first one tagged with `current` are skipped; the
/// first entry after that with a different tag decides the outcome. When
/// that entry is an abstract declaration the result is
/// [`Resolution::Exhausted`].
///
/// Throws when `class` has no slot for `key`, or when `current` never
/// supplied the slot in `class`'s ancestry.
#[track_caller]
pub fn resolve<F>(
    class: &'static Class,
    key: &'static Method<F>,
    current: &Class,
) -> crate::Result<Resolution> {
    let Some(index) = class.slot_index(key) else {
        crate::throw!(
            GENERIC_CODE,
            "{} has no method {}.",
            class.name(),
            key.name()
        );
    };
    match next_up(class, index, current.id()) {
        Some(Some(next)) if !next.slot.is_abstract() => Ok(Resolution::Found {
            class: next.class,
            slot: next.slot,
        }),
        Some(_) => Ok(Resolution::Exhausted),
        None => crate::throw!(
            GENERIC_CODE,
            "{} does not define {} for {}.",
            current.name(),
            key.name(),
            class.name()
        ),
    }
}

/// The slot `current`'s version overrides, abstract or not. `None` when
/// `current` is never seen, `Some(None)` when nothing is further up.
fn next_up(class: &'static Class, index: usize, current: ClassId) -> Option<Option<BaseMethod>> {
    let mut seen = false;
    for ancestor in class.chain() {
        let Some(slot) = ancestor.slots.get(index) else {
            break;
        };
        if !seen {
            seen = slot.defined_by() == current;
            continue;
        }
        if slot.defined_by() == current {
            continue;
        }

        let owner = class.ancestor(slot.defining_depth()).unwrap_or(ancestor);
        let slot = owner.slots.get(index).unwrap_or(slot);
        return Some(Some(BaseMethod { class: owner, slot }));
    }
    seen.then_some(None)
}

/// Follows the override chain of `key` from `class` to its base: the class
/// that declared the method abstract, or the topmost one implementing it.
#[track_caller]
pub fn base_method<F>(class: &'static Class, key: &'static Method<F>) -> crate::Result<BaseMethod> {
    let Some(index) = class.slot_index(key) else {
        crate::throw!(
            GENERIC_CODE,
            "{} has no method {}.",
            class.name(),
            key.name()
        );
    };

    let mut base = BaseMethod {
        class,
        slot: &class.slots[index],
    };
    if let Some(owner) = class.ancestor(base.slot.defining_depth()) {
        base.class = owner;
    }

    while let Some(Some(next)) = next_up(class, index, base.class.id()) {
        base = next;
        if base.slot.is_abstract() {
            break;
        }
    }
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    static PLAIN: Method<fn() -> i32> = Method::new("plain");
    static OTHER: Method<fn() -> i32> = Method::new("plain");

    fn seven() -> i32 {
        7
    }

    #[test]
    fn test_method_identity_is_address() {
        assert_ne!(PLAIN.id(), OTHER.id());
        assert_eq!(PLAIN.id(), PLAIN.id());
        assert_eq!(PLAIN.name(), OTHER.name());
    }

    #[test]
    fn test_erased_round_trip() {
        let erased = erase::<fn() -> i32>(seven);
        let method = downcast::<fn() -> i32>(&erased).unwrap();
        assert_eq!(method(), 7);
        assert!(downcast::<fn() -> u8>(&erased).is_none());
    }
}
