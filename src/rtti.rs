//! Run-time type information: membership tests, checked casts and ancestry
//! listings.
//!
//! ```rust
//! use vtry::{class::class_of, object::RefCounted, rtti};
//!
//! let class = class_of::<RefCounted>();
//! assert_eq!(rtti::join_chain(class, " > ", true), "Object > RefCounted");
//! assert_eq!(rtti::count_ancestors(class), 1);
//! ```

use crate::{
    class::{Class, Instance},
    object::ObjRef,
};

/// Most classes [`chain_list`] returns.
pub const MAX_CHAIN: usize = 64;

/// Length budget of [`join_chain`]'s output, before the `...` marker.
pub const MAX_JOINED_CHAIN: usize = 1000;

/// Whether `object` is an instance of `class` or of a descendant.
pub fn has_class<T: Instance>(object: ObjRef<'_, T>, class: &Class) -> bool {
    object.class().extends(class)
}

/// Views `object` as a `U`, throwing
/// `"Object of class X cannot be cast to Y."` when it is not one.
#[track_caller]
pub fn class_cast<T: Instance, U: Instance>(object: ObjRef<'_, T>) -> crate::Result<ObjRef<'_, U>> {
    object.cast()
}

/// `class` and its ancestors, closest first, at most `max` of them (and never
/// more than [`MAX_CHAIN`]).
pub fn chain_list(class: &'static Class, max: usize) -> Vec<&'static Class> {
    class.chain().take(max.min(MAX_CHAIN)).collect()
}

/// The names of `class` and its ancestors joined with `joiner`, root first
/// when `parent_first` is set.
///
/// Output stops with `...` before it would exceed [`MAX_JOINED_CHAIN`]
/// characters.
pub fn join_chain(class: &'static Class, joiner: &str, parent_first: bool) -> String {
    let mut chain = chain_list(class, MAX_CHAIN);
    if parent_first {
        chain.reverse();
    }

    let mut joined = String::new();
    let mut separator = "";
    for name in chain.iter().map(|class| class.name()) {
        if separator.len() + joined.len() + name.len() >= MAX_JOINED_CHAIN {
            joined.push_str("...");
            break;
        }
        joined.push_str(separator);
        joined.push_str(name);
        separator = joiner;
    }
    joined
}

/// Number of ancestors of `class`. The root has none.
#[inline]
pub fn count_ancestors(class: &Class) -> usize {
    class.depth()
}

/// The ancestor `n` levels below the root: 0 is the root and
/// `count_ancestors(class)` is `class` itself. Beyond that there is none.
#[inline]
pub fn nth_ancestor(class: &'static Class, n: usize) -> Option<&'static Class> {
    class.ancestor(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        class::class_of,
        object::{Object, RefCounted},
    };

    #[test]
    fn test_root_chain() {
        let object = class_of::<Object>();
        assert_eq!(count_ancestors(object), 0);
        assert_eq!(join_chain(object, ", ", false), "Object");
        assert!(nth_ancestor(object, 0).is_some_and(|class| class == object));
        assert!(nth_ancestor(object, 1).is_none());
        assert_eq!(object.parent(), object);
    }

    #[test]
    fn test_chain_order() {
        let counted = class_of::<RefCounted>();
        let names: Vec<_> = chain_list(counted, 10).iter().map(|class| class.name()).collect();
        assert_eq!(names, ["RefCounted", "Object"]);
        assert_eq!(chain_list(counted, 1).len(), 1);
        assert_eq!(join_chain(counted, "<-", false), "RefCounted<-Object");
        assert_eq!(
            nth_ancestor(counted, 0).map(Class::name),
            Some("Object")
        );
    }

    #[test]
    fn test_membership() {
        let object = class_of::<Object>();
        let counted = class_of::<RefCounted>();
        assert!(counted.extends(object));
        assert!(!object.extends(counted));
        assert!(counted.is_ref_counted());
        assert!(!object.is_ref_counted());
    }
}
