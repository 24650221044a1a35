//! Class descriptors.
//!
//! Every type implementing [`Instance`] gets one [`Class`] descriptor,
//! registered on first use and shared for the rest of the process. The
//! descriptor holds the class's position in the single-inheritance hierarchy,
//! its constructor, and its method table: an ordered list of [`Slot`]s
//! extending the parent's table.
//!
//! ```rust
//! use vtry::{
//!     class::{ClassBuilder, Instance, Method, class_of},
//!     extends,
//!     object::{ObjRef, Object, lifecycle::{Built, Site}},
//! };
//!
//! #[repr(C)]
//! pub struct Counter {
//!     base: Object,
//!     start: u32,
//! }
//!
//! pub static START: Method<fn(ObjRef<'_, Counter>) -> u32> = Method::new("start");
//!
//! fn construct(site: Site<'_, Counter>, start: &u32) -> vtry::Result<Built<Counter>> {
//!     let base = site.object();
//!     Ok(site.build(Counter { base, start: *start }))
//! }
//!
//! // SAFETY: `Counter` is `repr(C)` and starts with its parent.
//! unsafe impl Instance for Counter {
//!     type Parent = Object;
//!     type Params = u32;
//!     const NAME: &'static str = "Counter";
//!
//!     fn define(class: &mut ClassBuilder<Self>) {
//!         class
//!             .constructor(construct)
//!             .method(&START, |this: ObjRef<'_, Counter>| this.start);
//!     }
//! }
//! extends!(Counter: Object);
//!
//! let class = class_of::<Counter>();
//! assert_eq!(class.name(), "Counter");
//! assert_eq!(class.parent().name(), "Object");
//! ```

mod builder;
mod method;
mod registry;

use core::{any::TypeId, fmt};

use vtry_internals::InstanceVtable;

pub use self::{
    builder::{ClassBuilder, Constructor, Slot},
    method::{BaseMethod, Inherited, Method, Resolution, base_method, resolve},
    registry::class_of,
};
use self::method::{Implementation, downcast};
use crate::{
    exception::GENERIC_CODE,
    object::{DESTROY, Destructor, RefCounted},
};

/// Identifies a registered class. Ids are assigned in registration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u32);

impl ClassId {
    /// The numeric value.
    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A type usable as a class.
///
/// # Safety
///
/// Implementors must ensure:
///
/// 1. The type is `#[repr(C)]` and its first field is a value of
///    `Self::Parent`, so a pointer to `Self` is a valid pointer to every
///    ancestor.
/// 2. `Parent` is `Self` only for [`Object`](crate::object::Object), the
///    root of the hierarchy.
pub unsafe trait Instance: Sized + Send + Sync + 'static {
    /// The direct superclass.
    type Parent: Instance;

    /// What the constructor takes.
    type Params: ?Sized + 'static;

    /// The class name used in diagnostics.
    const NAME: &'static str;

    /// Adds the constructor, new methods and overrides. The builder already
    /// holds everything inherited from `Parent`.
    fn define(class: &mut ClassBuilder<Self>) {
        let _ = class;
    }
}

/// Marks `Self` as a descendant of `A`, allowing free upcasts.
///
/// Every class extends itself. Further relations are declared with
/// [`extends!`](crate::extends), which checks them at compile time.
///
/// # Safety
///
/// `A` must be `Self` or one of its ancestors.
pub unsafe trait Extends<A: Instance>: Instance {}

// SAFETY: a class is trivially its own ancestor.
unsafe impl<T: Instance> Extends<T> for T {}

/// The descriptor of a registered class.
pub struct Class {
    id: ClassId,
    name: &'static str,
    type_id: TypeId,
    parent: Option<&'static Class>,
    ancestors: Box<[&'static Class]>,
    vtable: &'static InstanceVtable,
    constructor: Option<Implementation>,
    slots: Box<[Slot]>,
}

impl Class {
    /// The registration id.
    #[inline]
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// The class name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The [`TypeId`] of the instance type.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The direct superclass. The root class is its own parent.
    #[inline]
    pub fn parent(&'static self) -> &'static Class {
        self.parent.unwrap_or(self)
    }

    /// Whether this is the root of the hierarchy.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Number of ancestors. The root has depth 0.
    #[inline]
    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }

    /// The ancestor at `depth`, counting from the root; `depth()` is the class
    /// itself.
    pub fn ancestor(&'static self, depth: usize) -> Option<&'static Class> {
        match self.ancestors.get(depth) {
            Some(ancestor) => Some(*ancestor),
            None => (depth == self.depth()).then_some(self),
        }
    }

    /// The class and its ancestors, closest first.
    pub fn chain(&'static self) -> impl DoubleEndedIterator<Item = &'static Class> {
        core::iter::once(self).chain(self.ancestors.iter().rev().copied())
    }

    /// Whether this class is `other` or descends from it.
    pub fn extends(&self, other: &Class) -> bool {
        other.id == self.id
            || self
                .ancestors
                .get(other.depth())
                .is_some_and(|ancestor| ancestor.id == other.id)
    }

    /// Whether instances are reference counted.
    pub fn is_ref_counted(&self) -> bool {
        self.extends(class_of::<RefCounted>())
    }

    /// Whether the class has no constructor.
    #[inline]
    pub fn is_abstract(&self) -> bool {
        self.constructor.is_none()
    }

    /// The size of an instance in bytes.
    #[inline]
    pub fn instance_size(&self) -> usize {
        self.vtable.layout().size()
    }

    /// The method table, inherited slots first.
    #[inline]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// The slot of `key`, if the class has one.
    pub fn slot<F>(&self, key: &'static Method<F>) -> Option<&Slot> {
        self.slots.get(self.slot_index(key)?)
    }

    /// The implementation of `key`, or a thrown exception when the class has
    /// no such method or leaves it abstract.
    #[track_caller]
    pub fn method<F: Copy + 'static>(&self, key: &'static Method<F>) -> crate::Result<F> {
        let Some(slot) = self.slot(key) else {
            crate::throw!(
                GENERIC_CODE,
                "{} has no method {}.",
                self.name,
                key.name()
            );
        };
        match slot.implementation() {
            Some(implementation) => Ok(implementation),
            None => crate::throw!(
                GENERIC_CODE,
                "{}.{} is abstract.",
                self.name,
                key.name()
            ),
        }
    }

    /// Like [`method`](Self::method), without throwing.
    pub fn find_method<F: Copy + 'static>(&self, key: &'static Method<F>) -> Option<F> {
        self.slot(key)?.implementation()
    }

    /// The implementation of `key` that `current`'s version overrides. See
    /// [`resolve`].
    #[track_caller]
    pub fn inherited<F: Copy + 'static>(
        &'static self,
        key: &'static Method<F>,
        current: &Class,
    ) -> crate::Result<Inherited<F>> {
        Ok(match resolve(self, key, current)? {
            Resolution::Found { class, slot } => match slot.implementation() {
                Some(method) => Inherited::Implemented { class, method },
                None => Inherited::Exhausted,
            },
            Resolution::Exhausted => Inherited::Exhausted,
        })
    }

    pub(crate) fn slot_index<F>(&self, key: &'static Method<F>) -> Option<usize> {
        let key = key.id();
        self.slots.iter().position(|slot| slot.key() == key)
    }

    pub(crate) fn vtable(&self) -> &'static InstanceVtable {
        self.vtable
    }

    pub(crate) fn constructor<T: Instance>(&self) -> Option<Constructor<T>> {
        downcast(self.constructor.as_ref()?)
    }

    pub(crate) fn destructor(&self) -> Option<Destructor> {
        self.find_method(&DESTROY)
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Class {}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parent", &self.parent.map(Class::name))
            .field("abstract", &self.is_abstract())
            .field("slots", &self.slots)
            .finish()
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
