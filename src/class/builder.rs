use core::{any::Any, fmt, marker::PhantomData};

use super::{
    ClassId, Instance,
    method::{Implementation, Method, downcast, erase},
};
use crate::object::{
    DESTROY, Destructor,
    lifecycle::{Built, Site},
};

/// The constructor of a class: initializes the instance through `Site`, or
/// substitutes an existing instance.
pub type Constructor<T> = fn(Site<'_, T>, &<T as Instance>::Params) -> crate::Result<Built<T>>;

/// One entry of a class's method table.
#[derive(Clone)]
pub struct Slot {
    key: usize,
    name: &'static str,
    implementation: Option<Implementation>,
    defined_by: ClassId,
    defining_depth: usize,
}

impl Slot {
    /// The method's diagnostic name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the slot has no implementation.
    #[inline]
    pub fn is_abstract(&self) -> bool {
        self.implementation.is_none()
    }

    /// The class that last assigned this slot.
    #[inline]
    pub fn defined_by(&self) -> ClassId {
        self.defined_by
    }

    #[inline]
    pub(crate) fn defining_depth(&self) -> usize {
        self.defining_depth
    }

    #[inline]
    pub(crate) fn key(&self) -> usize {
        self.key
    }

    pub(crate) fn implementation<F: Copy + 'static>(&self) -> Option<F> {
        downcast(self.implementation.as_ref()?)
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("name", &self.name)
            .field("abstract", &self.is_abstract())
            .field("defined_by", &self.defined_by)
            .finish()
    }
}

/// Filled in by [`Instance::define`] while a class is registered.
///
/// The builder starts with a copy of the parent's method table and
/// constructor-less. Overriding a method replaces the copied slot; a new key
/// appends a slot.
pub struct ClassBuilder<T: Instance> {
    id: ClassId,
    depth: usize,
    pub(crate) slots: Vec<Slot>,
    pub(crate) constructor: Option<Implementation>,
    _class: PhantomData<fn() -> T>,
}

impl<T: Instance> ClassBuilder<T> {
    pub(crate) fn new(id: ClassId, depth: usize, slots: Vec<Slot>) -> Self {
        Self {
            id,
            depth,
            slots,
            constructor: None,
            _class: PhantomData,
        }
    }

    /// The id the class will be registered under.
    #[inline]
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// Makes the class instantiable. Classes without a constructor are
    /// abstract.
    pub fn constructor(&mut self, constructor: Constructor<T>) -> &mut Self {
        self.constructor = Some(erase(constructor));
        self
    }

    /// Implements `key`, overriding any inherited implementation.
    pub fn method<F>(&mut self, key: &'static Method<F>, implementation: F) -> &mut Self
    where
        F: Any + Copy + Send + Sync,
    {
        self.assign(key, Some(erase(implementation)))
    }

    /// Declares `key` without implementing it, or makes an inherited method
    /// abstract again.
    pub fn abstract_method<F>(&mut self, key: &'static Method<F>) -> &mut Self {
        self.assign(key, None)
    }

    /// Overrides the destructor. Implementations usually finish by calling
    /// [`destroy_inherited`](crate::object::destroy_inherited).
    pub fn destructor(&mut self, destructor: Destructor) -> &mut Self {
        self.method(&DESTROY, destructor)
    }

    fn assign<F>(&mut self, key: &'static Method<F>, implementation: Option<Implementation>) -> &mut Self {
        let slot = Slot {
            key: key.id(),
            name: key.name(),
            implementation,
            defined_by: self.id,
            defining_depth: self.depth,
        };
        match self.slots.iter_mut().find(|existing| existing.key == slot.key) {
            Some(existing) => *existing = slot,
            None => self.slots.push(slot),
        }
        self
    }
}

impl<T: Instance> fmt::Debug for ClassBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassBuilder")
            .field("class", &T::NAME)
            .field("id", &self.id)
            .field("slots", &self.slots)
            .field("constructor", &self.constructor.is_some())
            .finish()
    }
}
