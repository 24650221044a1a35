//! Vtable for type-erased instance storage.
//!
//! This module encapsulates the fields of [`InstanceVtable`] so they cannot be
//! set directly. That visibility restriction guarantees the safety invariant:
//! **the layout and drop glue always belong to the same type `T`**.
//!
//! # Safety Invariant
//!
//! Vtables are only created as `&'static` references via
//! [`InstanceVtable::new`], which fills every field from a single type
//! parameter at compile time.

use core::{alloc::Layout, any::TypeId, ptr::NonNull};

use crate::util::Erased;

/// Layout and drop glue for one instance type.
///
/// # Safety Invariant
///
/// The `layout` field is `Layout::new::<T>()` and the `drop` field points to
/// `drop_value::<T>` for the `T` that was used to create this vtable.
pub struct InstanceVtable {
    /// Gets the [`TypeId`] of the instance type.
    type_id: fn() -> TypeId,
    /// Gets the [`core::any::type_name`] of the instance type.
    type_name: fn() -> &'static str,
    /// The memory layout of the instance type.
    layout: Layout,
    /// Runs the drop glue of the value pointed to, in place.
    drop: unsafe fn(NonNull<Erased>),
}

impl InstanceVtable {
    /// Creates the [`InstanceVtable`] for the instance type `T`.
    ///
    /// Repeated calls with the same `T` return the same static.
    pub const fn new<T: 'static>() -> &'static Self {
        const {
            &Self {
                type_id: TypeId::of::<T>,
                type_name: core::any::type_name::<T>,
                layout: Layout::new::<T>(),
                drop: drop_value::<T>,
            }
        }
    }

    /// Gets the [`TypeId`] of the instance type.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        (self.type_id)()
    }

    /// Gets the [`core::any::type_name`] of the instance type.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        (self.type_name)()
    }

    /// Gets the memory layout of the instance type.
    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Runs the drop glue of the instance type on the pointed-to value.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The pointer points to an initialized value of the type this vtable
    ///    was created for.
    /// 2. The value is not used again after this call, other than to release
    ///    its memory.
    #[inline]
    pub(crate) unsafe fn drop(&self, ptr: NonNull<Erased>) {
        // SAFETY: `self.drop` points to `drop_value::<T>` for the `T` of this
        // vtable. Its safety requirements are upheld:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        unsafe { (self.drop)(ptr) }
    }
}

impl core::fmt::Debug for InstanceVtable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InstanceVtable")
            .field("type_name", &self.type_name())
            .field("layout", &self.layout)
            .finish()
    }
}

/// Drops the `T` pointed to by this pointer, in place.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. The pointer points to an initialized `T`.
/// 2. The value is not used again after this call.
unsafe fn drop_value<T: 'static>(ptr: NonNull<Erased>) {
    let ptr: NonNull<T> = ptr.cast::<T>();
    // SAFETY:
    // 1. Guaranteed by the caller
    // 2. Guaranteed by the caller
    unsafe { ptr.drop_in_place() }
}
