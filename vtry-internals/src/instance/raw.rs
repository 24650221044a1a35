//! Owned, type-erased instance allocation.
//!
//! This module encapsulates the fields of [`RawInstance`], ensuring they are
//! only visible within this module. This visibility restriction guarantees the
//! safety invariant: **the pointer always refers to a live block allocated with
//! the layout of the paired vtable**.
//!
//! # Initialization State
//!
//! Unlike a `Box`, a [`RawInstance`] does not track whether its block holds an
//! initialized value. The block starts zeroed and uninitialized; the owner
//! writes a value into it, and finally either [`dispose`]s it (drop glue plus
//! deallocation) or [`deallocate`]s it (deallocation only, when the value was
//! never written or was already dropped). There is no `Drop` implementation:
//! the owner always decides which of the two applies.
//!
//! [`dispose`]: RawInstance::dispose
//! [`deallocate`]: RawInstance::deallocate

use alloc::alloc::{alloc_zeroed, dealloc};
use core::ptr::NonNull;

use crate::{InstanceVtable, util::Erased};

/// An owned block of memory sized and aligned for the type described by its
/// [`InstanceVtable`].
#[must_use = "a RawInstance leaks its memory unless it is disposed or deallocated"]
pub struct RawInstance {
    /// Pointer to the block.
    ///
    /// # Safety
    ///
    /// The following safety invariants are guaranteed to be upheld as long as
    /// this struct exists:
    ///
    /// 1. The pointer was returned by the global allocator for
    ///    `vtable.layout()`, or is a dangling aligned pointer when that layout
    ///    has size zero.
    /// 2. The block has not been deallocated.
    ptr: NonNull<Erased>,
    /// The vtable describing the type the block was allocated for.
    vtable: &'static InstanceVtable,
}

// SAFETY: A `RawInstance` is a uniquely owned pointer to memory; which thread
// owns it has no bearing on the validity of the allocation.
unsafe impl Send for RawInstance {}

impl RawInstance {
    /// Allocates a zeroed block for the type described by `vtable`.
    ///
    /// Returns `None` if the allocator fails.
    pub fn allocate_zeroed(vtable: &'static InstanceVtable) -> Option<Self> {
        let layout = vtable.layout();
        let ptr = if layout.size() == 0 {
            NonNull::new(core::ptr::without_provenance_mut::<u8>(layout.align()))?
        } else {
            // SAFETY: The layout has a non-zero size.
            NonNull::new(unsafe { alloc_zeroed(layout) })?
        };

        Some(Self {
            ptr: ptr.cast::<Erased>(),
            vtable,
        })
    }

    /// Reassembles a [`RawInstance`] from a pointer previously obtained with
    /// [`RawInstance::into_raw`] and the same vtable.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `ptr` was returned by [`RawInstance::into_raw`] on an instance whose
    ///    vtable is `vtable`.
    /// 2. No other [`RawInstance`] currently owns the same block.
    #[inline]
    pub unsafe fn from_raw_parts<T>(ptr: NonNull<T>, vtable: &'static InstanceVtable) -> Self {
        Self {
            ptr: ptr.cast::<Erased>(),
            vtable,
        }
    }

    /// Gives up ownership of the block, returning a pointer typed as `T`.
    ///
    /// The pointer keeps full provenance over the block, so it may be used to
    /// reach any part of the most-derived value even when `T` is a prefix of
    /// it.
    #[inline]
    pub fn into_raw<T>(self) -> NonNull<T> {
        self.ptr.cast::<T>()
    }

    /// Returns a pointer to the block typed as `T`, without giving up
    /// ownership.
    #[inline]
    pub fn as_ptr<T>(&self) -> NonNull<T> {
        self.ptr.cast::<T>()
    }

    /// Returns the vtable the block was allocated for.
    #[inline]
    pub fn vtable(&self) -> &'static InstanceVtable {
        self.vtable
    }

    /// Returns the block to the allocator without running any drop glue.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. No pointer derived from this block is used after this call.
    #[inline]
    pub unsafe fn deallocate(self) {
        let layout = self.vtable.layout();
        if layout.size() != 0 {
            // SAFETY: By the invariants of this type, the block was allocated by
            // the global allocator with exactly this layout and has not been
            // deallocated yet. The caller guarantees no further use.
            unsafe { dealloc(self.ptr.cast::<u8>().as_ptr(), layout) }
        }
    }

    /// Runs the drop glue of the value stored in the block, then returns the
    /// block to the allocator.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The block holds an initialized value of the type described by the
    ///    vtable.
    /// 2. No pointer derived from this block is used after this call.
    #[inline]
    pub unsafe fn dispose(self) {
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. The value is never used again; the block is deallocated below.
        unsafe { self.vtable.drop(self.ptr) }
        // SAFETY:
        // 1. Guaranteed by the caller
        unsafe { self.deallocate() }
    }
}

impl core::fmt::Debug for RawInstance {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RawInstance")
            .field("ptr", &self.ptr)
            .field("type_name", &self.vtable.type_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;

    use super::*;

    #[test]
    fn test_allocate_zeroed() {
        let raw = RawInstance::allocate_zeroed(InstanceVtable::new::<[u32; 4]>()).unwrap();
        // SAFETY: The block is zeroed, which is a valid `[u32; 4]`.
        let value = unsafe { raw.as_ptr::<[u32; 4]>().read() };
        assert_eq!(value, [0; 4]);
        // SAFETY: Nothing derived from the block is used afterwards.
        unsafe { raw.deallocate() };
    }

    #[test]
    fn test_dispose_runs_drop_glue() {
        let raw = RawInstance::allocate_zeroed(InstanceVtable::new::<String>()).unwrap();
        // SAFETY: The block is sized and aligned for a `String`.
        unsafe { raw.as_ptr::<String>().write(String::from("held")) };
        // SAFETY: The block holds an initialized `String`, unused afterwards.
        unsafe { raw.dispose() };
    }

    #[test]
    fn test_into_raw_round_trip() {
        let raw = RawInstance::allocate_zeroed(InstanceVtable::new::<u64>()).unwrap();
        let vtable = raw.vtable();
        let ptr = raw.into_raw::<u64>();
        // SAFETY: `ptr` came from `into_raw` with the same vtable.
        let raw = unsafe { RawInstance::from_raw_parts(ptr, vtable) };
        // SAFETY: Nothing derived from the block is used afterwards.
        unsafe { raw.deallocate() };
    }

    #[test]
    fn test_zero_sized() {
        let raw = RawInstance::allocate_zeroed(InstanceVtable::new::<()>()).unwrap();
        // SAFETY: Zero-sized blocks are never handed to the allocator.
        unsafe { raw.dispose() };
    }
}
