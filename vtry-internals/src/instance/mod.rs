//! Type-erased instance storage.
//!
//! An instance is a `#[repr(C)]` value whose concrete type is only known at
//! the point where it is allocated. Everything that happens afterwards
//! (dropping the value, returning the block to the allocator) goes through the
//! [`InstanceVtable`] recorded at allocation time.
//!
//! - [`vtable`]: [`InstanceVtable`] with the layout and drop glue of one type
//! - [`raw`]: [`RawInstance`], the owned allocation
//!
//! [`InstanceVtable`]: vtable::InstanceVtable
//! [`RawInstance`]: raw::RawInstance

pub(crate) mod raw;
pub(crate) mod vtable;
