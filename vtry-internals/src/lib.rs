#![no_std]
#![forbid(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::missing_safety_doc,
    clippy::missing_docs_in_private_items,
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    unused_doc_comments
)]
#![allow(rustdoc::private_intra_doc_links)]
//! Internal implementation crate for [`vtry`].
//!
//! # Overview
//!
//! This crate owns the raw, type-erased storage behind `vtry` object
//! instances: allocating a zeroed block sized for the most-derived instance
//! type, and later running that type's drop glue and returning the block to
//! the allocator, without the caller knowing the concrete type.
//!
//! **This crate is an implementation detail.** No semantic versioning
//! guarantees are provided. Users should depend on the [`vtry`] crate, not
//! this one.
//!
//! # Architecture
//!
//! - [`InstanceVtable`]: per-type function pointers and layout, created as a
//!   `&'static` constant for every instance type
//! - [`RawInstance`]: an owned allocation paired with its vtable; it does not
//!   know whether its contents are initialized, so every operation that
//!   touches them is `unsafe`
//!
//! # Safety Strategy
//!
//! The vtable fields are module-private and are only ever filled in by
//! [`InstanceVtable::new`], which pairs the function pointers with one
//! concrete type at compile time. [`RawInstance`] keeps its pointer private
//! and only creates it through [`RawInstance::allocate_zeroed`] or
//! [`RawInstance::from_raw_parts`], so the allocation layout always matches
//! the vtable.
//!
//! [`vtry`]: https://docs.rs/vtry/latest/vtry/

extern crate alloc;

mod instance;
mod util;

pub use self::instance::{raw::RawInstance, vtable::InstanceVtable};
