#![deny(
    missing_docs,
    clippy::missing_safety_doc,
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    clippy::as_ptr_cast_mut,
    clippy::ptr_as_ptr,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    unused_doc_comments
)]
// Make docs.rs generate better docs
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Structured exceptions and a single-inheritance object model.
//!
//! ## Overview
//!
//! This crate provides two things that work together:
//!
//! - An **exception engine**: protected regions with catch clauses and a
//!   finally step, numeric exception codes, rethrow, uncatchable exceptions,
//!   and a per-thread trace recording where an exception came from and how
//!   it travelled.
//! - An **object model**: classes with a single parent, method tables with
//!   overriding and abstract methods, constructors and destructors whose
//!   failures are exceptions, reference-counted objects, and run-time type
//!   information.
//!
//! ## Quick Example
//!
//! ```
//! use vtry::prelude::*;
//!
//! fn parse_quantity(text: &str) -> vtry::Result<u32> {
//!     let Ok(quantity) = text.parse::<u32>() else {
//!         throw!(22, "not a quantity: {text:?}");
//!     };
//!     thrif!(quantity > 100, "too many");
//!     Ok(quantity)
//! }
//!
//! let quantity = Try::run(|| parse_quantity("a dozen"))
//!     .catch(22, |exception| {
//!         eprintln!("{}", exception.message());
//!         Ok(12)
//!     })
//!     .end();
//! assert_eq!(quantity.ok(), Some(12));
//! ```
//!
//! ## Exceptions
//!
//! A failure is a [`Thrown`](exception::Thrown) value returned with `?`
//! through ordinary [`Result`]s until it reaches a
//! [`Try`](exception::Try) region. The details (codes, messages, source
//! locations, optional payloads) live in a thread-local trace that catch
//! clauses can inspect. An exception that leaves the outermost region ends
//! the process through the installed
//! [termination handler](hooks::termination::TerminationHandler), with an
//! exit status derived from its code. See the [`exception`] module.
//!
//! ## Objects
//!
//! A class is a `#[repr(C)]` struct that starts with its parent and
//! implements [`Instance`](class::Instance). Its [`Class`](class::Class)
//! descriptor is built on first use and holds the method table. Objects are
//! created with [`construct`](object::lifecycle::construct) and destroyed
//! with [`delete`](object::lifecycle::delete). See the [`class`] and
//! [`object`] modules, and [`rtti`] for type queries.
//!
//! ## Configuration
//!
//! Lifecycle callbacks, the termination handler and the tag printed with
//! uncaught exceptions are installed process-wide through
//! [`Hooks`](hooks::Hooks).
//!
//! ## Logging
//!
//! The engine emits [`tracing`] events: `trace` level for region steps,
//! `debug` for class registration and object lifecycle, `error` right before
//! the process is terminated.
//!
//! For implementation details, see the [`vtry-internals`] crate.
//!
//! [`vtry-internals`]: vtry_internals

#[macro_use]
mod macros;

pub mod class;
pub mod exception;
pub mod hooks;
pub mod object;
pub mod prelude;
pub mod rtti;

mod lock;

/// A [`Result`](core::result::Result) whose error is a thrown exception.
///
/// # Examples
///
/// ```
/// use vtry::throw;
///
/// fn might_fail(ok: bool) -> vtry::Result<&'static str> {
///     if !ok {
///         throw!(5, "not ok");
///     }
///     Ok("fine")
/// }
/// # assert_eq!(might_fail(true).ok(), Some("fine"));
/// ```
pub type Result<T> = core::result::Result<T, exception::Thrown>;

// Not public API. Referenced by macro-generated code.
#[doc(hidden)]
pub mod __private {
    #[doc(hidden)]
    pub use core::{format_args, result::Result::Err, stringify};
}
