//! Commonly used items for convenient importing.
//!
//! ```rust
//! use vtry::prelude::*;
//!
//! fn halve(n: i32) -> vtry::Result<i32> {
//!     thrif!(n % 2 != 0, "{n} is odd");
//!     Ok(n / 2)
//! }
//!
//! let half = Try::run(|| halve(7)).catch_all(|_| Ok(0)).end();
//! assert_eq!(half.ok(), Some(0));
//! ```
//!
//! # What's Included
//!
//! - **[`Try`]**, **[`throw!`]**, **[`rethrow!`]** and **[`thrif!`]**: raising
//!   and handling exceptions
//! - **[`Instance`]**, **[`ClassBuilder`]**, **[`Method`]** and
//!   **[`extends!`]**: defining classes
//! - **[`Obj`]**, **[`ObjRef`]**, **[`ObjMut`]**, **[`Object`]** and
//!   **[`RefCounted`]**: working with objects
//! - **[`construct`]**, **[`delete`]** and **[`with_local`]**: object
//!   lifecycle

pub use crate::{
    class::{ClassBuilder, Extends, Instance, Method, class_of},
    exception::{Exception, TraceEntry, Try},
    extends,
    object::{
        Obj, ObjMut, ObjRef, Object, RefCounted,
        lifecycle::{Built, Site, construct, delete, with_local},
    },
    rethrow, thrif, throw,
};
