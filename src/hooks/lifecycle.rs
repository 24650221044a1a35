//! Object lifecycle callbacks.
//!
//! A [`LifecycleHook`] is told about every heap object right after its
//! constructor built it and right before its destructor runs. Plain closures
//! work as hooks:
//!
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use vtry::hooks::{Hooks, lifecycle::LifecycleEvent};
//!
//! static SEEN: AtomicUsize = AtomicUsize::new(0);
//!
//! Hooks::new()
//!     .on_create(|_: &LifecycleEvent<'_>| {
//!         SEEN.fetch_add(1, Ordering::Relaxed);
//!     })
//!     .install()
//!     .expect("failed to install hooks");
//! ```

use std::panic::Location;

use crate::object::{Object, ObjRef};

/// The point in an object's life a [`LifecycleEvent`] reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// The constructor has returned a freshly built instance.
    Created,
    /// The destructor is about to run.
    Destroying,
}

/// One lifecycle notification.
#[derive(Clone, Copy, Debug)]
pub struct LifecycleEvent<'a> {
    stage: Stage,
    object: ObjRef<'a, Object>,
    location: &'static Location<'static>,
}

impl<'a> LifecycleEvent<'a> {
    pub(crate) fn new(
        stage: Stage,
        object: ObjRef<'a, Object>,
        location: &'static Location<'static>,
    ) -> Self {
        Self {
            stage,
            object,
            location,
        }
    }

    /// Which point in the object's life this is.
    #[inline]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The object, viewed through its root header.
    #[inline]
    pub fn object(&self) -> ObjRef<'a, Object> {
        self.object
    }

    /// Where the construction or deletion was requested.
    #[inline]
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }
}

/// A callback told about object construction or destruction.
///
/// Hooks may run concurrently on several threads and must not throw.
pub trait LifecycleHook: 'static + Send + Sync {
    /// Called once per event.
    fn on_event(&self, event: &LifecycleEvent<'_>);
}

impl<F> LifecycleHook for F
where
    F: Fn(&LifecycleEvent<'_>) + Send + Sync + 'static,
{
    fn on_event(&self, event: &LifecycleEvent<'_>) {
        self(event)
    }
}
