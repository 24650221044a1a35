//! Process-wide configuration: lifecycle callbacks, the termination handler
//! and the diagnostic tag.
//!
//! Everything is configured at once through the [`Hooks`] builder and then
//! installed globally:
//!
//! ```rust
//! use vtry::hooks::{Hooks, builtin_hooks::StderrLifecycle};
//!
//! Hooks::new()
//!     .on_create(StderrLifecycle)
//!     .on_destroy(StderrLifecycle)
//!     .tag("inventory-service 2.4")
//!     .install()
//!     .expect("failed to install hooks");
//! ```
//!
//! Without installed hooks, lifecycle callbacks do nothing, the tag is
//! `"vtry <version>"`, and termination uses [`DefaultTermination`].
//!
//! Hooks run on whatever thread triggers them. They must be thread-safe and
//! must not throw.
//!
//! [`DefaultTermination`]: termination::DefaultTermination

pub mod builtin_hooks;
pub mod lifecycle;
pub mod termination;

use std::{
    borrow::Cow,
    panic::Location,
    ptr::NonNull,
    sync::atomic::{AtomicPtr, Ordering},
};

use self::{
    lifecycle::{LifecycleEvent, LifecycleHook},
    termination::{DefaultTermination, TerminationHandler},
};
use crate::exception::Termination;

/// Builder for configuring and installing hooks globally.
///
/// # Hook Types
///
/// - [`on_create`](Self::on_create) - called after an object was constructed
/// - [`on_destroy`](Self::on_destroy) - called before an object is destroyed
/// - [`termination_handler`](Self::termination_handler) - decides how the
///   process ends on an uncaught exception or engine misuse
/// - [`tag`](Self::tag) - text printed with uncaught exception reports
#[derive(Debug)]
pub struct Hooks(Box<HookData>);

impl Default for Hooks {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct HookData {
    on_create: Option<Box<dyn LifecycleHook>>,
    on_destroy: Option<Box<dyn LifecycleHook>>,
    termination: Option<Box<dyn TerminationHandler>>,
    tag: Option<Cow<'static, str>>,
    created_at: &'static Location<'static>,
}

impl std::fmt::Debug for HookData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookData")
            .field("on_create", &self.on_create.is_some())
            .field("on_destroy", &self.on_destroy.is_some())
            .field("termination", &self.termination.is_some())
            .field("tag", &self.tag)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Error returned when attempting to install hooks when they're already
/// installed.
///
/// Contains the hooks that were attempted to be installed.
pub struct HooksAlreadyInstalledError(pub Hooks);

impl std::fmt::Debug for HooksAlreadyInstalledError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HooksAlreadyInstalledError").finish()
    }
}

impl std::fmt::Display for HooksAlreadyInstalledError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "hooks are already installed globally")
    }
}

impl core::error::Error for HooksAlreadyInstalledError {}

impl Hooks {
    /// Creates an empty `Hooks` builder.
    #[track_caller]
    pub fn new() -> Self {
        Self(Box::new(HookData {
            on_create: None,
            on_destroy: None,
            termination: None,
            tag: None,
            created_at: Location::caller(),
        }))
    }

    /// Sets the hook called after an object has been constructed.
    ///
    /// Only heap objects whose constructor built a fresh instance are
    /// reported; substituted and local objects are not.
    pub fn on_create<H: LifecycleHook>(mut self, hook: H) -> Self {
        self.0.on_create = Some(Box::new(hook));
        self
    }

    /// Sets the hook called right before an object's destructor runs.
    pub fn on_destroy<H: LifecycleHook>(mut self, hook: H) -> Self {
        self.0.on_destroy = Some(Box::new(hook));
        self
    }

    /// Sets the handler deciding how the process terminates.
    pub fn termination_handler<H: TerminationHandler>(mut self, handler: H) -> Self {
        self.0.termination = Some(Box::new(handler));
        self
    }

    /// Sets the tag printed with uncaught exception reports, typically a build
    /// identifier.
    pub fn tag(mut self, tag: impl Into<Cow<'static, str>>) -> Self {
        self.0.tag = Some(tag.into());
        self
    }

    /// Installs the hooks globally.
    ///
    /// If hooks are already installed, returns an error containing the hooks
    /// that were attempted to be installed. See also
    /// [`replace`](Self::replace).
    ///
    /// The memory for installed hooks is leaked and remains for the lifetime
    /// of the program, even if the hooks are later replaced.
    pub fn install(self) -> Result<(), HooksAlreadyInstalledError> {
        let boxed = Box::into_raw(self.0);

        // SAFETY:
        // 1. The pointer `boxed` is valid and was obtained from `Box::into_raw`.
        // 2. On success, the pointer will not be used anymore.
        // 3. On failure, the pointer remains owned by us.
        let install_result = unsafe { HOOKS.install(boxed) };

        match install_result {
            Ok(()) => Ok(()),
            Err(()) => {
                // SAFETY: The pointer was obtained from `Box::into_raw` above and,
                // since installation failed, it is still owned by us.
                let hooks = unsafe { Box::from_raw(boxed) };
                Err(HooksAlreadyInstalledError(Hooks(hooks)))
            }
        }
    }

    /// Replaces the currently installed hooks with `self`, returning the
    /// previous ones, if any.
    pub fn replace(self) -> Option<LeakedHooks> {
        self.leak().replace()
    }

    /// Leaks the hooks, returning a [`LeakedHooks`] handle that can be
    /// installed later, possibly several times.
    pub fn leak(self) -> LeakedHooks {
        LeakedHooks {
            hook_data: NonNull::from(Box::leak(self.0)),
        }
    }
}

/// A handle to hooks that have been leaked into static memory.
#[derive(Copy, Clone, Debug)]
pub struct LeakedHooks {
    /// # Safety
    ///
    /// 1. This pointer points to a valid `HookData` created by leaking a
    ///    `Box<HookData>`.
    /// 2. The `HookData` is never freed.
    hook_data: NonNull<HookData>,
}

// SAFETY: `LeakedHooks` is a shared pointer to immutable, never-freed data
// whose contents are `Send + Sync`.
unsafe impl Send for LeakedHooks {}
// SAFETY: See above.
unsafe impl Sync for LeakedHooks {}

impl LeakedHooks {
    /// Fetches the currently installed hooks, if any.
    pub fn fetch_current_hooks() -> Option<Self> {
        Some(Self {
            hook_data: HOOKS.fetch()?,
        })
    }

    /// Replaces the currently installed hooks with `self`, returning the
    /// previous ones, if any.
    pub fn replace(self) -> Option<LeakedHooks> {
        Some(Self {
            hook_data: HOOKS.replace(self.hook_data)?,
        })
    }
}

struct GlobalHooks {
    /// # Safety
    ///
    /// 1. This pointer is either null or points to a leaked, never-freed
    ///    `HookData`.
    /// 2. All writes use release semantics and all reads that dereference
    ///    use acquire semantics.
    ptr: AtomicPtr<HookData>,
}

impl GlobalHooks {
    const fn new() -> Self {
        Self {
            ptr: AtomicPtr::new(std::ptr::null_mut()),
        }
    }

    fn fetch(&self) -> Option<NonNull<HookData>> {
        NonNull::new(self.ptr.load(Ordering::Acquire))
    }

    /// Installs new hooks, returning an error if hooks are already installed.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The `new` pointer was obtained from `Box::into_raw`.
    /// 2. On success the function claims ownership of the `new` pointer, and it
    ///    cannot be used by the caller anymore.
    /// 3. On failure, the `new` pointer remains owned by the caller.
    unsafe fn install(&self, new: *mut HookData) -> Result<(), ()> {
        self.ptr
            .compare_exchange(
                std::ptr::null_mut(),
                new,
                Ordering::Release,
                Ordering::Relaxed,
            )
            .map(|_| ())
            .map_err(|_| ())
    }

    fn replace(&self, new: NonNull<HookData>) -> Option<NonNull<HookData>> {
        NonNull::new(self.ptr.swap(new.as_ptr(), Ordering::AcqRel))
    }
}

static HOOKS: GlobalHooks = GlobalHooks::new();

impl HookData {
    fn fetch() -> Option<&'static HookData> {
        let ptr = HOOKS.fetch()?;
        // SAFETY: Installed hook data is leaked and never freed, so the pointer
        // stays valid for the rest of the program.
        Some(unsafe { ptr.as_ref() })
    }
}

pub(crate) fn fire_create(event: &LifecycleEvent<'_>) {
    if let Some(hook) = HookData::fetch().and_then(|hooks| hooks.on_create.as_deref()) {
        hook.on_event(event);
    }
}

pub(crate) fn fire_destroy(event: &LifecycleEvent<'_>) {
    if let Some(hook) = HookData::fetch().and_then(|hooks| hooks.on_destroy.as_deref()) {
        hook.on_event(event);
    }
}

pub(crate) fn tag() -> String {
    match HookData::fetch().and_then(|hooks| hooks.tag.as_deref()) {
        Some(tag) => tag.to_owned(),
        None => concat!("vtry ", env!("CARGO_PKG_VERSION")).to_owned(),
    }
}

pub(crate) fn terminate(termination: &Termination) -> ! {
    match HookData::fetch().and_then(|hooks| hooks.termination.as_deref()) {
        Some(handler) => handler.terminate(termination),
        None => DefaultTermination.terminate(termination),
    }
}
