//! Built-in hooks provided by vtry.
//!
//! - [`StderrLifecycle`]: prints one line per lifecycle event to standard
//!   error, `  [++] Orange (src/main.rs:12)` on construction and `  [--]
//!   Orange (src/main.rs:30)` on destruction.
//!
//! Termination handlers live in [`termination`](crate::hooks::termination).

use crate::hooks::lifecycle::{LifecycleEvent, LifecycleHook, Stage};

/// Lifecycle hook that traces construction and destruction to standard error.
#[derive(Copy, Clone, Debug, Default)]
pub struct StderrLifecycle;

impl StderrLifecycle {
    fn render(event: &LifecycleEvent<'_>) -> String {
        let marker = match event.stage() {
            Stage::Created => "++",
            Stage::Destroying => "--",
        };
        format!(
            "  [{marker}] {} ({}:{})",
            event.object().class().name(),
            event.location().file(),
            event.location().line()
        )
    }
}

impl LifecycleHook for StderrLifecycle {
    fn on_event(&self, event: &LifecycleEvent<'_>) {
        eprintln!("{}", Self::render(event));
    }
}
