//! How the process ends.
//!
//! When an exception escapes the outermost region of its thread, or the
//! engine detects misuse, it builds a [`Termination`] and hands it to the
//! installed [`TerminationHandler`]. The handler must not return.
//!
//! [`DefaultTermination`] writes the report to standard error and exits with
//! [`Termination::exit_status`]. Tests typically install a handler that
//! panics instead, so the outcome can be observed with
//! [`std::panic::catch_unwind`]:
//!
//! ```rust
//! use vtry::{exception::Termination, hooks::termination::TerminationHandler};
//!
//! struct PanicWithStatus;
//!
//! impl TerminationHandler for PanicWithStatus {
//!     fn terminate(&self, termination: &Termination) -> ! {
//!         std::panic::panic_any(termination.exit_status())
//!     }
//! }
//! ```

use crate::exception::Termination;

/// Decides how the process ends. See the [module docs](self).
pub trait TerminationHandler: 'static + Send + Sync {
    /// Ends the process, or at least never returns to the engine.
    fn terminate(&self, termination: &Termination) -> !;
}

/// Prints the report to standard error, then exits the process with the
/// termination's exit status.
#[derive(Copy, Clone, Debug, Default)]
pub struct DefaultTermination;

impl TerminationHandler for DefaultTermination {
    fn terminate(&self, termination: &Termination) -> ! {
        eprintln!("{termination}");
        std::process::exit(termination.exit_status())
    }
}
