//! Process termination: uncaught exceptions and internal misuse.

use std::{fmt, panic::Location};

use super::state::with_state;
use crate::hooks;

/// Base exit status of a process terminated by an uncaught exception. The
/// normalized exception code is added to it.
pub const EXIT_UNCAUGHT: i32 = 200;

/// Misuse of the exception engine. Each kind terminates the process with its
/// own reserved exit status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum InternalError {
    /// More than [`MAX_NESTING`](super::MAX_NESTING) regions were open on one
    /// thread.
    TooManyRegions,
    /// A region ended while it was not the innermost one, or was dropped
    /// without ending.
    UnbalancedEnd,
    /// `rethrow` was called outside of an executing catch clause.
    IllegalRethrow,
    /// A step was issued for a region that is not the innermost one.
    OutsideRegion,
    /// A region kept receiving failures.
    RunawayLoop,
}

impl InternalError {
    /// The exit status reserved for this kind of misuse.
    pub const fn exit_status(self) -> i32 {
        match self {
            Self::TooManyRegions => 254,
            Self::UnbalancedEnd => 253,
            Self::IllegalRethrow => 252,
            Self::OutsideRegion => 251,
            Self::RunawayLoop => 250,
        }
    }
}

/// Why the process is about to terminate. Passed to the installed
/// [`TerminationHandler`](crate::hooks::termination::TerminationHandler).
///
/// Its `Display` output is the diagnostic report written by the default
/// handler.
#[derive(Debug)]
pub enum Termination {
    /// An exception reached the top level of its thread.
    Uncaught {
        /// The code of the entry that escaped, as given.
        code: i32,
        /// The diagnostic tag configured through [`Hooks::tag`].
        ///
        /// [`Hooks::tag`]: crate::hooks::Hooks::tag
        tag: String,
        /// The rendered trace of the thread.
        trace: String,
    },
    /// The engine detected misuse.
    Internal {
        /// What kind of misuse.
        error: InternalError,
        /// Short description of the failed check.
        what: &'static str,
        /// Where the check failed.
        location: &'static Location<'static>,
    },
}

impl Termination {
    /// The exit status the process should terminate with.
    pub fn exit_status(&self) -> i32 {
        match self {
            Self::Uncaught { code, .. } => (EXIT_UNCAUGHT + (*code).max(1))
                .min(InternalError::TooManyRegions.exit_status()),
            Self::Internal { error, .. } => error.exit_status(),
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uncaught { code, tag, trace } => {
                writeln!(
                    f,
                    "Uncaught exception (code {code}) - terminating. Tag: {tag}"
                )?;
                f.write_str(trace)
            }
            Self::Internal {
                what, location, ..
            } => write!(
                f,
                "vtry assertion error: {what} ({}:{})",
                location.file(),
                location.line()
            ),
        }
    }
}

/// Terminates the process because of engine misuse.
#[cold]
pub(crate) fn fatal(
    error: InternalError,
    what: &'static str,
    location: &'static Location<'static>,
) -> ! {
    tracing::error!(?error, what, "vtry internal error");
    hooks::terminate(&Termination::Internal {
        error,
        what,
        location,
    })
}

/// Terminates the process because an exception with `code` has no region
/// left to land in.
#[cold]
pub(crate) fn uncaught(code: i32) -> ! {
    let trace = with_state(|state| super::render_trace(&state.trace));
    tracing::error!(code, "uncaught exception");
    hooks::terminate(&Termination::Uncaught {
        code,
        tag: hooks::tag(),
        trace,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uncaught_exit_status_is_clamped() {
        let status = |code| {
            Termination::Uncaught {
                code,
                tag: String::new(),
                trace: String::new(),
            }
            .exit_status()
        };
        assert_eq!(status(5), 205);
        assert_eq!(status(0), 201);
        assert_eq!(status(-3), 201);
        assert_eq!(status(54), 254);
        assert_eq!(status(1000), 254);
    }

    #[test]
    fn test_internal_report() {
        let location = Location::caller();
        let termination = Termination::Internal {
            error: InternalError::IllegalRethrow,
            what: "rethrow outside of a catch clause",
            location,
        };
        assert_eq!(termination.exit_status(), 252);
        assert!(
            termination
                .to_string()
                .starts_with("vtry assertion error: rethrow outside of a catch clause (")
        );
    }
}
