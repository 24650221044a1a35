//! Structured exception handling.
//!
//! An exception is a [`Thrown`] value travelling up the call stack through
//! `?`, plus a per-thread trace of [`TraceEntry`] records describing where it
//! came from and where it was passed on. Protected regions ([`Try`]) receive
//! it, decide which clause handles it, run cleanup, and either resolve it or
//! pass it on.
//!
//! # Lifecycle of an exception
//!
//! 1. [`throw`] clears the trace, records the original site and returns the
//!    [`Thrown`] value.
//! 2. The value is returned with `?` until it reaches the body (or a clause)
//!    of the innermost [`Try`].
//! 3. A catch clause may claim it, and may [`rethrow`] it with another entry
//!    appended.
//! 4. [`Try::end`] either resolves it (clearing the trace) or passes it to
//!    the enclosing region with a boundary entry. Past the outermost region,
//!    the process terminates through the installed
//!    [`TerminationHandler`](crate::hooks::termination::TerminationHandler).
//!
//! # Per-thread state
//!
//! The trace and the stack of open regions are thread-local, which is also
//! why [`Thrown`] and [`Try`] cannot leave their thread.
//!
//! # Inspection
//!
//! - [`current_exception`]: the original entry of the trace
//! - [`walk_trace`]: every entry, oldest first
//! - [`format_trace`] / [`print_trace`]: the rendered trace
//! - [`add_trace_entry`]: append a note without raising anything

mod engine;
mod fatal;
mod state;
mod trace;

pub use self::{
    engine::{MAX_NESTING, MAX_TRANSFERS, Thrown, Try, rethrow, throw},
    fatal::{EXIT_UNCAUGHT, InternalError, Termination},
    trace::{Exception, GENERIC_CODE, MAX_TRACE, MAX_TRACE_STRING, TraceEntry},
};
use self::state::with_state;

/// Returns a copy of the original entry of the calling thread's trace, or
/// `None` when no exception is being handled.
pub fn current_exception() -> Option<Exception> {
    with_state(|state| {
        state
            .trace
            .first()
            .map(|origin| origin.snapshot(origin.code()))
    })
}

/// Appends an entry to the calling thread's trace without raising anything.
///
/// Returns `false` when the entry was not recorded because the trace is full
/// or the entry is blank.
pub fn add_trace_entry(entry: TraceEntry) -> bool {
    let rejected = with_state(|state| state.record(entry));
    rejected.is_none()
}

/// Calls `visit` with every entry of the calling thread's trace, oldest first,
/// and returns how many there were.
///
/// `visit` must not throw or otherwise touch the exception engine.
pub fn walk_trace(mut visit: impl FnMut(usize, &TraceEntry)) -> usize {
    with_state(|state| {
        for (index, entry) in state.trace.iter().enumerate() {
            visit(index, entry);
        }
        state.trace.len()
    })
}

/// Renders the calling thread's trace, one entry per record.
pub fn format_trace() -> String {
    with_state(|state| render_trace(&state.trace))
}

/// Writes the calling thread's trace to standard error.
pub fn print_trace() {
    eprint!("{}", format_trace());
}

fn render_trace(trace: &[TraceEntry]) -> String {
    use std::fmt::Write as _;

    let mut out = String::new();
    for entry in trace {
        let _ = writeln!(out, "{entry}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_walk_trace() {
        assert!(add_trace_entry(TraceEntry::new(1).with_message("first")));
        assert!(add_trace_entry(TraceEntry::new(2).with_message("second")));
        assert!(!add_trace_entry(TraceEntry::new(3).at("", 0)));

        let mut codes = Vec::new();
        let count = walk_trace(|index, entry| codes.push((index, entry.code())));
        assert_eq!(count, 2);
        assert_eq!(codes, [(0, 1), (1, 2)]);

        let origin = current_exception().unwrap();
        assert_eq!(origin.message(), "first");

        let rendered = format_trace();
        assert_eq!(rendered.lines().count(), 4);
        assert!(rendered.starts_with("first\n    ...at "));
    }

    #[test]
    fn test_empty_trace() {
        assert!(current_exception().is_none());
        assert_eq!(format_trace(), "");
    }
}
