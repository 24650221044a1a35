//! Throwing, rethrowing and the protected-region state machine.

use core::marker::PhantomData;
use std::{fmt, panic::Location};

use super::{
    fatal::{InternalError, fatal, uncaught},
    state::{Claim, Frame, try_with_state, with_state},
    trace::{Exception, TraceEntry},
};

/// Maximum number of regions open at the same time on one thread.
pub const MAX_NESTING: usize = 100;

/// Maximum number of failures that may land on one region before the engine
/// gives up on it.
///
/// A region built with [`Try`] receives at most three failures: from the body,
/// from the catch clause that claimed the first one, and from the finally
/// step. Reaching the cap means the frame bookkeeping is corrupt, and the
/// process ends with [`InternalError::RunawayLoop`].
pub const MAX_TRANSFERS: u32 = 1000;

/// The error value of a thrown exception.
///
/// A `Thrown` only carries the normalized code; the details live in the
/// thread's trace, which is why it is neither `Send` nor `Sync`. Return it
/// with `?` until it reaches a [`Try`] region.
#[must_use = "a thrown exception must be propagated to its region"]
pub struct Thrown {
    code: i32,
    _thread_bound: PhantomData<*const ()>,
}

impl Thrown {
    fn new(code: i32) -> Self {
        Self {
            code,
            _thread_bound: PhantomData,
        }
    }

    /// The normalized code, always at least 1.
    #[inline]
    pub fn code(&self) -> i32 {
        self.code
    }
}

impl fmt::Debug for Thrown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thrown").field("code", &self.code).finish()
    }
}

impl fmt::Display for Thrown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match super::current_exception() {
            Some(origin) if !origin.message().is_empty() => {
                write!(f, "exception {}: {}", self.code, origin.message())
            }
            _ => write!(f, "exception {}", self.code),
        }
    }
}

impl core::error::Error for Thrown {}

/// Codes below 1 propagate as 1.
#[inline]
pub(crate) const fn normalize(code: i32) -> i32 {
    if code < 1 { 1 } else { code }
}

/// Starts a new exception: clears the thread's trace and sticky uncatchable
/// flag, records `entry`, and returns the value to propagate.
///
/// Outside of any region the trace is reported and the process terminates.
///
/// ```rust
/// use vtry::exception::{Try, TraceEntry, throw};
///
/// let caught = Try::run(|| -> vtry::Result<i32> {
///     Err(throw(TraceEntry::new(4).with_message("not ready")))
/// })
/// .catch(4, |exception| Ok(exception.code() * 10))
/// .end();
/// assert_eq!(caught.ok(), Some(40));
/// ```
pub fn throw(entry: TraceEntry) -> Thrown {
    let cleared = with_state(|state| {
        state.uncatchable = false;
        state.take_trace()
    });
    drop(cleared);
    raise(entry)
}

/// Continues the exception claimed by the executing catch clause, keeping its
/// trace. An entry code below 1 reuses the claimed code.
///
/// Calling this anywhere but inside a catch clause of the innermost region
/// (including from a finally step) terminates the process.
#[track_caller]
pub fn rethrow(mut entry: TraceEntry) -> Thrown {
    let location = Location::caller();
    let claimed = with_state(|state| {
        state
            .frames
            .last()
            .filter(|frame| frame.claim == Claim::Catching && frame.pending == 0)
            .map(|frame| frame.claimed_code)
    });
    let Some(claimed) = claimed else {
        fatal(
            InternalError::IllegalRethrow,
            "rethrow outside of a catch clause",
            location,
        )
    };
    if entry.code < 1 {
        entry.code = claimed;
    }
    raise(entry)
}

/// Records `entry` and hands the failure to the innermost region.
fn raise(entry: TraceEntry) -> Thrown {
    let raw_code = entry.code();
    let code = normalize(raw_code);
    let (rejected, has_region) = with_state(|state| {
        if entry.is_uncatchable() {
            state.uncatchable = true;
        }
        (state.record(entry), !state.frames.is_empty())
    });
    drop(rejected);

    if !has_region {
        uncaught(raw_code);
    }
    tracing::trace!(code, "exception raised");
    Thrown::new(code)
}

/// A protected region: the body, its catch clauses and its finally step.
///
/// Each step runs its closure immediately, in the order the methods are
/// called, and [`end`](Self::end) closes the region:
///
/// ```rust
/// use vtry::{exception::Try, throw};
///
/// fn parse(input: &str) -> vtry::Result<u8> {
///     match input.parse() {
///         Ok(value) => Ok(value),
///         Err(_) => throw!(22, "cannot parse {input:?}"),
///     }
/// }
///
/// let mut cleaned_up = false;
/// let value = Try::run(|| parse("x1"))
///     .catch(22, |exception| {
///         assert_eq!(exception.message(), "cannot parse \"x1\"");
///         Ok(0)
///     })
///     .finally(|| {
///         cleaned_up = true;
///         Ok(())
///     })
///     .end();
///
/// assert_eq!(value.ok(), Some(0));
/// assert!(cleaned_up);
/// ```
///
/// Rules:
///
/// - The first catch clause whose code matches the pending failure, or the
///   first [`catch_all`](Self::catch_all), claims it; no other clause of the
///   region runs.
/// - A failure raised by a catch clause is not caught by a later clause of the
///   same region.
/// - [`finally`](Self::finally) runs exactly once, whether or not anything
///   failed or was claimed. After it, catch clauses are skipped.
/// - [`end`](Self::end) propagates a failure that is still pending, or any
///   failure after an uncatchable one, to the enclosing region, adding an entry
///   for the end site. With no enclosing region the process terminates.
///
/// A `Try` must be ended. Dropping it unended terminates the process, except
/// while unwinding from a panic.
#[must_use = "a protected region must be closed with `end`"]
pub struct Try<T> {
    depth: usize,
    value: Option<T>,
    entered_at: &'static Location<'static>,
    ended: bool,
    _thread_bound: PhantomData<*const ()>,
}

impl<T> Try<T> {
    /// Opens a region and runs its body.
    #[track_caller]
    pub fn run(body: impl FnOnce() -> crate::Result<T>) -> Self {
        let location = Location::caller();
        let Some(depth) = with_state(|state| state.push_frame(MAX_NESTING)) else {
            fatal(
                InternalError::TooManyRegions,
                "too many nested regions",
                location,
            )
        };
        tracing::trace!(depth, "region entered");

        let mut region = Self {
            depth,
            value: None,
            entered_at: location,
            ended: false,
            _thread_bound: PhantomData,
        };
        match body() {
            Ok(value) => region.value = Some(value),
            Err(thrown) => region.land(thrown, location),
        }
        region
    }

    /// Handles a pending failure whose code is `code`.
    #[track_caller]
    pub fn catch(mut self, code: i32, handler: impl FnOnce(&Exception) -> crate::Result<T>) -> Self {
        self.arbitrate(Some(code), handler, Location::caller());
        self
    }

    /// Handles any pending failure not claimed by an earlier clause.
    #[track_caller]
    pub fn catch_all(mut self, handler: impl FnOnce(&Exception) -> crate::Result<T>) -> Self {
        self.arbitrate(None, handler, Location::caller());
        self
    }

    /// Runs cleanup code. It runs at most once per region; a failure raised
    /// here replaces whatever was pending.
    #[track_caller]
    pub fn finally(mut self, cleanup: impl FnOnce() -> crate::Result<()>) -> Self {
        let location = Location::caller();
        let first = self.with_frame(location, |frame| {
            let first = frame.claim != Claim::Finally;
            frame.claim = Claim::Finally;
            first
        });
        if first {
            tracing::trace!(depth = self.depth, "finally");
            if let Err(thrown) = cleanup() {
                self.land(thrown, location);
            }
        }
        self
    }

    /// Closes the region, returning the value of the body or of the clause
    /// that handled its failure.
    #[track_caller]
    pub fn end(mut self) -> crate::Result<T> {
        let location = Location::caller();
        self.ended = true;
        let depth = self.depth;
        let Some((frame, uncatchable)) = with_state(|state| {
            if state.frames.len() != depth + 1 {
                return None;
            }
            let frame = state.frames.pop()?;
            Some((frame, state.uncatchable))
        }) else {
            fatal(
                InternalError::UnbalancedEnd,
                "region ended while an inner region is still open",
                location,
            )
        };
        tracing::trace!(depth, pending = frame.pending, "region left");

        if uncatchable || frame.pending != 0 {
            let code = if frame.pending != 0 {
                frame.pending
            } else {
                frame.claimed_code
            };
            let message = if uncatchable {
                "UNCATCHABLE rethrown by region end"
            } else {
                "rethrown by region end"
            };
            let entry = TraceEntry::new(code)
                .at(location.file(), location.line())
                .with_message(message);
            return Err(raise(entry));
        }

        if frame.claimed_code != 0 {
            let resolved = with_state(|state| state.take_trace());
            drop(resolved);
        }

        match self.value.take() {
            Some(value) => Ok(value),
            None => fatal(
                InternalError::UnbalancedEnd,
                "region completed without a value",
                location,
            ),
        }
    }

    fn arbitrate(
        &mut self,
        code: Option<i32>,
        handler: impl FnOnce(&Exception) -> crate::Result<T>,
        location: &'static Location<'static>,
    ) {
        let claimed = self.with_frame(location, |frame| {
            let matches = code.is_none_or(|code| code == frame.pending);
            if frame.claim != Claim::Unclaimed || frame.pending == 0 || !matches {
                return None;
            }
            frame.claim = Claim::Catching;
            frame.claimed_code = frame.pending;
            frame.pending = 0;
            Some(frame.claimed_code)
        });
        let Some(claimed) = claimed else {
            return;
        };
        tracing::trace!(depth = self.depth, code = claimed, "exception claimed");

        let exception = with_state(|state| match state.trace.first() {
            Some(origin) => origin.snapshot(claimed),
            None => Exception::unrecorded(claimed),
        });
        let outcome = handler(&exception);
        self.with_frame(location, |frame| {
            if frame.claim == Claim::Catching {
                frame.claim = Claim::Caught;
            }
        });
        match outcome {
            Ok(value) => self.value = Some(value),
            Err(thrown) => self.land(thrown, location),
        }
    }

    /// Records a failure that reached this region.
    fn land(&mut self, thrown: Thrown, location: &'static Location<'static>) {
        let transfers = self.with_frame(location, |frame| {
            frame.pending = thrown.code;
            frame.transfers += 1;
            frame.transfers
        });
        if transfers >= MAX_TRANSFERS {
            fatal(
                InternalError::RunawayLoop,
                "region keeps receiving exceptions",
                location,
            );
        }
    }

    fn with_frame<R>(
        &self,
        location: &'static Location<'static>,
        f: impl FnOnce(&mut Frame) -> R,
    ) -> R {
        match with_state(|state| state.top_frame(self.depth).map(f)) {
            Some(result) => result,
            None => fatal(
                InternalError::OutsideRegion,
                "step issued for a region that is not the innermost one",
                location,
            ),
        }
    }
}

impl<T> Drop for Try<T> {
    fn drop(&mut self) {
        if self.ended {
            return;
        }
        if std::thread::panicking() {
            let depth = self.depth;
            let _ = try_with_state(|state| state.frames.truncate(depth));
            return;
        }
        fatal(
            InternalError::UnbalancedEnd,
            "region dropped without `end`",
            self.entered_at,
        )
    }
}

impl<T> fmt::Debug for Try<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Try")
            .field("depth", &self.depth)
            .field("has_value", &self.value.is_some())
            .field("entered_at", &self.entered_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::current_exception;

    fn fail(code: i32) -> crate::Result<i32> {
        Err(throw(TraceEntry::new(code).with_message("failed")))
    }

    #[test]
    fn test_body_value() {
        let value = Try::run(|| Ok(3)).catch_all(|_| Ok(0)).end();
        assert_eq!(value.ok(), Some(3));
    }

    #[test]
    fn test_first_matching_catch_claims() {
        let mut order = Vec::new();
        let value = Try::run(|| fail(2))
            .catch(1, |_| {
                order.push("one");
                Ok(1)
            })
            .catch(2, |exception| {
                order.push("two");
                assert_eq!(exception.code(), 2);
                assert_eq!(exception.message(), "failed");
                Ok(2)
            })
            .catch_all(|_| {
                order.push("all");
                Ok(3)
            })
            .end();
        assert_eq!(value.ok(), Some(2));
        assert_eq!(order, ["two"]);
    }

    #[test]
    fn test_code_is_normalized() {
        let value = Try::run(|| fail(-4)).catch(1, |exception| Ok(exception.code())).end();
        assert_eq!(value.ok(), Some(1));
    }

    #[test]
    fn test_nested_propagation_adds_boundary_entry() {
        let outer = Try::run(|| {
            Try::run(|| fail(7)).catch(8, |_| Ok(0)).end()
        })
        .catch(7, |exception| {
            assert_eq!(exception.message(), "failed");
            let mut messages = Vec::new();
            crate::exception::walk_trace(|_, entry| messages.push(entry.message().to_owned()));
            assert_eq!(messages, ["failed", "rethrown by region end"]);
            Ok(70)
        })
        .end();
        assert_eq!(outer.ok(), Some(70));
        assert!(current_exception().is_none());
    }

    #[test]
    fn test_rethrow_keeps_trace_and_code() {
        let outer = Try::run(|| {
            Try::run(|| fail(9))
                .catch_all(|_| Err(rethrow(TraceEntry::new(0).with_message("again"))))
                .end()
        })
        .catch(9, |exception| {
            assert_eq!(exception.message(), "failed");
            Ok(i32::try_from(crate::exception::walk_trace(|_, _| {})).unwrap())
        })
        .end();
        assert_eq!(outer.ok(), Some(3));
    }

    #[test]
    fn test_region_receives_at_most_three_failures() {
        let mut landed = None;
        let outer = Try::run(|| {
            Try::run(|| fail(5))
                .catch(5, |_| fail(6))
                .finally(|| {
                    landed = with_state(|state| state.frames.last().map(|frame| frame.transfers));
                    fail(7).map(drop)
                })
                .end()
        })
        .catch(7, |exception| Ok(exception.code()))
        .end();
        assert_eq!(outer.ok(), Some(7));
        assert_eq!(landed, Some(2));
    }

    #[test]
    fn test_finally_runs_once_and_skips_later_catches() {
        let mut runs = 0;
        let outer = Try::run(|| {
            Try::run(|| fail(5))
                .finally(|| {
                    runs += 1;
                    Ok(())
                })
                .catch_all(|_| Ok(0))
                .finally(|| {
                    runs += 1;
                    Ok(())
                })
                .end()
        })
        .catch(5, |_| Ok(-1))
        .end();
        assert_eq!(runs, 1);
        assert_eq!(outer.ok(), Some(-1));
    }

    #[test]
    fn test_thrown_display() {
        let thrown = Thrown::new(6);
        assert_eq!(thrown.to_string(), "exception 6");
    }
}
