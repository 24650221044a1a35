//! Per-thread engine state: the trace and the stack of open regions.
//!
//! Nothing in here calls user code. Callers take what they need out of the
//! state (for example a cleared trace, so its payloads drop afterwards) and
//! run user code only once the borrow has ended.

use std::cell::RefCell;

use super::trace::{MAX_TRACE, TraceEntry};

/// How far a region's arbitration has gone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Claim {
    /// No clause has claimed the pending failure.
    Unclaimed,
    /// A catch clause claimed the failure and is executing.
    Catching,
    /// A catch clause claimed the failure and has returned.
    Caught,
    /// The finally step has run or is running.
    Finally,
}

#[derive(Debug)]
pub(crate) struct Frame {
    pub(crate) claim: Claim,
    /// Normalized code of the failure waiting for arbitration, 0 if none.
    pub(crate) pending: i32,
    /// Code claimed by a catch clause, 0 if nothing was claimed.
    pub(crate) claimed_code: i32,
    /// Failures that landed on this frame.
    pub(crate) transfers: u32,
}

impl Frame {
    const fn new() -> Self {
        Self {
            claim: Claim::Unclaimed,
            pending: 0,
            claimed_code: 0,
            transfers: 0,
        }
    }
}

pub(crate) struct EngineState {
    pub(crate) frames: Vec<Frame>,
    pub(crate) trace: Vec<TraceEntry>,
    /// Sticky flag set by an uncatchable entry, cleared by a fresh throw.
    pub(crate) uncatchable: bool,
}

impl EngineState {
    const fn new() -> Self {
        Self {
            frames: Vec::new(),
            trace: Vec::new(),
            uncatchable: false,
        }
    }

    /// Pushes a new frame unless `limit` frames are already open. Returns the
    /// depth of the new frame.
    pub(crate) fn push_frame(&mut self, limit: usize) -> Option<usize> {
        if self.frames.len() >= limit {
            return None;
        }
        self.frames.push(Frame::new());
        Some(self.frames.len() - 1)
    }

    /// The frame at `depth`, if it is the innermost one.
    pub(crate) fn top_frame(&mut self, depth: usize) -> Option<&mut Frame> {
        if self.frames.len() == depth + 1 {
            self.frames.last_mut()
        } else {
            None
        }
    }

    /// Appends an entry. Entries that are blank or that do not fit are handed
    /// back so the caller can drop them outside of the borrow.
    pub(crate) fn record(&mut self, entry: TraceEntry) -> Option<TraceEntry> {
        if entry.is_blank() || self.trace.len() >= MAX_TRACE {
            return Some(entry);
        }
        self.trace.push(entry);
        None
    }

    pub(crate) fn take_trace(&mut self) -> Vec<TraceEntry> {
        std::mem::take(&mut self.trace)
    }
}

thread_local! {
    static STATE: RefCell<EngineState> = const { RefCell::new(EngineState::new()) };
}

/// Runs `f` with exclusive access to the calling thread's state.
pub(crate) fn with_state<R>(f: impl FnOnce(&mut EngineState) -> R) -> R {
    STATE.with_borrow_mut(f)
}

/// Like [`with_state`], but gives up instead of panicking when the state is
/// unavailable (already borrowed, or the thread is shutting down).
pub(crate) fn try_with_state<R>(f: impl FnOnce(&mut EngineState) -> R) -> Option<R> {
    STATE
        .try_with(|state| state.try_borrow_mut().ok().map(|mut state| f(&mut state)))
        .ok()
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_limit() {
        let mut state = EngineState::new();
        assert_eq!(state.push_frame(2), Some(0));
        assert_eq!(state.push_frame(2), Some(1));
        assert_eq!(state.push_frame(2), None);
        assert!(state.top_frame(0).is_none());
        assert!(state.top_frame(1).is_some());
    }

    #[test]
    fn test_record_caps_trace() {
        let mut state = EngineState::new();
        for code in 0..MAX_TRACE as i32 {
            assert!(state.record(TraceEntry::new(code)).is_none());
        }
        let rejected = state.record(TraceEntry::new(99));
        assert_eq!(rejected.map(|entry| entry.code()), Some(99));
        assert_eq!(state.trace.len(), MAX_TRACE);
        assert_eq!(state.trace[0].code(), 0);
    }

    #[test]
    fn test_record_skips_blank_entries() {
        let mut state = EngineState::new();
        assert!(state.record(TraceEntry::new(1).at("", 0)).is_some());
        assert!(state.trace.is_empty());
    }
}
