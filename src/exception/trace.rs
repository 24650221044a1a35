//! Trace entries and the snapshots handed to catch clauses.

use std::{
    any::Any,
    borrow::Cow,
    fmt::{self, Write as _},
    panic::Location,
};

/// Maximum number of entries kept in a thread's trace. Further entries are
/// dropped silently.
pub const MAX_TRACE: usize = 20;

/// Size of the bounded text fields of a [`TraceEntry`], including room for a
/// terminator. Text is truncated to `MAX_TRACE_STRING - 1` characters.
pub const MAX_TRACE_STRING: usize = 128;

/// Code used by [`thrif!`](crate::thrif) and by failures raised by the object
/// runtime itself.
pub const GENERIC_CODE: i32 = 0;

/// One record of an exception's path through the program.
///
/// The first entry of a thread's trace is the original failure site; later
/// entries are added by rethrows and by regions that let a failure escape.
///
/// ```rust
/// use vtry::exception::TraceEntry;
///
/// let entry = TraceEntry::new(5)
///     .with_message(format_args!("disk {} is full", "sda1"))
///     .mark_uncatchable();
///
/// assert_eq!(entry.code(), 5);
/// assert_eq!(entry.message(), "disk sda1 is full");
/// assert!(entry.is_uncatchable());
/// ```
pub struct TraceEntry {
    pub(crate) code: i32,
    uncatchable: bool,
    file: Cow<'static, str>,
    line: u32,
    message: String,
    extra: Option<Box<dyn Any>>,
}

impl TraceEntry {
    /// Creates an entry with the given code, located at the caller.
    #[track_caller]
    pub fn new(code: i32) -> Self {
        let location = Location::caller();
        Self {
            code,
            uncatchable: false,
            file: bounded_cow(Cow::Borrowed(location.file())),
            line: location.line(),
            message: String::new(),
            extra: None,
        }
    }

    /// Creates an entry whose code is the last OS error number of the calling
    /// thread (0 when there is none), located at the caller.
    #[track_caller]
    pub fn last_os_error() -> Self {
        let code = std::io::Error::last_os_error()
            .raw_os_error()
            .unwrap_or(GENERIC_CODE);
        Self::new(code)
    }

    /// Sets the message, truncated to `MAX_TRACE_STRING - 1` characters.
    ///
    /// Accepts anything displayable, including `format_args!(..)`, so long
    /// messages are never rendered in full.
    pub fn with_message(mut self, message: impl fmt::Display) -> Self {
        self.message = bounded(message);
        self
    }

    /// Overrides the source location.
    pub fn at(mut self, file: impl Into<Cow<'static, str>>, line: u32) -> Self {
        self.file = bounded_cow(file.into());
        self.line = line;
        self
    }

    /// Attaches an arbitrary payload. It is dropped together with the entry.
    pub fn with_extra<E: Any>(mut self, extra: E) -> Self {
        self.extra = Some(Box::new(extra));
        self
    }

    /// Marks the failure as uncatchable: catch clauses still run, but every
    /// region end re-raises it until it reaches the top level.
    pub fn mark_uncatchable(mut self) -> Self {
        self.uncatchable = true;
        self
    }

    /// The code as given. Propagation treats values below 1 as 1.
    #[inline]
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Whether this entry was raised as uncatchable.
    #[inline]
    pub fn is_uncatchable(&self) -> bool {
        self.uncatchable
    }

    /// The source file of the entry.
    #[inline]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// The source line of the entry.
    #[inline]
    pub fn line(&self) -> u32 {
        self.line
    }

    /// The message of the entry, possibly empty.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The attached payload, if any.
    #[inline]
    pub fn extra(&self) -> Option<&dyn Any> {
        self.extra.as_deref()
    }

    /// The attached payload, if it is an `E`.
    pub fn downcast_extra<E: Any>(&self) -> Option<&E> {
        self.extra()?.downcast_ref::<E>()
    }

    /// Entries with no location, no message and no payload carry nothing
    /// worth recording.
    pub(crate) fn is_blank(&self) -> bool {
        self.file.is_empty() && self.message.is_empty() && self.extra.is_none()
    }

    pub(crate) fn snapshot(&self, code: i32) -> Exception {
        Exception {
            code,
            uncatchable: self.uncatchable,
            file: self.file.clone(),
            line: self.line,
            message: self.message.clone(),
        }
    }
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_entry(
            f,
            &self.message,
            self.uncatchable,
            &self.file,
            self.line,
            self.code,
        )?;
        if let Some(extra) = &self.extra {
            write!(f, " (extra at {:p})", &**extra)?;
        }
        Ok(())
    }
}

impl fmt::Debug for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceEntry")
            .field("code", &self.code)
            .field("uncatchable", &self.uncatchable)
            .field("file", &self.file)
            .field("line", &self.line)
            .field("message", &self.message)
            .field("extra", &self.extra.is_some())
            .finish()
    }
}

/// A copy of the data of a trace entry, without its payload.
///
/// Catch clauses receive one describing the original failure site, with
/// [`code`](Self::code) set to the code that was claimed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Exception {
    code: i32,
    uncatchable: bool,
    file: Cow<'static, str>,
    line: u32,
    message: String,
}

impl Exception {
    pub(crate) fn unrecorded(code: i32) -> Self {
        Self {
            code,
            uncatchable: false,
            file: Cow::Borrowed(""),
            line: 0,
            message: String::new(),
        }
    }

    /// The exception code.
    #[inline]
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Whether the original failure was raised as uncatchable.
    #[inline]
    pub fn is_uncatchable(&self) -> bool {
        self.uncatchable
    }

    /// Source file of the original failure.
    #[inline]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Source line of the original failure.
    #[inline]
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Message of the original failure.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_entry(
            f,
            &self.message,
            self.uncatchable,
            &self.file,
            self.line,
            self.code,
        )
    }
}

fn write_entry(
    f: &mut fmt::Formatter<'_>,
    message: &str,
    uncatchable: bool,
    file: &str,
    line: u32,
    code: i32,
) -> fmt::Result {
    let marker = if uncatchable { "UNCATCHABLE " } else { "" };
    if !message.is_empty() {
        writeln!(f, "{message}")?;
    }
    write!(f, "    ...{marker}at {file}:{line}, code {code}")
}

/// A `fmt::Write` sink that keeps at most `remaining` characters.
struct Bounded<'a> {
    out: &'a mut String,
    remaining: usize,
}

impl fmt::Write for Bounded<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for ch in s.chars() {
            if self.remaining == 0 {
                break;
            }
            self.out.push(ch);
            self.remaining -= 1;
        }
        Ok(())
    }
}

/// Renders `value` into a string of at most `MAX_TRACE_STRING - 1`
/// characters.
pub(crate) fn bounded(value: impl fmt::Display) -> String {
    let mut out = String::new();
    let mut sink = Bounded {
        out: &mut out,
        remaining: MAX_TRACE_STRING - 1,
    };
    // Bounded never fails; a Display impl that errors just leaves the text
    // rendered so far.
    let _ = write!(sink, "{value}");
    out
}

fn bounded_cow(text: Cow<'static, str>) -> Cow<'static, str> {
    if text.chars().count() < MAX_TRACE_STRING {
        text
    } else {
        Cow::Owned(bounded(text))
    }
}
