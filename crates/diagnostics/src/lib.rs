//! Diagnostics for the PL2B command engine.
//!
//! Provides [`Diagnostic`], [`Severity`], [`SourcePos`], and [`LineIndex`]
//! types used to report failures from the tokenizer, the dispatcher, and
//! host-supplied command handlers. Diagnostic codes are defined in the
//! [`codes`] module.

#![warn(missing_docs)]

/// Diagnostic code constants.
pub mod codes;

pub use codes::ErrorCode;

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Caller-defined data attached to a diagnostic. The engine never creates one.
pub type Payload = Box<dyn Any + Send + Sync>;

/// File name used when the host did not supply one.
pub const UNKNOWN_FILE: &str = "<unknown-file>";

// ── LineIndex ────────────────────────────────────────────────────────────

/// Maps byte offsets in a source buffer to line and column positions.
///
/// Lines and columns are **0-indexed** internally. Use [`LineIndex::line_col`]
/// to get a `(line, col)` pair and add 1 when displaying to users.
///
/// The index is built in O(n) time and each lookup is O(log n) via binary
/// search.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of the start of each line.
    /// `line_starts[0]` is always 0.
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    /// Build a `LineIndex` from source bytes.
    pub fn new(text: impl AsRef<[u8]>) -> Self {
        let text = text.as_ref();
        let mut line_starts = vec![0usize];
        for (i, b) in text.iter().enumerate() {
            if *b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self {
            line_starts,
            len: text.len(),
        }
    }

    /// Convert a byte offset to a 0-indexed `(line, column)` pair.
    ///
    /// If `offset` is past the end of the source, the last line is returned
    /// with the column measured from that line's start.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next.saturating_sub(1),
        };
        let col = offset.saturating_sub(self.line_starts[line]);
        (line, col)
    }

    /// Byte offset of the start of the given 0-indexed line.
    ///
    /// Returns `None` if `line` is out of bounds.
    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.line_starts.get(line).copied()
    }

    /// Byte range `[start, end)` covered by a 1-based line number, excluding
    /// the terminating newline.
    pub fn line_range(&self, line: u32) -> Option<std::ops::Range<usize>> {
        let idx = (line as usize).checked_sub(1)?;
        let start = self.line_start(idx)?;
        let end = match self.line_start(idx + 1) {
            Some(next) => next - 1,
            None => self.len,
        };
        Some(start..end)
    }

    /// Total number of lines (at least 1, even for empty input).
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

// ── SourcePos ────────────────────────────────────────────────────────────

/// A position in a source file: file identifier plus 1-based line.
///
/// The file name is shared between every command parsed from one buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourcePos {
    /// File identifier supplied by the host.
    pub file: Arc<str>,
    /// 1-based line number. `0` means "no particular line".
    pub line: u32,
}

impl SourcePos {
    /// Create a position.
    pub fn new(file: impl Into<Arc<str>>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Position used for failures not tied to any source line.
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_FILE, 0)
    }
}

impl Default for SourcePos {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

// ── Severity ─────────────────────────────────────────────────────────────

/// Severity level for a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Severity {
    /// Hard error; the phase that produced it stops.
    Error,
    /// Warning; reported but never stops a run.
    Warn,
    /// Informational note.
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warn => write!(f, "warn"),
            Severity::Info => write!(f, "info"),
        }
    }
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A structured error record: code, position, bounded message, and an
/// optional caller-owned payload.
///
/// A record built with [`Diagnostic::with_capacity`] never holds more than
/// `capacity` bytes of message text; longer messages are truncated on a
/// UTF-8 character boundary. [`Diagnostic::report`] replaces code, position,
/// message, and payload in a single call, so no partially updated record is
/// ever observable.
///
/// A record whose code is [`codes::NONE`] never carries a payload.
#[derive(Serialize, Deserialize)]
pub struct Diagnostic {
    code: ErrorCode,
    severity: Severity,
    pos: SourcePos,
    message: String,
    #[serde(skip, default = "unbounded")]
    capacity: usize,
    #[serde(skip)]
    payload: Option<Payload>,
}

fn unbounded() -> usize {
    usize::MAX
}

impl Diagnostic {
    /// Create an empty record (code [`codes::NONE`]) whose message is bounded
    /// to `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            code: codes::NONE,
            severity: Severity::Info,
            pos: SourcePos::unknown(),
            message: String::with_capacity(capacity.min(4096)),
            capacity,
            payload: None,
        }
    }

    /// Create a diagnostic with an unbounded message.
    pub fn new(
        code: ErrorCode,
        severity: Severity,
        pos: SourcePos,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            severity,
            pos,
            message: message.into(),
            capacity: usize::MAX,
            payload: None,
        }
    }

    /// Shorthand for an `Error` diagnostic.
    pub fn error(code: ErrorCode, pos: SourcePos, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Error, pos, message)
    }

    /// Shorthand for a `Warn` diagnostic.
    pub fn warn(code: ErrorCode, pos: SourcePos, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Warn, pos, message)
    }

    /// Shorthand for an `Info` diagnostic.
    pub fn info(code: ErrorCode, pos: SourcePos, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Info, pos, message)
    }

    /// Attach a caller-owned payload (builder pattern).
    ///
    /// Ignored when the code is [`codes::NONE`].
    pub fn with_payload<T: Any + Send + Sync>(mut self, payload: T) -> Self {
        if self.code.is_error() {
            self.payload = Some(Box::new(payload));
        }
        self
    }

    /// Overwrite this record with a new error, printf style.
    ///
    /// Any previous payload is dropped.
    ///
    /// ```
    /// use pl2b_diagnostics::{Diagnostic, SourcePos, codes};
    ///
    /// let mut d = Diagnostic::with_capacity(8);
    /// d.report(codes::GENERAL, SourcePos::new("a.pl2", 3), format_args!("{} {}", "too", "long"));
    /// assert_eq!(d.message(), "too long");
    /// d.report(codes::GENERAL, SourcePos::new("a.pl2", 3), format_args!("much too long"));
    /// assert_eq!(d.message(), "much too");
    /// ```
    pub fn report(&mut self, code: ErrorCode, pos: SourcePos, args: fmt::Arguments<'_>) {
        self.report_with_payload(code, pos, None, args);
    }

    /// Overwrite this record with a new error and an optional payload.
    pub fn report_with_payload(
        &mut self,
        code: ErrorCode,
        pos: SourcePos,
        payload: Option<Payload>,
        args: fmt::Arguments<'_>,
    ) {
        let mut message = String::new();
        // Writing into a bounded String cannot fail.
        let _ = fmt::Write::write_fmt(
            &mut Bounded {
                buf: &mut message,
                cap: self.capacity,
                full: false,
            },
            args,
        );

        self.code = code;
        self.severity = if code.is_error() {
            Severity::Error
        } else {
            Severity::Info
        };
        self.pos = pos;
        self.message = message;
        self.payload = if code.is_error() { payload } else { None };
    }

    /// Copy another diagnostic into this record, keeping this record's
    /// capacity. The other record's payload moves over.
    pub fn absorb(&mut self, mut other: Diagnostic) {
        let payload = other.payload.take();
        let severity = other.severity;
        self.report_with_payload(
            other.code,
            other.pos,
            payload,
            format_args!("{}", other.message),
        );
        if self.code.is_error() {
            self.severity = severity;
        }
    }

    /// Reset to the empty state, dropping any payload.
    pub fn clear(&mut self) {
        self.code = codes::NONE;
        self.severity = Severity::Info;
        self.pos = SourcePos::unknown();
        self.message.clear();
        self.payload = None;
    }

    /// True when the code is anything but [`codes::NONE`].
    pub fn is_error(&self) -> bool {
        self.code.is_error()
    }

    /// Diagnostic code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Severity level.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Source position the diagnostic relates to.
    pub fn pos(&self) -> &SourcePos {
        &self.pos
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Maximum message length in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True when a payload is attached.
    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    /// Borrow the payload if it is of type `T`.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_deref().and_then(|p| p.downcast_ref::<T>())
    }

    /// Take ownership of the payload, leaving the rest of the record intact.
    pub fn take_payload(&mut self) -> Option<Payload> {
        self.payload.take()
    }

    /// Returns the human-readable explanation for this diagnostic's code, if available.
    pub fn explain(&self) -> Option<&'static str> {
        explain(self.code)
    }
}

impl Default for Diagnostic {
    fn default() -> Self {
        Self::with_capacity(usize::MAX)
    }
}

impl PartialEq for Diagnostic {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
            && self.severity == other.severity
            && self.pos == other.pos
            && self.message == other.message
    }
}

impl fmt::Debug for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostic")
            .field("code", &self.code)
            .field("severity", &self.severity)
            .field("pos", &self.pos)
            .field("message", &self.message)
            .field("payload", &self.payload.is_some())
            .finish()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] {}: {}",
            self.severity, self.code, self.pos, self.message
        )
    }
}

impl std::error::Error for Diagnostic {}

/// Overwrite a [`Diagnostic`] with a formatted message.
///
/// `report!(diag, code, pos, "fmt", args...)` expands to
/// `diag.report(code, pos, format_args!("fmt", args...))`.
#[macro_export]
macro_rules! report {
    ($diag:expr, $code:expr, $pos:expr, $($arg:tt)+) => {
        $diag.report($code, $pos, ::std::format_args!($($arg)+))
    };
}

/// `fmt::Write` sink that silently stops accepting text at `cap` bytes.
struct Bounded<'a> {
    buf: &'a mut String,
    cap: usize,
    full: bool,
}

impl fmt::Write for Bounded<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.full {
            return Ok(());
        }
        let room = self.cap.saturating_sub(self.buf.len());
        if s.len() <= room {
            self.buf.push_str(s);
        } else {
            let mut end = room;
            while !s.is_char_boundary(end) {
                end -= 1;
            }
            self.buf.push_str(&s[..end]);
            self.full = true;
        }
        Ok(())
    }
}

/// Returns the human-readable explanation for a diagnostic code, if known.
pub fn explain(code: ErrorCode) -> Option<&'static str> {
    let text = match code {
        codes::NONE => "No error. A record with this code carries no payload.",
        codes::GENERAL => {
            "General hard error: an unexpected character in the source, an invalid \
             parser setting, or a handler that redirected control outside its program."
        }
        codes::PARSE_BUFFER => {
            "A logical line has more parts than the configured parts-per-line limit. \
             Split the line or raise the limit."
        }
        codes::UNCLOSED_STRING => {
            "A quoted string was not closed by its matching quote before the end of \
             the line. Strings cannot span lines; use \\n for embedded newlines."
        }
        codes::UNCLOSED_BLOCK => {
            "The input ended inside a ?begin block. Close the block with ?end at the \
             start of a line."
        }
        codes::EMPTY_COMMAND => "A logical line starts with an empty quoted string as its command name.",
        codes::UNKNOWN_DIRECTIVE => {
            "A line starts with '?' followed by something other than begin or end."
        }
        codes::LANGUAGE_COMMAND => {
            "The language command is not supported: the language is chosen by the \
             host before the program runs."
        }
        codes::UNKNOWN_COMMAND => {
            "No route of the active language matches the command name and the \
             language has no fallback handler."
        }
        codes::OUT_OF_MEMORY => "Storage for the program or the run could not be allocated.",
        codes::DEPRECATED_COMMAND => {
            "The command matched a route marked deprecated. It still runs, but may \
             be removed from the language later."
        }
        c if c.is_user() => "Host-defined error reported by a command handler.",
        _ => return None,
    };
    Some(text)
}
