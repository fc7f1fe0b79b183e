//! Source emitter: turns a [`Program`] back into text the parser accepts.
//!
//! Every command is written on its own line with single spaces between
//! parts. Comments and `?begin` blocks are not preserved. Re-parsing the
//! output of a parsed program yields the same names, arguments, and quoted
//! flags; only the quote character may differ.

use super::ast::{Command, Part, Program};
use super::lexer::{is_id_byte, is_quote};

// ── Public API ──────────────────────────────────────────────────────────

/// Emit normalised source bytes for a program.
///
/// Output is raw bytes because parts may hold non-UTF-8 data.
pub fn emit_source(program: &Program<'_>) -> Vec<u8> {
    let mut out = Vec::new();
    for cmd in program {
        emit_command(&mut out, cmd);
    }
    out
}

/// Like [`emit_source`], replacing invalid UTF-8 for display.
pub fn emit_string(program: &Program<'_>) -> String {
    String::from_utf8_lossy(&emit_source(program)).into_owned()
}

// ── Commands and parts ──────────────────────────────────────────────────

fn emit_command(out: &mut Vec<u8>, cmd: &Command<'_>) {
    let name = cmd.name();
    // A bare `?word` at column 0 would be read back as a directive.
    if !name.is_quoted() && name.as_bytes().first() == Some(&b'?') {
        out.push(b' ');
    }
    emit_part(out, name);
    for arg in cmd.args() {
        out.push(b' ');
        emit_part(out, arg);
    }
    out.push(b'\n');
}

fn emit_part(out: &mut Vec<u8>, part: &Part<'_>) {
    let bytes = part.as_bytes();
    if !part.is_quoted() && is_bare_word(bytes) {
        out.extend_from_slice(bytes);
    } else {
        emit_quoted(out, bytes);
    }
}

/// True when `bytes` lexes back as exactly one bare word.
fn is_bare_word(bytes: &[u8]) -> bool {
    match bytes.first() {
        Some(&first) => !is_quote(first) && bytes.iter().all(|&b| is_id_byte(b)),
        None => false,
    }
}

// ── Quoting ─────────────────────────────────────────────────────────────

/// Pick the quote character for a string value.
///
/// Escape translation leaves an unrecognised `\` in place, so a value byte
/// `\` is written as-is. After an odd run of such backslashes, a written
/// `\"` would leave its quote unpaired and close a `"` string early. Values
/// containing that shape can only come from `'` strings, so they get `'`.
fn pick_quote(bytes: &[u8]) -> u8 {
    let mut run = 0usize;
    for &b in bytes {
        match b {
            b'\\' => run += 1,
            b'"' if run % 2 == 1 => return b'\'',
            _ => run = 0,
        }
    }
    b'"'
}

fn emit_quoted(out: &mut Vec<u8>, bytes: &[u8]) {
    let quote = pick_quote(bytes);
    out.push(quote);
    for &b in bytes {
        match b {
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x0c => out.extend_from_slice(b"\\f"),
            0x0b => out.extend_from_slice(b"\\v"),
            0x07 => out.extend_from_slice(b"\\a"),
            0 => out.extend_from_slice(b"\\0"),
            b'"' => out.extend_from_slice(b"\\\""),
            other => out.push(other),
        }
    }
    out.push(quote);
}
