use std::fmt;
use std::sync::Arc;

use super::{
    ast::{Part, Program},
    diag::{Diagnostic, ErrorCode, SourcePos, codes},
    lexer::{LexError, LexErrorKind, Lexer, TokKind, Token},
};
use crate::config::ParseOptions;

// ─── Parser Mode State Machine ──────────────────────────────────────────────

/// Whether newlines end the current logical line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Every newline closes the logical line.
    Single,
    /// Inside `?begin` ... `?end`: newlines are merged into the current line.
    Block {
        /// Line of the `?begin` that opened the block.
        opened_at: u32,
    },
}

// ─── Public API ─────────────────────────────────────────────────────────────

/// Parse a source buffer into a [`Program`].
///
/// `parts_per_line` bounds how many parts (command name included) one
/// logical line may hold. Commands borrow from `source`, so the buffer must
/// outlive the returned program (or call [`Program::into_owned`]).
///
/// ```
/// let program = pl2b_core::parse("set greeting \"hello world\"\n", 16).unwrap();
/// let cmd = program.get(program.head().unwrap()).unwrap();
/// assert_eq!(cmd.name().as_bytes(), b"set");
/// assert!(cmd.arg(1).unwrap().is_quoted());
/// ```
pub fn parse<S: AsRef<[u8]> + ?Sized>(
    source: &S,
    parts_per_line: usize,
) -> Result<Program<'_>, Diagnostic> {
    let options = ParseOptions::default().with_parts_per_line(parts_per_line);
    parse_with_options(source, &options)
}

/// Parse a source buffer with explicit [`ParseOptions`].
pub fn parse_with_options<'src, S: AsRef<[u8]> + ?Sized>(
    source: &'src S,
    options: &ParseOptions,
) -> Result<Program<'src>, Diagnostic> {
    Parser::new(source.as_ref(), options).parse()
}

// ─── Parser Implementation ─────────────────────────────────────────────────

struct Parser<'src> {
    lexer: Lexer<'src>,
    file: Arc<str>,
    limit: usize,
    mode: Mode,
    /// Parts of the logical line being assembled.
    staged: Vec<Part<'src>>,
    /// Line of the first staged part.
    line_start: u32,
    program: Program<'src>,
    diag: Diagnostic,
}

impl<'src> Parser<'src> {
    fn new(src: &'src [u8], options: &ParseOptions) -> Self {
        Self {
            lexer: Lexer::new(src),
            file: Arc::from(options.file_name.as_str()),
            limit: options.parts_per_line,
            mode: Mode::Single,
            staged: Vec::new(),
            line_start: 1,
            program: Program::new(),
            diag: Diagnostic::with_capacity(options.message_capacity),
        }
    }

    fn pos(&self, line: u32) -> SourcePos {
        SourcePos::new(Arc::clone(&self.file), line)
    }

    /// Record an error in the bounded diagnostic and hand it out.
    fn fail(&mut self, code: ErrorCode, line: u32, args: fmt::Arguments<'_>) -> Diagnostic {
        let pos = self.pos(line);
        self.diag.report(code, pos, args);
        std::mem::take(&mut self.diag)
    }

    fn parse(mut self) -> Result<Program<'src>, Diagnostic> {
        if self.limit == 0 {
            return Err(self.fail(
                codes::GENERAL,
                0,
                format_args!("parts per line must be at least 1"),
            ));
        }

        while let Some(item) = self.lexer.next() {
            let tok = match item {
                Ok(tok) => tok,
                Err(err) => return Err(self.lex_error(err)),
            };
            match tok.kind {
                TokKind::Directive => self.directive(&tok)?,
                TokKind::Word => self.stage(tok, false)?,
                TokKind::Str => self.stage(tok, true)?,
                TokKind::Newline => {
                    if self.mode == Mode::Single {
                        self.finish_line()?;
                    }
                }
            }
        }

        if let Mode::Block { opened_at } = self.mode {
            return Err(self.fail(
                codes::UNCLOSED_BLOCK,
                opened_at,
                format_args!("unclosed `?begin` block"),
            ));
        }
        self.finish_line()?;

        tracing::debug!(file = %self.file, commands = self.program.len(), "parsed program");
        Ok(self.program)
    }

    fn lex_error(&mut self, err: LexError) -> Diagnostic {
        match err.kind {
            LexErrorKind::UnclosedString => self.fail(
                codes::UNCLOSED_STRING,
                err.line,
                format_args!("unclosed quoted string"),
            ),
            LexErrorKind::UnexpectedByte(b) => self.fail(
                codes::GENERAL,
                err.line,
                format_args!("unexpected character {:?}", char::from(b)),
            ),
        }
    }

    fn directive(&mut self, tok: &Token<'src>) -> Result<(), Diagnostic> {
        match tok.text.as_ref() {
            b"begin" => {
                tracing::trace!(line = tok.line, "?begin");
                if self.mode == Mode::Single {
                    self.mode = Mode::Block {
                        opened_at: tok.line,
                    };
                }
                Ok(())
            }
            b"end" => {
                tracing::trace!(line = tok.line, "?end");
                self.mode = Mode::Single;
                self.finish_line()
            }
            other => {
                let name = String::from_utf8_lossy(other).into_owned();
                Err(self.fail(
                    codes::UNKNOWN_DIRECTIVE,
                    tok.line,
                    format_args!("unknown directive `?{name}`"),
                ))
            }
        }
    }

    fn stage(&mut self, tok: Token<'src>, quoted: bool) -> Result<(), Diagnostic> {
        if self.staged.is_empty() {
            self.line_start = tok.line;
        }
        if self.staged.len() >= self.limit {
            let (start, limit) = (self.line_start, self.limit);
            return Err(self.fail(
                codes::PARSE_BUFFER,
                start,
                format_args!("parse buffer exceeded: more than {limit} parts on one line"),
            ));
        }
        if self.staged.try_reserve(1).is_err() {
            return Err(self.fail(
                codes::OUT_OF_MEMORY,
                tok.line,
                format_args!("failed allocating storage for a part"),
            ));
        }
        self.staged.push(Part::new(tok.text, quoted));
        Ok(())
    }

    /// Turn the staged parts into a command. No-op when nothing is staged.
    fn finish_line(&mut self) -> Result<(), Diagnostic> {
        if self.staged.is_empty() {
            return Ok(());
        }
        let mut parts = std::mem::take(&mut self.staged).into_iter();
        let Some(name) = parts.next() else {
            return Ok(());
        };
        let args: Vec<Part<'src>> = parts.collect();
        let pos = self.pos(self.line_start);
        match self.program.push(pos, name, args) {
            Ok(id) => {
                tracing::trace!(line = self.line_start, command = %id, "finished line");
                Ok(())
            }
            Err(err) => {
                self.diag.absorb(err);
                Err(std::mem::take(&mut self.diag))
            }
        }
    }
}
