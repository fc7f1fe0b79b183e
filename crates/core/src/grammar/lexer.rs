use std::borrow::Cow;

/// Classification of a lexer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokKind {
    /// `?name` at the very start of a physical line. `text` is the name.
    Directive,
    /// A run of identifier bytes.
    Word,
    /// A quoted string. `text` holds the escape-translated contents.
    Str,
    /// A line feed.
    Newline,
}

/// A token produced by [`Lexer`].
///
/// `start`/`end` are byte offsets into the source covering the whole token,
/// including quotes or the leading `?`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'src> {
    /// The classification of this token.
    pub kind: TokKind,
    /// Token text. Borrowed from the source unless escapes were rewritten.
    pub text: Cow<'src, [u8]>,
    /// 1-based line the token starts on.
    pub line: u32,
    /// Byte offset of the first byte.
    pub start: usize,
    /// Byte offset one past the last byte.
    pub end: usize,
}

/// Why the lexer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexErrorKind {
    /// A quoted string reached a line end or the end of input.
    UnclosedString,
    /// A byte that cannot start any token.
    UnexpectedByte(u8),
}

/// A lexical error at a specific line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexError {
    /// What went wrong.
    pub kind: LexErrorKind,
    /// 1-based line of the offending token.
    pub line: u32,
    /// Byte offset where the offending token starts.
    pub offset: usize,
}

/// Punctuation allowed inside bare words, besides ASCII alphanumerics and
/// bytes `>= 0x80`.
const ID_PUNCT: &[u8] = b"!$%^&*()-+_=[]{}|\\:;',<>/?~@.";

/// True for bytes that may appear in a bare word.
pub fn is_id_byte(b: u8) -> bool {
    b >= 0x80 || b.is_ascii_alphanumeric() || ID_PUNCT.contains(&b)
}

/// True for whitespace that separates parts without ending the line.
pub fn is_inline_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | 0x0b | 0x0c | b'\r')
}

/// True for the two quote characters.
pub fn is_quote(b: u8) -> bool {
    b == b'"' || b == b'\''
}

/// Translate backslash escapes inside quoted-string contents.
///
/// `\n \r \f \v \t \a \" \0` become the corresponding byte. Any other
/// backslash is kept as-is and the byte after it is translated on its own,
/// so `\q` stays `\q` and `\\n` becomes a backslash followed by a newline.
///
/// Returns the input unchanged (borrowed) when it has no backslash.
pub fn unescape(raw: &[u8]) -> Cow<'_, [u8]> {
    if !raw.contains(&b'\\') {
        return Cow::Borrowed(raw);
    }
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] != b'\\' {
            out.push(raw[i]);
            i += 1;
            continue;
        }
        let mapped = match raw.get(i + 1) {
            Some(b'n') => Some(b'\n'),
            Some(b'r') => Some(b'\r'),
            Some(b'f') => Some(0x0c),
            Some(b'v') => Some(0x0b),
            Some(b't') => Some(b'\t'),
            Some(b'a') => Some(0x07),
            Some(b'"') => Some(b'"'),
            Some(b'0') => Some(0),
            _ => None,
        };
        match mapped {
            Some(byte) => {
                out.push(byte);
                i += 2;
            }
            None => {
                out.push(b'\\');
                i += 1;
            }
        }
    }
    Cow::Owned(out)
}

/// Streaming tokenizer over a byte buffer.
///
/// Whitespace and `#` comments are skipped. The iterator stops after the
/// first error.
pub struct Lexer<'src> {
    src: &'src [u8],
    pos: usize,
    line: u32,
    at_line_start: bool,
    done: bool,
}

impl<'src> Lexer<'src> {
    /// Start lexing `src` at line 1.
    pub fn new(src: &'src [u8]) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            at_line_start: true,
            done: false,
        }
    }

    /// Current 1-based line.
    pub fn line(&self) -> u32 {
        self.line
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn bump(&mut self) {
        if let Some(b) = self.peek() {
            if b == b'\n' {
                self.line = self.line.saturating_add(1);
            }
            self.pos += 1;
        }
    }

    fn token(&self, kind: TokKind, text: Cow<'src, [u8]>, line: u32, start: usize) -> Token<'src> {
        Token {
            kind,
            text,
            line,
            start,
            end: self.pos,
        }
    }

    fn directive(&mut self) -> Token<'src> {
        let (start, line) = (self.pos, self.line);
        self.bump();
        let name_start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_alphanumeric()) {
            self.bump();
        }
        let src = self.src;
        let name = &src[name_start..self.pos];
        self.token(TokKind::Directive, Cow::Borrowed(name), line, start)
    }

    fn word(&mut self) -> Token<'src> {
        let (start, line) = (self.pos, self.line);
        while self.peek().is_some_and(is_id_byte) {
            self.bump();
        }
        let src = self.src;
        let text = &src[start..self.pos];
        self.token(TokKind::Word, Cow::Borrowed(text), line, start)
    }

    fn string(&mut self, quote: u8) -> Result<Token<'src>, LexError> {
        let (start, line) = (self.pos, self.line);
        self.bump();
        let body_start = self.pos;
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    return Err(LexError {
                        kind: LexErrorKind::UnclosedString,
                        line,
                        offset: start,
                    });
                }
                Some(b) if b == quote => break,
                Some(b'\\') => {
                    self.bump();
                    self.bump();
                }
                Some(_) => self.bump(),
            }
        }
        let src = self.src;
        let body = &src[body_start..self.pos];
        self.bump();
        Ok(self.token(TokKind::Str, unescape(body), line, start))
    }

    fn next_token(&mut self) -> Option<Result<Token<'src>, LexError>> {
        loop {
            let b = self.peek()?;
            if self.at_line_start && b == b'?' {
                self.at_line_start = false;
                return Some(Ok(self.directive()));
            }
            self.at_line_start = false;
            match b {
                b'\n' => {
                    let (start, line) = (self.pos, self.line);
                    self.bump();
                    self.at_line_start = true;
                    let src = self.src;
                    let text = &src[start..self.pos];
                    return Some(Ok(self.token(TokKind::Newline, Cow::Borrowed(text), line, start)));
                }
                b'#' => {
                    while self.peek().is_some_and(|c| c != b'\n') {
                        self.bump();
                    }
                }
                b if is_inline_space(b) => self.bump(),
                b if is_quote(b) => return Some(self.string(b)),
                b if is_id_byte(b) => return Some(Ok(self.word())),
                other => {
                    return Some(Err(LexError {
                        kind: LexErrorKind::UnexpectedByte(other),
                        line: self.line,
                        offset: self.pos,
                    }));
                }
            }
        }
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Result<Token<'src>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.next_token();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

/// Tokenize a whole buffer, stopping at the first error.
pub fn tokenize(src: &[u8]) -> Result<Vec<Token<'_>>, LexError> {
    Lexer::new(src).collect()
}
