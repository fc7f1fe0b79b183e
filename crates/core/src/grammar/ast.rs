use std::borrow::Cow;
use std::fmt;

use serde::Serialize;
use serde::ser::{SerializeStruct, Serializer};

use super::diag::{Diagnostic, SourcePos, codes};

/// One token of a command line: a bare word or a quoted string.
///
/// Bare words always borrow from the source buffer. Quoted strings borrow
/// too unless escape translation rewrote their bytes, in which case they
/// own the translated text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Part<'src> {
    text: Cow<'src, [u8]>,
    quoted: bool,
}

impl<'src> Part<'src> {
    /// Create a part from raw bytes.
    pub fn new(text: impl Into<Cow<'src, [u8]>>, quoted: bool) -> Self {
        Self {
            text: text.into(),
            quoted,
        }
    }

    /// A bare word borrowing `text`.
    pub fn bare<T: AsRef<[u8]> + ?Sized>(text: &'src T) -> Self {
        Self::new(text.as_ref(), false)
    }

    /// A quoted string borrowing `text` (already unescaped).
    pub fn quoted<T: AsRef<[u8]> + ?Sized>(text: &'src T) -> Self {
        Self::new(text.as_ref(), true)
    }

    /// Raw bytes of the part. May contain NUL and non-UTF-8 bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.text
    }

    /// The part as UTF-8 text, if it is valid UTF-8.
    pub fn to_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.text).ok()
    }

    /// The part as text, replacing invalid UTF-8 sequences.
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.text)
    }

    /// True when the part came from a quoted string.
    pub fn is_quoted(&self) -> bool {
        self.quoted
    }

    /// True when the part is a bare word equal to `keyword`.
    ///
    /// Quoted parts never match, so `"else"` is data while `else` is a keyword.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        !self.quoted && self.text.as_ref() == keyword.as_bytes()
    }

    /// Byte length of the part.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// True for the empty quoted string.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// True when the text borrows from the source buffer.
    pub fn is_borrowed(&self) -> bool {
        matches!(self.text, Cow::Borrowed(_))
    }

    /// Detach the part from the source buffer.
    pub fn into_owned(self) -> Part<'static> {
        Part {
            text: Cow::Owned(self.text.into_owned()),
            quoted: self.quoted,
        }
    }
}

impl fmt::Display for Part<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl Serialize for Part<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Part", 2)?;
        s.serialize_field("text", &self.to_string_lossy())?;
        s.serialize_field("quoted", &self.quoted)?;
        s.end()
    }
}

/// Handle to a command inside the [`Program`] that created it.
///
/// Handles are plain indices: copying one never borrows the program, and a
/// stale or foreign handle is detected by [`Program::get`] returning `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CommandId(usize);

impl CommandId {
    /// Zero-based position of the command in its program.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One logical line: a command name, its arguments, and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Command<'src> {
    id: CommandId,
    pos: SourcePos,
    name: Part<'src>,
    args: Vec<Part<'src>>,
}

impl<'src> Command<'src> {
    /// Handle of this command in its program.
    pub fn id(&self) -> CommandId {
        self.id
    }

    /// Source position of the command's first part.
    pub fn pos(&self) -> &SourcePos {
        &self.pos
    }

    /// The command name part.
    pub fn name(&self) -> &Part<'src> {
        &self.name
    }

    /// Argument parts, in source order.
    pub fn args(&self) -> &[Part<'src>] {
        &self.args
    }

    /// Number of arguments.
    pub fn args_len(&self) -> usize {
        self.args.len()
    }

    /// Argument at `index`, if present.
    pub fn arg(&self, index: usize) -> Option<&Part<'src>> {
        self.args.get(index)
    }

    fn into_owned(self) -> Command<'static> {
        Command {
            id: self.id,
            pos: self.pos,
            name: self.name.into_owned(),
            args: self.args.into_iter().map(Part::into_owned).collect(),
        }
    }
}

/// An ordered sequence of commands, owning every command it contains.
///
/// Commands are stored in an arena; the previous/next links of a command are
/// its neighbours in that arena. The sequence is append-only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Program<'src> {
    commands: Vec<Command<'src>>,
}

impl<'src> Program<'src> {
    /// An empty program.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command at the tail.
    ///
    /// Fails with `EMPTY_COMMAND` when `name` is empty and with
    /// `OUT_OF_MEMORY` when the arena cannot grow.
    pub fn push(
        &mut self,
        pos: SourcePos,
        name: Part<'src>,
        args: Vec<Part<'src>>,
    ) -> Result<CommandId, Diagnostic> {
        if name.is_empty() {
            return Err(Diagnostic::error(
                codes::EMPTY_COMMAND,
                pos,
                "command name is empty",
            ));
        }
        if self.commands.try_reserve(1).is_err() {
            return Err(Diagnostic::error(
                codes::OUT_OF_MEMORY,
                pos,
                "failed allocating storage for a command",
            ));
        }
        let id = CommandId(self.commands.len());
        self.commands.push(Command {
            id,
            pos,
            name,
            args,
        });
        Ok(id)
    }

    /// First command, or `None` for an empty program.
    pub fn head(&self) -> Option<CommandId> {
        (!self.commands.is_empty()).then_some(CommandId(0))
    }

    /// Last command, or `None` for an empty program.
    pub fn tail(&self) -> Option<CommandId> {
        self.commands.len().checked_sub(1).map(CommandId)
    }

    /// Look up a command. Returns `None` for handles outside this program.
    pub fn get(&self, id: CommandId) -> Option<&Command<'src>> {
        self.commands.get(id.0)
    }

    /// The command after `id`, if any.
    pub fn next(&self, id: CommandId) -> Option<CommandId> {
        let next = id.0.checked_add(1)?;
        (next < self.commands.len()).then_some(CommandId(next))
    }

    /// The command before `id`, if any.
    pub fn prev(&self, id: CommandId) -> Option<CommandId> {
        if id.0 >= self.commands.len() {
            return None;
        }
        id.0.checked_sub(1).map(CommandId)
    }

    /// Iterate over commands head to tail.
    pub fn iter(&self) -> std::slice::Iter<'_, Command<'src>> {
        self.commands.iter()
    }

    /// Number of commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// True when the program has no commands.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Detach every command from the source buffer.
    pub fn into_owned(self) -> Program<'static> {
        Program {
            commands: self
                .commands
                .into_iter()
                .map(Command::into_owned)
                .collect(),
        }
    }
}

impl<'a, 'src> IntoIterator for &'a Program<'src> {
    type Item = &'a Command<'src>;
    type IntoIter = std::slice::Iter<'a, Command<'src>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: u32) -> SourcePos {
        SourcePos::new("t", line)
    }

    #[test]
    fn push_links_commands_in_order() {
        let mut p = Program::new();
        let a = p.push(pos(1), Part::bare("a"), vec![]).unwrap();
        let b = p
            .push(pos(2), Part::bare("b"), vec![Part::quoted("x y")])
            .unwrap();
        assert_eq!(p.head(), Some(a));
        assert_eq!(p.tail(), Some(b));
        assert_eq!(p.next(a), Some(b));
        assert_eq!(p.next(b), None);
        assert_eq!(p.prev(b), Some(a));
        assert_eq!(p.prev(a), None);
        assert_eq!(p.get(b).unwrap().args_len(), 1);
        assert!(p.get(b).unwrap().arg(0).unwrap().is_quoted());
    }

    #[test]
    fn empty_program_has_no_head() {
        let p = Program::new();
        assert!(p.is_empty());
        assert_eq!(p.head(), None);
        assert_eq!(p.tail(), None);
    }

    #[test]
    fn foreign_handle_is_rejected() {
        let mut big = Program::new();
        for i in 0..5 {
            big.push(pos(i), Part::bare("x"), vec![]).unwrap();
        }
        let far = big.tail().unwrap();
        let mut small = Program::new();
        small.push(pos(1), Part::bare("y"), vec![]).unwrap();
        assert!(small.get(far).is_none());
        assert!(small.next(far).is_none());
        assert!(small.prev(far).is_none());
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut p = Program::new();
        let err = p.push(pos(3), Part::quoted(""), vec![]).unwrap_err();
        assert_eq!(err.code(), codes::EMPTY_COMMAND);
        assert_eq!(err.pos().line, 3);
        assert!(p.is_empty());
    }

    #[test]
    fn keyword_refuses_quoted_parts() {
        assert!(Part::bare("else").is_keyword("else"));
        assert!(!Part::quoted("else").is_keyword("else"));
    }

    #[test]
    fn into_owned_keeps_contents() {
        let src = String::from("abc");
        let owned = {
            let mut p = Program::new();
            p.push(pos(1), Part::bare(src.as_str()), vec![Part::quoted("q")])
                .unwrap();
            p.into_owned()
        };
        drop(src);
        let cmd = owned.get(owned.head().unwrap()).unwrap();
        assert_eq!(cmd.name().as_bytes(), b"abc");
        assert!(!cmd.name().is_borrowed());
    }
}
