//! Diagnostic code constants.
//!
//! Codes below [`USER`] are reserved for the engine itself. Hosts build their
//! own codes with [`ErrorCode::user`].

use serde::{Deserialize, Serialize};

/// Numeric diagnostic code. `0` means "no failure".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    /// Build a host-defined code. Returns `None` for values inside the
    /// reserved engine range.
    pub const fn user(code: u16) -> Option<Self> {
        if code >= USER.0 {
            Some(Self(code))
        } else {
            None
        }
    }

    /// Raw numeric value.
    pub const fn get(self) -> u16 {
        self.0
    }

    /// True for every code except [`NONE`].
    pub const fn is_error(self) -> bool {
        self.0 != NONE.0
    }

    /// True for host-defined codes (`>= 100`).
    pub const fn is_user(self) -> bool {
        self.0 >= USER.0
    }
}

impl Default for ErrorCode {
    fn default() -> Self {
        NONE
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PL{:03}", self.0)
    }
}

impl std::str::FromStr for ErrorCode {
    type Err = std::num::ParseIntError;

    /// Accepts both `PL010` and `10`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("PL")
            .or_else(|| s.strip_prefix("pl"))
            .unwrap_or(s);
        digits.parse().map(Self)
    }
}

/// No error.
pub const NONE: ErrorCode = ErrorCode(0);
/// General hard error.
pub const GENERAL: ErrorCode = ErrorCode(1);
/// Too many parts on one logical line.
pub const PARSE_BUFFER: ErrorCode = ErrorCode(2);
/// Quoted string not closed before the end of the line.
pub const UNCLOSED_STRING: ErrorCode = ErrorCode(3);
/// `?begin` block not closed before the end of input.
pub const UNCLOSED_BLOCK: ErrorCode = ErrorCode(4);
/// Logical line whose command name is empty.
pub const EMPTY_COMMAND: ErrorCode = ErrorCode(5);
/// Unknown `?` directive.
pub const UNKNOWN_DIRECTIVE: ErrorCode = ErrorCode(7);
/// The `language` command; languages are bound before the run starts.
pub const LANGUAGE_COMMAND: ErrorCode = ErrorCode(9);
/// No route matched and the language has no fallback.
pub const UNKNOWN_COMMAND: ErrorCode = ErrorCode(10);
/// Storage could not be allocated.
pub const OUT_OF_MEMORY: ErrorCode = ErrorCode(11);
/// A deprecated route was used. Warning only.
pub const DEPRECATED_COMMAND: ErrorCode = ErrorCode(12);
/// First host-defined code.
pub const USER: ErrorCode = ErrorCode(100);

/// Every engine-defined code, in numeric order.
pub const ALL: &[ErrorCode] = &[
    NONE,
    GENERAL,
    PARSE_BUFFER,
    UNCLOSED_STRING,
    UNCLOSED_BLOCK,
    EMPTY_COMMAND,
    UNKNOWN_DIRECTIVE,
    LANGUAGE_COMMAND,
    UNKNOWN_COMMAND,
    OUT_OF_MEMORY,
    DEPRECATED_COMMAND,
    USER,
];
