/// Program representation: parts, commands, and the command arena.
pub mod ast;
/// Re-exports from the diagnostics crate.
pub mod diag;
/// JSON serialization helpers for programs.
pub mod dump;
/// Source emitter: converts a program back into parseable text.
pub mod emit;
/// Lexer: splits raw bytes into words, strings, directives, and newlines.
pub mod lexer;
/// Parser: groups tokens into logical lines and builds a [`ast::Program`].
pub mod parser;
