//! Dispatch and execution.
//!
//! A [`language::Language`] maps command names to handlers; the
//! [`run::Engine`] walks a program, resolving each command and following the
//! [`run::Flow`] its handler returns.

/// Route tables, matchers, and handler types.
pub mod language;
/// The execution loop.
pub mod run;
