//! PL2B command engine core.
//!
//! Parses line-oriented command text into a [`Program`] and executes it
//! against a host-defined [`Language`]. The main entry points are [`parse`]
//! for parsing, [`run`] (or [`Engine`]) for execution, and [`emit_source`]
//! for turning a program back into text.

#![warn(missing_docs)]

/// Engine configuration and JSON loading.
pub mod config;
/// Dispatch tables and the execution loop.
pub mod engine;
/// Lexer, parser, program representation, emitter, and related utilities.
pub mod grammar;
/// Language edition and engine version constants.
pub mod version;

// ── Convenience re-exports ──────────────────────────────────────────────────
// Flat imports for the most common entry points. The full module paths
// remain available for less common types.

// Parser
pub use grammar::parser::{parse, parse_with_options};

// Program
pub use grammar::ast::{Command, CommandId, Part, Program};

// Emitter
pub use grammar::emit::{emit_source, emit_string};

// Diagnostics (re-exported from the diagnostics crate)
pub use grammar::diag::{Diagnostic, ErrorCode, Payload, Severity, SourcePos, codes};

// Language and engine
pub use engine::language::{Handler, Language, Lifecycle, Matcher, Resolution, Route, Router};
pub use engine::run::{Engine, Flow, HaltReason, RunSummary, run};

// Configuration
pub use config::{ConfigError, EngineConfig, ParseOptions, RunOptions};

// Serialization helpers
pub use grammar::dump::to_pretty_json;
