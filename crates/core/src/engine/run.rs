use std::collections::HashSet;

use pl2b_diagnostics::report;

use super::language::{Handler, Language, Lifecycle, Resolution};
use crate::config::RunOptions;
use crate::grammar::ast::{Command, CommandId, Program};
use crate::grammar::diag::{Diagnostic, ErrorCode, SourcePos, codes};

/// Command name that ends a run successfully without dispatching.
pub const ABORT_COMMAND: &str = "abort";
/// Command name that would switch languages; always rejected.
pub const LANGUAGE_COMMAND: &str = "language";

/// What a handler wants the engine to do next.
#[derive(Debug)]
pub enum Flow {
    /// Execute this command next. It may be the current command, an earlier
    /// one, or a later one.
    Continue(CommandId),
    /// Stop the run successfully.
    Halt,
    /// Stop the run with an error.
    Fail(Diagnostic),
}

impl Flow {
    /// Continue with the command after `cmd`, or halt if it is the last one.
    pub fn next(program: &Program<'_>, cmd: &Command<'_>) -> Self {
        program.next(cmd.id()).into()
    }

    /// Fail at the command's position.
    pub fn fail(code: ErrorCode, cmd: &Command<'_>, message: impl Into<String>) -> Self {
        Flow::Fail(Diagnostic::error(code, cmd.pos().clone(), message))
    }
}

impl From<Option<CommandId>> for Flow {
    fn from(next: Option<CommandId>) -> Self {
        match next {
            Some(id) => Flow::Continue(id),
            None => Flow::Halt,
        }
    }
}

/// Why a successful run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// The program had no commands.
    Empty,
    /// An `abort` command was reached.
    Abort,
    /// A handler returned [`Flow::Halt`]. This includes [`Flow::next`]
    /// stepping past the last command, since the engine cannot tell the two
    /// apart.
    Handler,
}

/// Outcome of a successful run.
#[derive(Debug)]
pub struct RunSummary {
    /// Why the run stopped.
    pub halt: HaltReason,
    /// Number of handler invocations, fallback included.
    pub invocations: u64,
    /// The last command reached, if any.
    pub last: Option<CommandId>,
    /// Deprecation warnings, in the order they were first raised. A command
    /// that runs several times contributes a single warning.
    pub warnings: Vec<Diagnostic>,
}

/// Runs programs against one [`Language`].
pub struct Engine<'l, C> {
    language: &'l Language<C>,
    options: RunOptions,
}

impl<'l, C> Engine<'l, C> {
    /// Engine with default [`RunOptions`].
    pub fn new(language: &'l Language<C>) -> Self {
        Self {
            language,
            options: RunOptions::default(),
        }
    }

    /// Replace the run options (builder pattern).
    pub fn options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Execute `program` from its head, threading `ctx` through every handler.
    ///
    /// Returns the first error produced by dispatch or by a handler. The
    /// error's message is bounded by [`RunOptions::message_capacity`].
    pub fn run(&self, program: &Program<'_>, ctx: &mut C) -> Result<RunSummary, Diagnostic> {
        let span = tracing::debug_span!(
            "run",
            language = %self.language.name(),
            commands = program.len()
        );
        let _enter = span.enter();

        let state = RunState {
            program,
            language: self.language,
            ctx,
            diag: Diagnostic::with_capacity(self.options.message_capacity),
            warnings: Vec::new(),
            warned: HashSet::new(),
            invocations: 0,
            last: None,
        };
        let result = state.drive();
        match &result {
            Ok(summary) => tracing::debug!(
                halt = ?summary.halt,
                invocations = summary.invocations,
                "run finished"
            ),
            Err(err) => tracing::debug!(code = %err.code(), "run failed"),
        }
        result
    }
}

/// Run `program` with `language` and default options.
pub fn run<C>(
    program: &Program<'_>,
    language: &Language<C>,
    ctx: &mut C,
) -> Result<RunSummary, Diagnostic> {
    Engine::new(language).run(program, ctx)
}

/// Everything one run needs. Lives only for the duration of [`Engine::run`].
struct RunState<'r, 's, C> {
    program: &'r Program<'s>,
    language: &'r Language<C>,
    ctx: &'r mut C,
    diag: Diagnostic,
    warnings: Vec<Diagnostic>,
    warned: HashSet<CommandId>,
    invocations: u64,
    last: Option<CommandId>,
}

impl<'r, C> RunState<'r, '_, C> {
    fn drive(mut self) -> Result<RunSummary, Diagnostic> {
        let program = self.program;
        let Some(mut current) = program.head() else {
            return Ok(self.finish(HaltReason::Empty));
        };

        loop {
            let Some(cmd) = program.get(current) else {
                let pos = self.last_pos();
                report!(
                    self.diag,
                    codes::GENERAL,
                    pos,
                    "handler redirected to command {current}, outside the program"
                );
                return Err(self.diag);
            };
            self.last = Some(current);

            let name = cmd.name().as_bytes();
            if name == ABORT_COMMAND.as_bytes() {
                tracing::trace!(command = %current, "abort");
                return Ok(self.finish(HaltReason::Abort));
            }
            if name == LANGUAGE_COMMAND.as_bytes() {
                report!(
                    self.diag,
                    codes::LANGUAGE_COMMAND,
                    cmd.pos().clone(),
                    "the `language` command is not supported; `{}` is bound for the whole run",
                    self.language.name()
                );
                return Err(self.diag);
            }

            let handler = self.handler_for(cmd)?;
            self.invocations += 1;
            tracing::trace!(command = %current, name = %cmd.name(), "dispatch");

            match handler(program, &mut *self.ctx, cmd) {
                Flow::Continue(next) => current = next,
                Flow::Halt => return Ok(self.finish(HaltReason::Handler)),
                Flow::Fail(err) => return Err(self.fail(cmd, err)),
            }
        }
    }

    /// Pick the handler for `cmd`, raising warnings or the unknown-command
    /// error on the way.
    fn handler_for(&mut self, cmd: &Command<'_>) -> Result<&'r Handler<C>, Diagnostic> {
        let language = self.language;
        match language.resolve(cmd) {
            Resolution::Route(index) => {
                let route = &language.routes()[index];
                if route.lifecycle() == Lifecycle::Deprecated {
                    self.deprecated(cmd);
                }
                Ok(route.handler())
            }
            Resolution::Fallback => match language.fallback_handler() {
                Some(handler) => Ok(handler),
                None => Err(self.unknown(cmd)),
            },
            Resolution::Unknown => Err(self.unknown(cmd)),
        }
    }

    fn deprecated(&mut self, cmd: &Command<'_>) {
        // Loops re-enter the same command; collect once, log every time.
        tracing::warn!(
            pos = %cmd.pos(),
            command = %cmd.name(),
            "deprecated command"
        );
        if !self.warned.insert(cmd.id()) {
            return;
        }
        let warning = Diagnostic::warn(
            codes::DEPRECATED_COMMAND,
            cmd.pos().clone(),
            format!("command `{}` is deprecated", cmd.name()),
        );
        self.warnings.push(warning);
    }

    fn unknown(&mut self, cmd: &Command<'_>) -> Diagnostic {
        report!(
            self.diag,
            codes::UNKNOWN_COMMAND,
            cmd.pos().clone(),
            "unknown command `{}`",
            cmd.name()
        );
        std::mem::take(&mut self.diag)
    }

    fn fail(&mut self, cmd: &Command<'_>, err: Diagnostic) -> Diagnostic {
        if err.is_error() {
            self.diag.absorb(err);
        } else {
            report!(
                self.diag,
                codes::GENERAL,
                cmd.pos().clone(),
                "handler for `{}` failed without an error code: {}",
                cmd.name(),
                err.message()
            );
        }
        std::mem::take(&mut self.diag)
    }

    fn last_pos(&self) -> SourcePos {
        self.last
            .and_then(|id| self.program.get(id))
            .map(|cmd| cmd.pos().clone())
            .unwrap_or_default()
    }

    fn finish(self, halt: HaltReason) -> RunSummary {
        RunSummary {
            halt,
            invocations: self.invocations,
            last: self.last,
            warnings: self.warnings,
        }
    }
}
