//! The small language behind `pl2b run`.
//!
//! - `echo ARGS...` prints its arguments separated by spaces.
//! - `say ARGS...` is a deprecated spelling of `echo`.
//! - `repeat N` jumps back to the previous command `N` more times.
//!
//! Without `--strict`, unknown commands are logged and skipped.

use std::collections::HashMap;

use pl2b_core::{Command, CommandId, Flow, Language, Program, Route, codes};

/// Per-run state of the demo language.
#[derive(Debug, Default)]
pub(crate) struct Session {
    /// Lines printed by `echo`/`say`, in order.
    pub(crate) output: Vec<String>,
    /// Remaining jumps per `repeat` command.
    loops: HashMap<CommandId, u64>,
    /// Commands skipped by the fallback.
    pub(crate) skipped: u64,
}

/// Build the demo language. `strict` leaves out the fallback.
pub(crate) fn language(strict: bool) -> Language<Session> {
    let lang = Language::new("demo")
        .info("echo, repeat, and the deprecated say")
        .route(Route::exact("echo", echo))
        .route(Route::exact("say", echo).deprecated())
        .route(Route::exact("repeat", repeat));
    if strict { lang } else { lang.fallback(skip) }
}

fn echo<'s>(program: &Program<'s>, session: &mut Session, cmd: &Command<'s>) -> Flow {
    let line = cmd
        .args()
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    session.output.push(line);
    Flow::next(program, cmd)
}

fn repeat<'s>(program: &Program<'s>, session: &mut Session, cmd: &Command<'s>) -> Flow {
    let count = match cmd.arg(0).and_then(|a| a.to_str()).map(str::parse::<u64>) {
        Some(Ok(n)) if cmd.args_len() == 1 => n,
        _ => return Flow::fail(codes::USER, cmd, "repeat expects exactly one count"),
    };
    let Some(target) = program.prev(cmd.id()) else {
        return Flow::fail(codes::USER, cmd, "repeat has no command to repeat");
    };

    let remaining = session.loops.entry(cmd.id()).or_insert(count);
    if *remaining > 0 {
        *remaining -= 1;
        Flow::Continue(target)
    } else {
        // Re-arm for the next time control reaches this command.
        session.loops.remove(&cmd.id());
        Flow::next(program, cmd)
    }
}

fn skip<'s>(program: &Program<'s>, session: &mut Session, cmd: &Command<'s>) -> Flow {
    tracing::info!(pos = %cmd.pos(), command = %cmd.name(), "skipping unknown command");
    session.skipped += 1;
    Flow::next(program, cmd)
}
