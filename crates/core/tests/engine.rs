//! Tests for dispatch and execution.
//!
//! Covers: control-flow redirection (loops, skips, backward jumps), route
//! lifecycle, fallback handling, reserved commands, handler failures and
//! payloads, bounded messages, and sharing a language between threads.

mod common;

use pl2b_core::{
    Command, Diagnostic, Engine, ErrorCode, Flow, HaltReason, Language, Part, Program, Route,
    RunOptions, Severity, codes, parse, run,
};

#[derive(Default)]
struct Counter {
    hits: u32,
    limit: u32,
    seen: Vec<String>,
}

fn record<'s>(p: &Program<'s>, ctx: &mut Counter, cmd: &Command<'s>) -> Flow {
    ctx.seen.push(cmd.name().to_string());
    Flow::next(p, cmd)
}

// ── Control flow ────────────────────────────────────────────────────────

#[test]
fn self_loop_runs_exactly_n_times() {
    let lang = Language::new("t").route(Route::exact(
        "loop",
        |_p: &Program<'_>, ctx: &mut Counter, cmd: &Command<'_>| {
            ctx.hits += 1;
            if ctx.hits < ctx.limit {
                Flow::Continue(cmd.id())
            } else {
                Flow::Halt
            }
        },
    ));
    let program = parse("loop\n", 4).unwrap();
    let mut ctx = Counter {
        limit: 25,
        ..Counter::default()
    };
    let summary = run(&program, &lang, &mut ctx).unwrap();
    assert_eq!(ctx.hits, 25);
    assert_eq!(summary.invocations, 25);
    assert_eq!(summary.halt, HaltReason::Handler);
    assert!(summary.warnings.is_empty());
}

#[test]
fn walks_every_command_in_order() {
    let lang = Language::new("t").route(Route::predicate(|_: &Part<'_>| true, record));
    let program = parse("a\nb\nc\n", 4).unwrap();
    let mut ctx = Counter::default();
    let summary = run(&program, &lang, &mut ctx).unwrap();
    assert_eq!(ctx.seen, ["a", "b", "c"]);
    assert_eq!(summary.last, program.tail());
}

#[test]
fn backward_jump_builds_a_loop() {
    // `again N` jumps back to the previous command until it has run N times.
    let lang = Language::new("t")
        .route(Route::exact("again", |p: &Program<'_>, ctx: &mut Counter, cmd: &Command<'_>| {
            let n: u32 = cmd
                .arg(0)
                .and_then(|a| a.to_str())
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            ctx.hits += 1;
            if ctx.hits < n {
                p.prev(cmd.id()).into()
            } else {
                Flow::next(p, cmd)
            }
        }))
        .fallback(record);
    let program = parse("tick\nagain 3\ndone\n", 4).unwrap();
    let mut ctx = Counter::default();
    run(&program, &lang, &mut ctx).unwrap();
    assert_eq!(ctx.seen, ["tick", "tick", "tick", "done"]);
}

#[test]
fn forward_skip() {
    let lang = Language::new("t")
        .route(Route::exact("skip", |p: &Program<'_>, _: &mut Counter, cmd: &Command<'_>| {
            p.next(cmd.id()).and_then(|n| p.next(n)).into()
        }))
        .fallback(record);
    let program = parse("skip\nhidden\nshown\n", 4).unwrap();
    let mut ctx = Counter::default();
    run(&program, &lang, &mut ctx).unwrap();
    assert_eq!(ctx.seen, ["shown"]);
}

#[test]
fn empty_program_halts_immediately() {
    let lang: Language<Counter> = Language::new("t");
    let program = parse("# nothing\n", 4).unwrap();
    let summary = run(&program, &lang, &mut Counter::default()).unwrap();
    assert_eq!(summary.halt, HaltReason::Empty);
    assert_eq!(summary.invocations, 0);
    assert_eq!(summary.last, None);
}

#[test]
fn handle_from_another_program_is_an_error() {
    let big = parse("a\nb\nc\nd\n", 4).unwrap();
    let far = big.tail().unwrap();
    let lang = Language::new("t").route(Route::exact(
        "jump",
        move |_: &Program<'_>, _: &mut Counter, _: &Command<'_>| Flow::Continue(far),
    ));
    let program = parse("jump\n", 4).unwrap();
    let err = run(&program, &lang, &mut Counter::default()).unwrap_err();
    assert_eq!(err.code(), codes::GENERAL);
    assert_eq!(err.pos().line, 1);
    assert!(err.message().contains("outside the program"), "{}", err.message());
}

// ── Resolution ──────────────────────────────────────────────────────────

#[test]
fn unknown_command_without_fallback() {
    let lang = Language::new("t").route(Route::exact(
        "known",
        |p: &Program<'_>, ctx: &mut Counter, cmd: &Command<'_>| {
            ctx.hits += 1;
            Flow::next(p, cmd)
        },
    ));
    let program = parse("mystery x\n", 4).unwrap();
    let mut ctx = Counter::default();
    let err = run(&program, &lang, &mut ctx).unwrap_err();
    assert_eq!(err.code(), codes::UNKNOWN_COMMAND);
    assert_eq!(err.pos().line, 1);
    assert!(err.message().contains("mystery"));
    assert_eq!(ctx.hits, 0);
}

#[test]
fn unknown_command_stops_later_commands() {
    let lang = Language::new("t").route(Route::exact("ok", record));
    let program = parse("ok\nnope\nok\n", 4).unwrap();
    let mut ctx = Counter::default();
    let err = run(&program, &lang, &mut ctx).unwrap_err();
    assert_eq!(err.pos().line, 2);
    assert_eq!(ctx.seen, ["ok"]);
}

#[test]
fn fallback_receives_unmatched_commands() {
    let lang = Language::new("t")
        .route(Route::exact("a", |p: &Program<'_>, _: &mut Counter, cmd: &Command<'_>| {
            Flow::next(p, cmd)
        }))
        .fallback(record);
    let program = parse("a\nb\na\nc\n", 4).unwrap();
    let mut ctx = Counter::default();
    let summary = run(&program, &lang, &mut ctx).unwrap();
    assert_eq!(ctx.seen, ["b", "c"]);
    assert_eq!(summary.invocations, 4);
}

#[test]
fn deprecated_route_warns_and_runs() {
    let lang = Language::new("t").route(Route::exact("old", record).deprecated());
    let program = parse("old\nold\n", 4).unwrap();
    let mut ctx = Counter::default();
    let summary = run(&program, &lang, &mut ctx).unwrap();
    assert_eq!(ctx.seen, ["old", "old"]);
    assert_eq!(summary.warnings.len(), 2);
    let w = &summary.warnings[1];
    assert_eq!(w.code(), codes::DEPRECATED_COMMAND);
    assert_eq!(w.severity(), Severity::Warn);
    assert_eq!(w.pos().line, 2);
}

#[test]
fn deprecated_loop_keeps_one_warning() {
    let lang = Language::new("t").route(
        Route::exact("old", |_: &Program<'_>, ctx: &mut Counter, cmd: &Command<'_>| {
            ctx.hits += 1;
            if ctx.hits < ctx.limit {
                Flow::Continue(cmd.id())
            } else {
                Flow::Halt
            }
        })
        .deprecated(),
    );
    let program = parse("old\n", 4).unwrap();
    let mut ctx = Counter {
        limit: 10_000,
        ..Counter::default()
    };
    let summary = run(&program, &lang, &mut ctx).unwrap();
    assert_eq!(summary.invocations, 10_000);
    assert_eq!(summary.warnings.len(), 1);
    assert_eq!(summary.warnings[0].code(), codes::DEPRECATED_COMMAND);
}

#[test]
fn stepping_past_the_end_halts_as_handler() {
    let lang = Language::new("t").fallback(record);
    let program = parse("a\nb\n", 4).unwrap();
    let mut ctx = Counter::default();
    let summary = run(&program, &lang, &mut ctx).unwrap();
    assert_eq!(summary.halt, HaltReason::Handler);
    assert_eq!(summary.last, program.tail());
    assert_eq!(ctx.seen, ["a", "b"]);
}

#[test]
fn removed_route_is_invisible() {
    let lang = Language::new("t").route(Route::exact("gone", record).removed());
    let program = parse("gone\n", 4).unwrap();
    let err = run(&program, &lang, &mut Counter::default()).unwrap_err();
    assert_eq!(err.code(), codes::UNKNOWN_COMMAND);
}

#[test]
fn predicate_sees_the_name_part() {
    let lang = Language::new("t").route(Route::predicate(
        |name: &Part<'_>| name.is_quoted(),
        record,
    ));
    let program = parse("\"quoted name\"\n", 4).unwrap();
    let mut ctx = Counter::default();
    run(&program, &lang, &mut ctx).unwrap();
    assert_eq!(ctx.seen, ["quoted name"]);
}

// ── Reserved commands ───────────────────────────────────────────────────

#[test]
fn abort_ends_the_run_without_dispatch() {
    let lang = Language::new("t")
        .route(Route::exact("abort", record))
        .fallback(record);
    let program = parse("a\nabort\nb\n", 4).unwrap();
    let mut ctx = Counter::default();
    let summary = run(&program, &lang, &mut ctx).unwrap();
    assert_eq!(summary.halt, HaltReason::Abort);
    assert_eq!(ctx.seen, ["a"]);
    assert_eq!(summary.invocations, 1);
}

#[test]
fn language_command_is_rejected() {
    let lang = Language::new("demo").fallback(record);
    let program = parse("a\nlanguage other\n", 4).unwrap();
    let mut ctx = Counter::default();
    let err = run(&program, &lang, &mut ctx).unwrap_err();
    assert_eq!(err.code(), codes::LANGUAGE_COMMAND);
    assert_eq!(err.pos().line, 2);
    assert_eq!(ctx.seen, ["a"]);
}

// ── Handler failures ────────────────────────────────────────────────────

#[derive(Debug, PartialEq)]
struct Cleanup(&'static str);

#[test]
fn handler_error_keeps_code_and_payload() {
    let code = ErrorCode::user(404).unwrap();
    let lang = Language::new("t").route(Route::exact(
        "fetch",
        move |_: &Program<'_>, _: &mut Counter, cmd: &Command<'_>| {
            Flow::Fail(
                Diagnostic::error(code, cmd.pos().clone(), "resource not found")
                    .with_payload(Cleanup("close socket")),
            )
        },
    ));
    let program = parse("\nfetch /x\n", 4).unwrap();
    let mut err = run(&program, &lang, &mut Counter::default()).unwrap_err();
    assert_eq!(err.code(), code);
    assert_eq!(err.pos().line, 2);
    assert_eq!(err.message(), "resource not found");
    assert_eq!(err.payload::<Cleanup>(), Some(&Cleanup("close socket")));
    assert!(err.take_payload().is_some());
}

#[test]
fn fail_without_code_is_promoted() {
    let lang = Language::new("t").route(Route::exact(
        "bad",
        |_: &Program<'_>, _: &mut Counter, cmd: &Command<'_>| {
            Flow::Fail(Diagnostic::info(codes::NONE, cmd.pos().clone(), "oops"))
        },
    ));
    let program = parse("bad\n", 4).unwrap();
    let err = run(&program, &lang, &mut Counter::default()).unwrap_err();
    assert_eq!(err.code(), codes::GENERAL);
    assert!(err.is_error());
    assert!(err.message().ends_with("oops"), "{}", err.message());
}

#[test]
fn run_message_is_bounded() {
    let lang = Language::new("t").route(Route::exact(
        "long",
        |_: &Program<'_>, _: &mut Counter, cmd: &Command<'_>| {
            Flow::fail(codes::USER, cmd, "x".repeat(100))
        },
    ));
    let program = parse("long\n", 4).unwrap();
    let err = Engine::new(&lang)
        .options(RunOptions {
            message_capacity: 10,
        })
        .run(&program, &mut Counter::default())
        .unwrap_err();
    assert_eq!(err.message().len(), 10);
    assert_eq!(err.code(), codes::USER);
}

// ── Sharing ─────────────────────────────────────────────────────────────

#[test]
fn language_is_shared_between_threads() {
    let lang = Language::new("t").route(Route::exact(
        "inc",
        |p: &Program<'_>, ctx: &mut Counter, cmd: &Command<'_>| {
            ctx.hits += 1;
            Flow::next(p, cmd)
        },
    ));
    let program = parse("inc\ninc\ninc\n", 4).unwrap();

    let totals: Vec<u32> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                s.spawn(|| {
                    let mut ctx = Counter::default();
                    run(&program, &lang, &mut ctx).unwrap();
                    ctx.hits
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(totals, [3, 3, 3, 3]);
}

#[test]
fn program_built_by_hand_runs() {
    use pl2b_core::SourcePos;

    let mut program = Program::new();
    program
        .push(SourcePos::new("host", 1), Part::bare("a"), vec![Part::quoted("x")])
        .unwrap();
    program
        .push(SourcePos::new("host", 2), Part::bare("b"), vec![])
        .unwrap();
    let lang = Language::new("t").fallback(record);
    let mut ctx = Counter::default();
    run(&program, &lang, &mut ctx).unwrap();
    assert_eq!(ctx.seen, ["a", "b"]);
    assert_eq!(common::shapes(&program)[0].1, vec![("x".to_string(), true)]);
}
