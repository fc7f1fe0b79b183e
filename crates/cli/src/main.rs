mod demo;
mod render;

use std::fs;
use std::io::{self, Read, Write};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pl2b_core::{
    Diagnostic, EngineConfig, ErrorCode, Program, Severity, emit_source, parse_with_options,
    to_pretty_json, version,
};
use pl2b_diagnostics::{self as diag, UNKNOWN_FILE};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::render::{Format, print_summary, render_diagnostics};

// ── CLI definition ──────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "pl2b",
    version,
    about = "PL2B command language: parse, check, format, and run command files"
)]
struct Cli {
    /// Output mode: "pretty" for coloured terminal output, "json" for
    /// machine-readable JSON. Defaults to "pretty" when stdout is a TTY,
    /// "json" otherwise.
    #[arg(long, global = true, value_parser = ["pretty", "json"])]
    output: Option<String>,

    /// Engine configuration file (JSON).
    #[arg(long, global = true)]
    config: Option<String>,

    /// Log engine activity to stderr. Overridden by `RUST_LOG`.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Parse a file and print its program as JSON. Use `-` for stdin.
    Parse { file: String },

    /// Syntax-check a file.
    Check { file: String },

    /// Print a file in normalised form (one command per line).
    Fmt {
        file: String,
        /// Write formatted output back to the file (in-place).
        #[arg(long, short, conflicts_with = "check")]
        write: bool,
        /// Check if the file is already formatted (exit 1 if not). For CI.
        #[arg(long, conflicts_with = "write")]
        check: bool,
    },

    /// Run a file with the built-in demo language (echo, repeat, say).
    Run {
        file: String,
        /// Fail on unknown commands instead of skipping them.
        #[arg(long)]
        strict: bool,
    },

    /// Explain a diagnostic code (e.g. PL010).
    Explain { id: String },
}

// ── Main ────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    tracing::debug!(engine = %version::describe(), "starting");
    let format = Format::resolve_or_detect(cli.output.as_deref());
    let config = load_config(cli.config.as_deref())?;

    match cli.cmd {
        Cmd::Parse { file } => cmd_parse(&file, &config, format)?,
        Cmd::Check { file } => cmd_check(&file, &config, format)?,
        Cmd::Fmt { file, write, check } => cmd_fmt(&file, &config, write, check, format)?,
        Cmd::Run { file, strict } => cmd_run(&file, &config, strict, format)?,
        Cmd::Explain { id } => cmd_explain(&id, format)?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

fn load_config(path: Option<&str>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            EngineConfig::load(path).with_context(|| format!("loading config from {path}"))
        }
        None => Ok(EngineConfig::default()),
    }
}

// ── Commands ────────────────────────────────────────────────────────────

fn cmd_parse(file: &str, config: &EngineConfig, format: Format) -> Result<()> {
    let input = read_input(file)?;
    let name = display_name(file, config);
    let program = match parse_file(&input, &name, config) {
        Ok(program) => program,
        Err(err) => fail(&input, &name, err, format, serde_json::json!({ "program": null })),
    };

    match format {
        Format::Json => {
            let out = serde_json::json!({
                "ok": true,
                "program": program,
                "diagnostics": [],
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Pretty => println!("{}", to_pretty_json(&program)),
    }
    Ok(())
}

fn cmd_check(file: &str, config: &EngineConfig, format: Format) -> Result<()> {
    let input = read_input(file)?;
    let name = display_name(file, config);
    let result = parse_file(&input, &name, config);
    let commands = result.as_ref().map(Program::len).unwrap_or(0);
    let diagnostics: Vec<Diagnostic> = result.err().into_iter().collect();
    let ok = diagnostics.is_empty();

    match format {
        Format::Json => {
            let out = serde_json::json!({
                "ok": ok,
                "commands": commands,
                "diagnostics": diagnostics,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Pretty => {
            render_diagnostics(&input, &name, &diagnostics, format);
            print_summary(&diagnostics);
            if ok {
                eprintln!("syntax ok ({commands} commands)");
            }
        }
    }

    exit_on_errors(&diagnostics);
    Ok(())
}

fn cmd_fmt(
    file: &str,
    config: &EngineConfig,
    write: bool,
    check: bool,
    format: Format,
) -> Result<()> {
    let input = read_input(file)?;
    let name = display_name(file, config);
    let program = match parse_file(&input, &name, config) {
        Ok(program) => program,
        Err(err) => {
            let envelope = serde_json::json!({ "status": "parse error", "file": file });
            fail(&input, &name, err, format, envelope)
        }
    };

    let formatted = emit_source(&program);
    let already_formatted = formatted == input;

    if check {
        status_message(format, already_formatted, "already formatted", "not formatted", file);
        if !already_formatted {
            process::exit(1);
        }
    } else if write {
        if !already_formatted {
            fs::write(file, &formatted).with_context(|| format!("writing {file}"))?;
        }
        status_message(format, !already_formatted, "formatted", "already formatted", file);
    } else {
        io::stdout().write_all(&formatted)?;
    }

    Ok(())
}

/// JSON shape of `pl2b run --output json`.
#[derive(Serialize)]
struct RunReport<'a> {
    ok: bool,
    output: &'a [String],
    halt: Option<String>,
    invocations: Option<u64>,
    skipped: u64,
    diagnostics: &'a [Diagnostic],
}

fn cmd_run(file: &str, config: &EngineConfig, strict: bool, format: Format) -> Result<()> {
    let input = read_input(file)?;
    let name = display_name(file, config);
    let program = match parse_file(&input, &name, config) {
        Ok(program) => program,
        Err(err) => {
            let envelope = serde_json::json!({
                "output": [],
                "halt": null,
                "invocations": null,
                "skipped": 0,
            });
            fail(&input, &name, err, format, envelope)
        }
    };

    let language = demo::language(strict);
    let mut session = demo::Session::default();
    let result = pl2b_core::Engine::new(&language)
        .options(config.run.clone())
        .run(&program, &mut session);

    let (ok, halt, invocations, diagnostics) = match result {
        Ok(summary) => (
            true,
            Some(format!("{:?}", summary.halt)),
            Some(summary.invocations),
            summary.warnings,
        ),
        Err(err) => (false, None, None, vec![err]),
    };

    match format {
        Format::Json => {
            let report = RunReport {
                ok,
                output: &session.output,
                halt,
                invocations,
                skipped: session.skipped,
                diagnostics: &diagnostics,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Format::Pretty => {
            for line in &session.output {
                println!("{line}");
            }
            render_diagnostics(&input, &name, &diagnostics, format);
            print_summary(&diagnostics);
        }
    }

    exit_on_errors(&diagnostics);
    Ok(())
}

fn cmd_explain(id: &str, format: Format) -> Result<()> {
    let text = id.parse::<ErrorCode>().ok().and_then(diag::explain);
    match format {
        Format::Json => {
            let out = serde_json::json!({
                "id": id,
                "explanation": text,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Pretty => {
            // Explanation is the expected output: stdout, not stderr.
            if let Some(text) = text {
                use ariadne::Fmt;
                println!("{}: {}", id.fg(ariadne::Color::Cyan), text);
            } else {
                println!("{id}: (no explanation available)");
            }
        }
    }
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────────────

/// Read a file, or stdin when `file` is `-`.
fn read_input(file: &str) -> Result<Vec<u8>> {
    if file == "-" {
        let mut buf = Vec::new();
        io::stdin()
            .read_to_end(&mut buf)
            .context("reading stdin")?;
        Ok(buf)
    } else {
        fs::read(file).with_context(|| format!("reading {file}"))
    }
}

/// Name attached to positions: the config's file name if set, else the path.
fn display_name(file: &str, config: &EngineConfig) -> String {
    if config.parse.file_name != UNKNOWN_FILE {
        config.parse.file_name.clone()
    } else if file == "-" {
        "<stdin>".to_string()
    } else {
        file.to_string()
    }
}

fn parse_file<'src>(
    input: &'src [u8],
    name: &str,
    config: &EngineConfig,
) -> Result<Program<'src>, Diagnostic> {
    let mut options = config.parse.clone();
    options.file_name = name.to_string();
    tracing::debug!(file = name, bytes = input.len(), "parsing");
    parse_with_options(input, &options)
}

/// Report a parse error and exit with code 1.
///
/// In JSON mode the error is wrapped in `envelope`, the command's usual
/// output object, with `ok: false` and the diagnostic filled in.
fn fail(
    input: &[u8],
    name: &str,
    err: Diagnostic,
    format: Format,
    mut envelope: serde_json::Value,
) -> ! {
    let diagnostics = [err];
    match format {
        Format::Json => {
            if let Some(fields) = envelope.as_object_mut() {
                fields.insert("ok".into(), false.into());
                fields.insert(
                    "diagnostics".into(),
                    serde_json::to_value(&diagnostics).unwrap_or_default(),
                );
            }
            println!("{envelope:#}");
        }
        Format::Pretty => {
            render_diagnostics(input, name, &diagnostics, format);
            print_summary(&diagnostics);
        }
    }
    process::exit(1);
}

/// Emit a status message for --check / --write in the appropriate format.
fn status_message(format: Format, condition: bool, if_true: &str, if_false: &str, file: &str) {
    let msg = if condition { if_true } else { if_false };
    match format {
        Format::Json => {
            let out = serde_json::json!({ "status": msg, "file": file });
            println!(
                "{}",
                serde_json::to_string_pretty(&out).expect("status JSON serialization cannot fail")
            );
        }
        Format::Pretty => {
            eprintln!("{msg}: {file}");
        }
    }
}

/// Exit with code 1 if any diagnostic is an error.
/// Warnings and info do not cause a non-zero exit.
fn exit_on_errors(diagnostics: &[Diagnostic]) {
    if diagnostics
        .iter()
        .any(|d| matches!(d.severity(), Severity::Error))
    {
        process::exit(1);
    }
}
