//! Pretty diagnostic rendering using ariadne.
//!
//! Converts engine [`Diagnostic`]s into ariadne [`Report`]s for coloured,
//! source-annotated terminal output. Positions are whole lines, so the
//! label covers the reported line. Falls back to structured JSON when the
//! output is piped or when the user explicitly requests it.

use std::io::{self, IsTerminal};

use ariadne::{Color, Config, IndexType, Label, Report, ReportKind, Source};
use pl2b_diagnostics::{Diagnostic, LineIndex, Severity};

// ── Output format ───────────────────────────────────────────────────────

/// Output format for diagnostic rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Format {
    /// Coloured, source-annotated output (ariadne).
    Pretty,
    /// Machine-readable JSON.
    Json,
}

impl Format {
    /// Use the explicit choice, or detect from whether stdout is a TTY.
    pub(crate) fn resolve_or_detect(explicit: Option<&str>) -> Self {
        match explicit {
            Some("json") => Format::Json,
            Some("pretty") => Format::Pretty,
            _ => {
                if io::stdout().is_terminal() {
                    Format::Pretty
                } else {
                    Format::Json
                }
            }
        }
    }
}

// ── Severity mapping ────────────────────────────────────────────────────

fn report_kind(severity: Severity) -> ReportKind<'static> {
    match severity {
        Severity::Error => ReportKind::Error,
        Severity::Warn => ReportKind::Warning,
        Severity::Info => ReportKind::Advice,
        _ => ReportKind::Warning,
    }
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Error => Color::Red,
        Severity::Warn => Color::Yellow,
        Severity::Info => Color::Blue,
        _ => Color::White,
    }
}

// ── Pretty rendering ────────────────────────────────────────────────────

/// Render diagnostics in pretty (ariadne) format to stderr.
///
/// Diagnostics whose line exists in `source` are rendered with source
/// context. The others (line 0, or a position in another file) are printed
/// as standalone messages.
pub(crate) fn render_diagnostics_pretty(source: &[u8], filename: &str, diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }

    let text = String::from_utf8_lossy(source);
    let index = LineIndex::new(text.as_bytes());
    let config = Config::default()
        .with_compact(false)
        .with_index_type(IndexType::Byte);
    let mut cache = (filename, Source::from(text.as_ref()));

    for diag in diagnostics {
        let span = (&*diag.pos().file == filename)
            .then(|| index.line_range(diag.pos().line))
            .flatten();
        let code = diag.code().to_string();

        if let Some(range) = span {
            let mut builder = Report::build(report_kind(diag.severity()), (filename, range.clone()))
                .with_code(&code)
                .with_message(diag.message())
                .with_config(config)
                .with_label(
                    Label::new((filename, range))
                        .with_message(diag.message())
                        .with_color(severity_color(diag.severity())),
                );

            if let Some(explanation) = diag.explain() {
                builder = builder.with_help(explanation);
            }

            builder.finish().eprint(&mut cache).ok();
        } else {
            eprintln!("{diag}");
            if let Some(explanation) = diag.explain() {
                eprintln!("  = help: {explanation}");
            }
        }
    }
}

// ── JSON rendering ──────────────────────────────────────────────────────

/// Render diagnostics as a JSON array to stdout.
pub(crate) fn render_diagnostics_json(diagnostics: &[Diagnostic]) {
    let json =
        serde_json::to_string_pretty(diagnostics).expect("Diagnostic serialization cannot fail");
    println!("{json}");
}

// ── Unified entry point ─────────────────────────────────────────────────

/// Render diagnostics in the given format.
///
/// - `Pretty` → coloured output to stderr (program data stays on stdout).
/// - `Json`   → JSON array to stdout.
pub(crate) fn render_diagnostics(
    source: &[u8],
    filename: &str,
    diagnostics: &[Diagnostic],
    format: Format,
) {
    match format {
        Format::Pretty => render_diagnostics_pretty(source, filename, diagnostics),
        Format::Json => render_diagnostics_json(diagnostics),
    }
}

// ── Summary line ────────────────────────────────────────────────────────

/// Print a coloured summary line showing error/warning/info counts.
///
/// Example: `1 error, 2 warnings`
pub(crate) fn print_summary(diagnostics: &[Diagnostic]) {
    use ariadne::Fmt;

    let (mut errors, mut warnings, mut infos) = (0usize, 0usize, 0usize);
    for d in diagnostics {
        match d.severity() {
            Severity::Error => errors += 1,
            Severity::Warn => warnings += 1,
            Severity::Info => infos += 1,
            _ => warnings += 1,
        }
    }

    if errors + warnings + infos == 0 {
        return;
    }

    let mut parts = Vec::new();
    if errors > 0 {
        let s = if errors == 1 { "" } else { "s" };
        parts.push(format!("{}", format!("{errors} error{s}").fg(Color::Red)));
    }
    if warnings > 0 {
        let s = if warnings == 1 { "" } else { "s" };
        parts.push(format!(
            "{}",
            format!("{warnings} warning{s}").fg(Color::Yellow)
        ));
    }
    if infos > 0 {
        parts.push(format!("{}", format!("{infos} info").fg(Color::Blue)));
    }
    eprintln!("{}", parts.join(", "));
}
