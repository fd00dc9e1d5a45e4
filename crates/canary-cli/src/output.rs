use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use canary_core::pipeline::{DiagnosticLevel, PassReport};
use canary_core::CanaryError;
use serde::Serialize;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

static JSON_MODE: AtomicBool = AtomicBool::new(false);

pub fn init(json: bool) {
    JSON_MODE.store(json, Ordering::Relaxed);
}

pub fn is_json() -> bool {
    JSON_MODE.load(Ordering::Relaxed)
}

/// Pretty JSON on stdout.
pub fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    println!("{s}");
    Ok(())
}

pub fn stdout() -> StandardStream {
    StandardStream::stdout(ColorChoice::Auto)
}

pub fn stderr() -> StandardStream {
    StandardStream::stderr(ColorChoice::Auto)
}

/// Human-readable pass summary.
pub fn write_report(w: &mut impl WriteColor, report: &PassReport) -> io::Result<()> {
    if report.is_noop() {
        writeln!(w, "no function declares a deployment preference, template unchanged")?;
    }

    for id in &report.added {
        w.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        write!(w, "  + ")?;
        w.reset()?;
        writeln!(w, "{id}")?;
    }
    for id in &report.rewritten {
        w.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
        write!(w, "  ~ ")?;
        w.reset()?;
        writeln!(w, "{id}")?;
    }

    for d in &report.diagnostics {
        let (label, color) = match d.level {
            DiagnosticLevel::Info => ("info", Color::Cyan),
            DiagnosticLevel::Warning => ("warning", Color::Yellow),
        };
        w.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
        write!(w, "{label}")?;
        w.reset()?;
        writeln!(w, "[{}]: {}", d.code, d.message)?;
    }

    writeln!(
        w,
        "{} added, {} rewritten",
        report.added.len(),
        report.rewritten.len()
    )
}

#[derive(Debug, Serialize)]
struct ErrorOut<'a> {
    ok: bool,
    code: &'a str,
    message: String,
}

/// Print a failed command: JSON on stdout in JSON mode, colored text on stderr otherwise.
pub fn report_error(err: &anyhow::Error) {
    if is_json() {
        let code = err
            .downcast_ref::<CanaryError>()
            .map(CanaryError::code)
            .unwrap_or("cli");
        let out = ErrorOut {
            ok: false,
            code,
            message: format!("{err:#}"),
        };
        if print(&out).is_ok() {
            return;
        }
    }

    let mut w = stderr();
    let _ = w.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
    let _ = write!(w, "error");
    let _ = w.reset();
    let _ = writeln!(w, ": {err:#}");
}
