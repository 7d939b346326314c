//! Structured JSON logger for the ORD document provider, plus
//! `ObservationScope`, a thin RAII wrapper that logs the begin/complete/
//! failed/incomplete events around one named unit of work (currently just
//! the update scheduler's fetch-validate-swap pipeline).
//!
//! - Structured logs (JSON), one line per event
//! - Deterministic key ordering (sorted alphabetically)
//! - The minimum severity emitted is controlled by the `LOG_LEVEL`
//!   environment variable, read once at first use and cached
//!   (case-insensitive, defaults to `Info`)

use std::cell::Cell;
use std::fmt;
use std::io::{self, Write};
use std::sync::OnceLock;

/// Log severity levels, from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Trace = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
    /// Unrecoverable, process exits.
    Fatal = 4,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    /// Parses a `LOG_LEVEL` value; unrecognized values fall back to `Info`.
    fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "TRACE" => Severity::Trace,
            "INFO" => Severity::Info,
            "WARN" | "WARNING" => Severity::Warn,
            "ERROR" => Severity::Error,
            "FATAL" => Severity::Fatal,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn min_severity() -> Severity {
    static MIN: OnceLock<Severity> = OnceLock::new();
    *MIN.get_or_init(|| {
        std::env::var("LOG_LEVEL")
            .map(|v| Severity::parse(&v))
            .unwrap_or(Severity::Info)
    })
}

/// A structured logger that outputs one JSON object per line.
pub struct Logger;

impl Logger {
    fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if severity < min_severity() {
            return;
        }
        Self::write(severity, event, fields, &mut io::stdout());
    }

    fn log_stderr(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if severity < min_severity() {
            return;
        }
        Self::write(severity, event, fields, &mut io::stderr());
    }

    /// Builds the JSON line by hand (no allocating serializer) so field
    /// order is deterministic: `event`, `severity`, then fields sorted
    /// alphabetically by key.
    fn write<W: Write>(severity: Severity, event: &str, fields: &[(&str, &str)], writer: &mut W) {
        let mut output = String::with_capacity(256);

        output.push('{');
        output.push_str("\"event\":\"");
        escape_json_string(&mut output, event);
        output.push('"');

        output.push_str(",\"severity\":\"");
        output.push_str(severity.as_str());
        output.push('"');

        let mut sorted_fields: Vec<_> = fields.iter().collect();
        sorted_fields.sort_by_key(|(k, _)| *k);

        for (key, value) in sorted_fields {
            output.push_str(",\"");
            escape_json_string(&mut output, key);
            output.push_str("\":\"");
            escape_json_string(&mut output, value);
            output.push('"');
        }

        output.push('}');
        output.push('\n');

        let _ = writer.write_all(output.as_bytes());
        let _ = writer.flush();
    }

    pub fn trace(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Trace, event, fields);
    }

    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log_stderr(Severity::Error, event, fields);
    }

    pub fn fatal(event: &str, fields: &[(&str, &str)]) {
        Self::log_stderr(Severity::Fatal, event, fields);
    }
}

fn escape_json_string(output: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => output.push_str("\\\""),
            '\\' => output.push_str("\\\\"),
            '\n' => output.push_str("\\n"),
            '\r' => output.push_str("\\r"),
            '\t' => output.push_str("\\t"),
            c if c.is_control() => output.push_str(&format!("\\u{:04x}", c as u32)),
            c => output.push(c),
        }
    }
}

/// Logs `{name}_BEGIN` on creation, `{name}_COMPLETE`/`{name}_FAILED` when
/// told how the unit of work ended, and `{name}_INCOMPLETE` on drop if
/// neither happened.
pub struct ObservationScope<'a> {
    name: &'a str,
    completed: Cell<bool>,
}

impl<'a> ObservationScope<'a> {
    pub fn new(name: &'a str) -> Self {
        Logger::info(&format!("{}_BEGIN", name), &[]);
        Self {
            name,
            completed: Cell::new(false),
        }
    }

    pub fn complete(self) {
        self.completed.set(true);
        Logger::info(&format!("{}_COMPLETE", self.name), &[]);
    }

    pub fn fail(self, reason: &str) {
        self.completed.set(true);
        Logger::error(&format!("{}_FAILED", self.name), &[("reason", reason)]);
    }
}

impl Drop for ObservationScope<'_> {
    fn drop(&mut self) {
        if !self.completed.get() {
            Logger::warn(
                &format!("{}_INCOMPLETE", self.name),
                &[("reason", "scope dropped without completion")],
            );
        }
    }
}

/// Captures a log line to a buffer for testing, bypassing the `LOG_LEVEL` gate.
#[cfg(test)]
fn capture_log(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
    let mut buffer = Vec::new();
    Logger::write(severity, event, fields, &mut buffer);
    String::from_utf8(buffer).unwrap()
}
