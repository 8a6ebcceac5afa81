use serde::Deserialize;

use crate::core::traits::backend::{BackendError, Severity};

/// One line of `rustc --error-format=json` output.
#[derive(Debug, Deserialize)]
struct RustcMessage {
    #[serde(rename = "$message_type", default)]
    message_type: Option<String>,
    message: String,
    code: Option<RustcCode>,
    level: String,
    #[serde(default)]
    spans: Vec<RustcSpan>,
}

#[derive(Debug, Deserialize)]
struct RustcCode {
    code: String,
}

#[derive(Debug, Deserialize)]
struct RustcSpan {
    line_start: u32,
    column_start: u32,
    #[serde(default)]
    is_primary: bool,
}

#[derive(Debug, Default, PartialEq)]
pub struct ParsedDiagnostics {
    /// Errors and warnings in the order rustc printed them. Errors that
    /// point nowhere in the source have line and column 0.
    pub entries: Vec<BackendError>,
}

impl ParsedDiagnostics {
    pub fn errors(&self) -> impl Iterator<Item = &BackendError> {
        self.entries.iter().filter(|e| e.severity == Severity::Error)
    }

    /// True when at least one error points into the source.
    pub fn has_source_errors(&self) -> bool {
        self.errors().any(|e| e.line > 0)
    }
}

pub fn parse(stderr: &str) -> ParsedDiagnostics {
    let entries = stderr
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .filter_map(|line| match serde_json::from_str::<RustcMessage>(line) {
            Ok(msg) => Some(msg),
            Err(e) => {
                tracing::debug!("Skipping unparsable compiler output line: {}", e);
                None
            }
        })
        .filter(|msg| msg.message_type.as_deref().is_none_or(|t| t == "diagnostic"))
        .filter_map(into_backend_error)
        .collect();

    ParsedDiagnostics { entries }
}

fn into_backend_error(msg: RustcMessage) -> Option<BackendError> {
    let severity = match msg.level.as_str() {
        level if level.starts_with("error") => Severity::Error,
        "warning" => Severity::Warning,
        _ => return None,
    };

    let span = msg
        .spans
        .iter()
        .find(|s| s.is_primary)
        .or_else(|| msg.spans.first());

    if span.is_none() {
        match severity {
            // Summary lines ("aborting due to 2 previous errors", "1 warning emitted")
            Severity::Error if msg.message.starts_with("aborting due to") => return None,
            Severity::Warning => return None,
            Severity::Error => {}
        }
    }

    Some(BackendError {
        severity,
        line: span.map(|s| s.line_start).unwrap_or(0),
        column: span.map(|s| s.column_start).unwrap_or(0),
        code: msg.code.map(|c| c.code).unwrap_or_default(),
        message: msg.message,
    })
}
