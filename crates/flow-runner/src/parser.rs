//! flow output parser.

use crate::runner::FlowError;
use flow_diagnostics::{Diagnostic, DiagnosticIndex, Message, Severity};
use serde::Deserialize;
use serde_json::Value;

/// Top level of `flow --json` / `flow check-contents --json`.
#[derive(Debug, Deserialize)]
struct FlowOutput {
    errors: Vec<FlowErrorEntry>,
}

/// One reported error. Its messages are kept as raw JSON: they are the
/// opaque payload handed to consumers.
#[derive(Debug, Deserialize)]
struct FlowErrorEntry {
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    message: Vec<Value>,
}

/// Parses flow's JSON output into a line index.
///
/// Messages are visited in the order flow emitted them; the first message
/// seen for a line of a file owns it. Messages without a path or a positive line
/// (flow's location-less explanation fragments) are skipped.
pub fn parse_flow_output(output: &str) -> Result<DiagnosticIndex, FlowError> {
    if output.trim().is_empty() {
        return Err(FlowError::EmptyOutput);
    }

    let parsed: FlowOutput =
        serde_json::from_str(output).map_err(|e| FlowError::ParseFailed(e.to_string()))?;

    let mut index = DiagnosticIndex::new();
    for error in parsed.errors {
        let severity = error
            .level
            .as_deref()
            .map(Severity::from_level)
            .unwrap_or_default();

        for message in error.message {
            if let Some(diagnostic) = parse_message(message, severity) {
                index.insert_first(diagnostic);
            }
        }
    }

    Ok(index)
}

/// Parses flow output, logging any failure and returning an empty index
/// instead. Use [`parse_flow_output`] to tell a failure apart from "no
/// errors".
pub fn parse_or_empty(output: &str) -> DiagnosticIndex {
    match parse_flow_output(output) {
        Ok(index) => index,
        Err(FlowError::EmptyOutput) => DiagnosticIndex::new(),
        Err(e) => {
            tracing::warn!(error = %e, "discarding unparseable flow output");
            DiagnosticIndex::new()
        }
    }
}

fn parse_message(message: Value, severity: Severity) -> Option<Diagnostic> {
    let line = message
        .get("line")
        .and_then(Value::as_u64)
        .and_then(|line| u32::try_from(line).ok())
        .filter(|line| *line >= 1)?;
    let path = message
        .get("path")
        .and_then(Value::as_str)
        .filter(|path| !path.is_empty())?
        .to_string();
    let text = message
        .get("descr")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Some(Diagnostic::new(
        path,
        line,
        severity,
        Message::new(text, message),
    ))
}
