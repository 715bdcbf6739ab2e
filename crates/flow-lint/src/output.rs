//! Output formatting.

use crate::cli::{OutputFormat, Threshold};
use camino::Utf8Path;
use flow_diagnostics::{Diagnostic, Severity};
use serde::Serialize;
use serde_json::Value;

/// A formatted diagnostic for output.
#[derive(Debug, Serialize)]
pub struct FormattedDiagnostic {
    /// The diagnostic type (Error, Warning).
    #[serde(rename = "type")]
    pub diagnostic_type: String,
    /// The file path.
    pub filename: String,
    /// 1-indexed line number.
    pub line: u32,
    /// The message.
    pub message: String,
    /// The source of the diagnostic.
    pub source: String,
    /// The checker's raw message entry.
    pub raw: Value,
}

/// Formats diagnostics for output.
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    /// Creates a new formatter.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the diagnostics of one document.
    ///
    /// `source` is the document text, used for snippets in verbose output.
    /// JSON output is produced by [`Formatter::format_json_diagnostics`]
    /// instead, so that a whole run prints a single array.
    pub fn format(
        &self,
        diagnostics: &[(u32, Diagnostic)],
        file_path: &Utf8Path,
        source: Option<&str>,
    ) -> String {
        match self.format {
            OutputFormat::Human => self.format_human(diagnostics, file_path),
            OutputFormat::HumanVerbose => {
                self.format_human_verbose(diagnostics, file_path, source.unwrap_or_default())
            }
            OutputFormat::Json => {
                let formatted = Self::format_json_diagnostics(diagnostics, file_path);
                serde_json::to_string_pretty(&formatted).unwrap_or_default()
            }
            OutputFormat::Machine => self.format_machine(diagnostics, file_path),
        }
    }

    /// Formats as human-readable output.
    fn format_human(&self, diagnostics: &[(u32, Diagnostic)], file_path: &Utf8Path) -> String {
        let mut output = String::new();

        for (line, diag) in diagnostics {
            output.push_str(&format!(
                "{}:{}\n{}: {}\n\n",
                file_path,
                line,
                severity_label(diag.severity()),
                diag.message().text(),
            ));
        }

        output
    }

    /// Formats as human-readable output with the source line.
    fn format_human_verbose(
        &self,
        diagnostics: &[(u32, Diagnostic)],
        file_path: &Utf8Path,
        source: &str,
    ) -> String {
        let lines: Vec<&str> = source.lines().collect();
        let mut output = String::new();

        for (line, diag) in diagnostics {
            output.push_str(&format!(
                "{}:{}\n{}: {}\n",
                file_path,
                line,
                severity_label(diag.severity()),
                diag.message().text(),
            ));

            if let Some(text) = line.checked_sub(1).and_then(|i| lines.get(i as usize)) {
                output.push_str(&format!("  {} | {}\n", line, text));
            }

            output.push('\n');
        }

        output
    }

    /// Formats diagnostics into JSON-ready structs.
    pub fn format_json_diagnostics(
        diagnostics: &[(u32, Diagnostic)],
        file_path: &Utf8Path,
    ) -> Vec<FormattedDiagnostic> {
        diagnostics
            .iter()
            .map(|(line, diag)| FormattedDiagnostic {
                diagnostic_type: severity_label(diag.severity()).to_string(),
                filename: file_path.to_string(),
                line: *line,
                message: diag.message().text().to_string(),
                source: "flow".to_string(),
                raw: diag.message().payload().clone(),
            })
            .collect()
    }

    /// Formats as machine-readable output.
    fn format_machine(&self, diagnostics: &[(u32, Diagnostic)], file_path: &Utf8Path) -> String {
        let mut output = String::new();

        for (line, diag) in diagnostics {
            let severity = match diag.severity() {
                Severity::Error => "ERROR",
                Severity::Warning => "WARNING",
            };

            output.push_str(&format!(
                "{} {}:{} {}\n",
                severity,
                file_path,
                line,
                diag.message().text().replace('\n', " ")
            ));
        }

        output
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "Error",
        Severity::Warning => "Warning",
    }
}

/// Returns whether diagnostics of `severity` pass `threshold`.
pub fn include_severity(severity: Severity, threshold: Threshold) -> bool {
    match threshold {
        Threshold::Error => severity.is_error(),
        Threshold::Warning => true,
    }
}

/// Summary of a check run.
#[derive(Debug, Default)]
pub struct CheckSummary {
    /// Number of files checked.
    pub file_count: usize,
    /// Number of files flow could not check.
    pub unchecked_count: usize,
    /// Number of errors.
    pub error_count: usize,
    /// Number of warnings.
    pub warning_count: usize,
    /// Whether to fail on warnings.
    pub fail_on_warnings: bool,
}

impl CheckSummary {
    /// Counts `diagnostics` into the summary.
    pub fn record(&mut self, diagnostics: &[(u32, Diagnostic)]) {
        for (_, diag) in diagnostics {
            match diag.severity() {
                Severity::Error => self.error_count += 1,
                Severity::Warning => self.warning_count += 1,
            }
        }
    }

    /// Whether the run should exit with a failure code.
    pub fn failed(&self) -> bool {
        self.error_count > 0 || (self.warning_count > 0 && self.fail_on_warnings)
    }

    /// Formats the summary line.
    pub fn format(&self) -> String {
        let error_word = if self.error_count == 1 {
            "error"
        } else {
            "errors"
        };
        let warning_word = if self.warning_count == 1 {
            "warning"
        } else {
            "warnings"
        };
        let file_word = if self.file_count == 1 {
            "file"
        } else {
            "files"
        };

        let mut summary = format!(
            "====================================\nflow-lint found {} {} and {} {} in {} {}",
            self.error_count,
            error_word,
            self.warning_count,
            warning_word,
            self.file_count,
            file_word
        );
        if self.unchecked_count > 0 {
            summary.push_str(&format!(
                " ({} could not be checked)",
                self.unchecked_count
            ));
        }
        summary
    }
}
