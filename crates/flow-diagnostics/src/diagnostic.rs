//! Diagnostic types.

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// A single issue reported by the checker.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    path: Utf8PathBuf,
    line: u32,
    severity: Severity,
    message: Message,
}

impl Diagnostic {
    /// Creates a new diagnostic.
    pub fn new(
        path: impl Into<Utf8PathBuf>,
        line: u32,
        severity: Severity,
        message: Message,
    ) -> Self {
        Self {
            path: path.into(),
            line,
            severity,
            message,
        }
    }

    /// The file the checker attributed this diagnostic to.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// 1-indexed line number, as reported by the checker.
    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &Message {
        &self.message
    }
}

/// The checker's message payload.
///
/// `text` is the human-readable description; `payload` keeps the raw entry
/// so consumers can reach checker-specific fields (columns, blame type, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    text: String,
    payload: Value,
}

impl Message {
    /// Creates a new message.
    pub fn new(text: impl Into<String>, payload: Value) -> Self {
        Self {
            text: text.into(),
            payload,
        }
    }

    /// Creates a message with no checker payload.
    pub fn text_only(text: impl Into<String>) -> Self {
        Self::new(text, Value::Null)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }
}

/// The severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Severity {
    /// A warning that doesn't fail the check.
    Warning,
    /// A type error.
    #[default]
    Error,
}

impl Severity {
    /// Maps the checker's `level` field. Unknown levels are treated as errors.
    pub fn from_level(level: &str) -> Self {
        if level.eq_ignore_ascii_case("warning") {
            Severity::Warning
        } else {
            Severity::Error
        }
    }

    pub fn is_error(self) -> bool {
        matches!(self, Severity::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line number to diagnostic mapping, per file.
///
/// Holds at most one diagnostic per line of a file. First-wins applies per
/// file: the first diagnostic inserted for a line of a file wins and later
/// ones for that same file and line are dropped, while the same line number
/// in another file is kept separately. Iteration is ordered
/// by path, then line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagnosticIndex {
    files: BTreeMap<Utf8PathBuf, BTreeMap<u32, Diagnostic>>,
    len: usize,
}

impl DiagnosticIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `diagnostic` unless its line is already taken.
    ///
    /// Returns `true` if the diagnostic was stored.
    pub fn insert_first(&mut self, diagnostic: Diagnostic) -> bool {
        let lines = self.files.entry(diagnostic.path.clone()).or_default();
        match lines.entry(diagnostic.line) {
            Entry::Vacant(slot) => {
                slot.insert(diagnostic);
                self.len += 1;
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn get(&self, path: &Utf8Path, line: u32) -> Option<&Diagnostic> {
        self.files.get(path)?.get(&line)
    }

    /// Number of indexed lines, across all files.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates every diagnostic, ordered by path, then line.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.files.values().flat_map(|lines| lines.values())
    }

    /// Diagnostics whose own path is `path`, in line order.
    pub fn for_path(&self, path: &Utf8Path) -> Vec<(u32, Diagnostic)> {
        self.files
            .get(path)
            .map(|lines| {
                lines
                    .iter()
                    .map(|(line, diag)| (*line, diag.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl FromIterator<Diagnostic> for DiagnosticIndex {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        let mut index = Self::new();
        for diagnostic in iter {
            index.insert_first(diagnostic);
        }
        index
    }
}
