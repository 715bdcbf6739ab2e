//! Flow diagnostics for flow-lint.
//!
//! This crate holds the data side of the checker integration:
//! - [`Diagnostic`]: one issue tied to a file and a 1-indexed line
//! - [`DiagnosticIndex`]: at most one diagnostic per line, first one wins
//! - [`DiagnosticStore`]: the current index of an open document and whether
//!   it is stale
//!
//! # Example
//!
//! ```
//! use camino::Utf8Path;
//! use flow_diagnostics::{Diagnostic, DiagnosticIndex, DiagnosticStore, Message, Severity};
//!
//! let store = DiagnosticStore::new();
//! let mut index = DiagnosticIndex::new();
//! index.insert_first(Diagnostic::new(
//!     "/project/app.js",
//!     5,
//!     Severity::Error,
//!     Message::text_only("Cannot call `foo` because `foo` is undefined"),
//! ));
//! store.replace(index);
//!
//! for (line, diagnostic) in store.current_diagnostics_for(Utf8Path::new("/project/app.js")) {
//!     println!("{line}: {}", diagnostic.message().text());
//! }
//! ```

mod diagnostic;
mod store;

pub use diagnostic::{Diagnostic, DiagnosticIndex, Message, Severity};
pub use store::{DiagnosticStore, Epoch};
