//! flow process runner for JavaScript type-checking.
//!
//! This crate drives Flow to produce diagnostics for an open document:
//! - `locate`: find the directory holding the nearest `.flowconfig`
//! - `runner`: run `flow --json` (or `flow check-contents`) in that directory
//! - `parser`: turn flow's JSON into a [`flow_diagnostics::DiagnosticIndex`]
//! - `scheduler`: single-flight refresh cycles feeding a per-document
//!   [`flow_diagnostics::DiagnosticStore`]
//!
//! # Example
//!
//! ```ignore
//! use flow_runner::{FlowRunner, RefreshScheduler, Signal};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let scheduler = RefreshScheduler::new("/path/to/project/src/app.js", Arc::new(FlowRunner::default()));
//!
//!     if let Some(cycle) = scheduler.signal(Signal::Saved) {
//!         cycle.outcome().await;
//!     }
//!
//!     for (line, diag) in scheduler.store().current_diagnostics_for(scheduler.file()) {
//!         println!("{}: {}", line, diag.message().text());
//!     }
//! }
//! ```

mod locate;
mod parser;
mod runner;
mod scheduler;

pub use locate::{locate_project_root, locate_project_root_within, FLOWCONFIG, MAX_ROOT_ASCENT};
pub use parser::{parse_flow_output, parse_or_empty};
pub use runner::{is_checkable, CheckMode, CheckRequest, FlowError, FlowRunner, CHECKABLE_EXTENSIONS};
pub use scheduler::{Checker, CycleOutcome, RefreshHandle, RefreshScheduler, RefreshState, Signal};
