//! Main orchestration logic.

use crate::cli::OutputFormat;
use crate::config::LintConfig;
use crate::output::{include_severity, CheckSummary, FormattedDiagnostic, Formatter};
use camino::{Utf8Path, Utf8PathBuf};
use flow_diagnostics::Diagnostic;
use flow_runner::{
    is_checkable, Checker, CycleOutcome, FlowRunner, RefreshHandle, RefreshScheduler, Signal,
};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

/// Orchestration errors.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A path could not be resolved.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// `--stdin` was given with the wrong number of files.
    #[error("--stdin needs exactly one file, got {0}")]
    StdinNeedsOneFile(usize),

    /// Failed to read the buffer from stdin.
    #[error("failed to read stdin: {0}")]
    StdinFailed(#[source] std::io::Error),

    /// None of the given files can be checked.
    #[error("no JavaScript files to check")]
    NoFiles,

    /// Watch error.
    #[error("watch error: {0}")]
    WatchFailed(String),
}

/// One open document.
struct Session<C: Checker = FlowRunner> {
    scheduler: RefreshScheduler<C>,
    /// Error of the last cycle, if it failed.
    last_error: Option<String>,
}

impl<C: Checker> Session<C> {
    fn file(&self) -> &Utf8Path {
        self.scheduler.file()
    }

    fn record(&mut self, outcome: &CycleOutcome) {
        self.last_error = match outcome {
            CycleOutcome::Applied { .. } => None,
            CycleOutcome::Failed(e) => Some(e.to_string()),
        };
    }
}

/// Runs flow-lint with the resolved configuration.
pub async fn run(config: LintConfig) -> Result<CheckSummary, OrchestratorError> {
    let runner = Arc::new(FlowRunner::new(config.flow_bin.clone()));

    let mut sessions = Vec::new();
    for file in &config.files {
        if !is_checkable(file) {
            tracing::warn!(file = %file, "skipping file that is not JavaScript");
            continue;
        }
        sessions.push(Session {
            scheduler: RefreshScheduler::new(file.clone(), Arc::clone(&runner)),
            last_error: None,
        });
    }

    if sessions.is_empty() {
        return Err(OrchestratorError::NoFiles);
    }

    if config.stdin {
        return run_stdin_check(&config, &mut sessions[0]).await;
    }

    if config.watch {
        return run_watch_mode(&config, sessions).await;
    }

    run_single_check(&config, &mut sessions).await
}

/// Checks every session once, concurrently.
async fn run_single_check(
    config: &LintConfig,
    sessions: &mut [Session],
) -> Result<CheckSummary, OrchestratorError> {
    let handles: Vec<Option<RefreshHandle>> = sessions
        .iter()
        .map(|session| session.scheduler.refresh())
        .collect();

    for (session, handle) in sessions.iter_mut().zip(handles) {
        if let Some(handle) = handle {
            let outcome = handle.outcome().await;
            session.record(&outcome);
        }
    }

    Ok(render(config, sessions, None))
}

/// Checks the unsaved buffer read from stdin in place of the file on disk.
async fn run_stdin_check(
    config: &LintConfig,
    session: &mut Session,
) -> Result<CheckSummary, OrchestratorError> {
    let mut contents = String::new();
    tokio::io::stdin()
        .read_to_string(&mut contents)
        .await
        .map_err(OrchestratorError::StdinFailed)?;

    if let Some(handle) = session.scheduler.check_contents(contents.clone()) {
        let outcome = handle.outcome().await;
        session.record(&outcome);
    }

    Ok(render(
        config,
        std::slice::from_mut(session),
        Some(contents.as_str()),
    ))
}

/// Prints the current diagnostics of every session and returns the summary.
///
/// `buffer` replaces the on-disk text of a single session for source
/// snippets.
fn render(config: &LintConfig, sessions: &[Session], buffer: Option<&str>) -> CheckSummary {
    let formatter = Formatter::new(config.output);
    let mut summary = CheckSummary {
        file_count: sessions.len(),
        fail_on_warnings: config.fail_on_warnings,
        ..Default::default()
    };
    let mut json = Vec::<FormattedDiagnostic>::new();

    for session in sessions {
        let file = session.file();

        if let Some(error) = &session.last_error {
            summary.unchecked_count += 1;
            eprintln!("Error: could not check {}: {}", file, error);
        }

        let diagnostics: Vec<(u32, Diagnostic)> = session
            .scheduler
            .store()
            .current_diagnostics_for(file)
            .into_iter()
            .filter(|(_, diag)| include_severity(diag.severity(), config.threshold))
            .collect();
        summary.record(&diagnostics);

        match config.output {
            OutputFormat::Json => {
                json.extend(Formatter::format_json_diagnostics(&diagnostics, file));
            }
            OutputFormat::HumanVerbose => {
                let source = match buffer {
                    Some(text) => Some(text.to_string()),
                    None => std::fs::read_to_string(file).ok(),
                };
                print!("{}", formatter.format(&diagnostics, file, source.as_deref()));
            }
            OutputFormat::Human | OutputFormat::Machine => {
                print!("{}", formatter.format(&diagnostics, file, None));
            }
        }
    }

    match config.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
        }
        OutputFormat::Human | OutputFormat::HumanVerbose => {
            println!("{}", summary.format());
        }
        OutputFormat::Machine => {}
    }

    summary
}

/// Runs in watch mode.
///
/// A change to a checked file on disk is a save; when a cycle finishes after
/// the file changed again, a clean layout pass picks up the missed save.
async fn run_watch_mode(
    config: &LintConfig,
    mut sessions: Vec<Session>,
) -> Result<CheckSummary, OrchestratorError> {
    use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
    use std::time::Duration;

    println!("Starting watch mode...\n");

    run_single_check(config, &mut sessions).await?;

    let (tx, mut rx) = mpsc::channel(100);
    let (done_tx, mut done_rx) = mpsc::channel::<(usize, CycleOutcome)>(16);

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| {
            if let Ok(event) = res {
                let _ = tx.blocking_send(event);
            }
        },
        Config::default().with_poll_interval(Duration::from_secs(1)),
    )
    .map_err(|e| OrchestratorError::WatchFailed(e.to_string()))?;

    let dirs: BTreeSet<Utf8PathBuf> = sessions
        .iter()
        .filter_map(|session| session.file().parent().map(Utf8Path::to_owned))
        .collect();
    for dir in &dirs {
        watcher
            .watch(dir.as_std_path(), RecursiveMode::NonRecursive)
            .map_err(|e| OrchestratorError::WatchFailed(e.to_string()))?;
    }

    println!("Watching for changes... (Ctrl+C to stop)\n");

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    handle_change(&sessions, &event.paths, &done_tx);
                }
            }
            Some((idx, outcome)) = done_rx.recv() => {
                handle_outcome(&mut sessions, idx, outcome, &done_tx);

                if !config.preserve_watch_output {
                    // Clear screen
                    print!("\x1B[2J\x1B[1;1H");
                }
                render(config, &sessions, None);
            }
        }
    }

    Err(OrchestratorError::WatchFailed(
        "watch channel closed unexpectedly".to_string(),
    ))
}

/// Sends `Saved` to every session whose file is among `paths`. Returns the
/// number of cycles started.
fn handle_change<C: Checker>(
    sessions: &[Session<C>],
    paths: &[PathBuf],
    done_tx: &mpsc::Sender<(usize, CycleOutcome)>,
) -> usize {
    let mut started = 0;
    for (idx, session) in sessions.iter().enumerate() {
        if paths.iter().any(|p| same_file(p, session.file())) {
            tracing::debug!(file = %session.file(), "file changed");
            if forward(idx, session.scheduler.signal(Signal::Saved), done_tx) {
                started += 1;
            }
        }
    }
    started
}

/// Records a finished cycle. A cycle overtaken by a change is followed by a
/// clean layout pass, which re-checks the still stale session; failed cycles
/// are not retried. Returns whether a trailing cycle was started.
fn handle_outcome<C: Checker>(
    sessions: &mut [Session<C>],
    idx: usize,
    outcome: CycleOutcome,
    done_tx: &mpsc::Sender<(usize, CycleOutcome)>,
) -> bool {
    let Some(session) = sessions.get_mut(idx) else {
        return false;
    };
    session.record(&outcome);

    match outcome {
        CycleOutcome::Applied { fresh: false, .. } => {
            let handle = session
                .scheduler
                .signal(Signal::LayoutChanged { dirty: false });
            forward(idx, handle, done_tx)
        }
        _ => false,
    }
}

/// Reports the outcome of `handle` on `done_tx` once the cycle ends.
/// Returns whether there was a cycle to wait for.
fn forward(
    idx: usize,
    handle: Option<RefreshHandle>,
    done_tx: &mpsc::Sender<(usize, CycleOutcome)>,
) -> bool {
    let Some(handle) = handle else {
        return false;
    };
    let done_tx = done_tx.clone();
    tokio::spawn(async move {
        let outcome = handle.outcome().await;
        let _ = done_tx.send((idx, outcome)).await;
    });
    true
}

/// Compares a watcher path with a session file, resolving symlinks on the
/// watcher side when possible.
fn same_file(event_path: &std::path::Path, file: &Utf8Path) -> bool {
    if event_path == file.as_std_path() {
        return true;
    }
    event_path
        .canonicalize()
        .map(|p| p == file.as_std_path())
        .unwrap_or(false)
}
