//! Single-flight diagnostic refresh for one open document.
//!
//! The host editor sends [`Signal`]s; the scheduler decides whether a
//! refresh cycle (checker → parser → store) has to run and makes sure at most
//! one cycle per document is in flight. Signals that arrive while a cycle is
//! running are dropped: they only leave the store stale, and the host is
//! expected to signal again (the next save or layout pass) once the cycle
//! has finished.

use crate::parser::parse_flow_output;
use crate::runner::{is_checkable, CheckMode, CheckRequest, FlowError};
use camino::{Utf8Path, Utf8PathBuf};
use flow_diagnostics::{DiagnosticStore, Epoch};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::task::JoinHandle;

/// Produces raw checker output for a request.
pub trait Checker: Send + Sync + 'static {
    /// Runs the checker to completion and returns its stdout.
    fn check(
        &self,
        request: &CheckRequest,
    ) -> impl Future<Output = Result<String, FlowError>> + Send;
}

/// Notifications from the host editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// The buffer was edited and differs from disk.
    Edited,
    /// The document was written to disk.
    Saved,
    /// The document was reloaded from disk.
    Reloaded,
    /// The view was laid out again (scroll, resize, reformat).
    LayoutChanged {
        /// Whether the buffer has unsaved edits.
        dirty: bool,
    },
}

/// Whether a refresh cycle is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshState {
    #[default]
    Idle,
    Running,
}

/// Result of one refresh cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    /// A new index was swapped into the store.
    Applied {
        /// Number of indexed lines, across all files.
        diagnostics: usize,
        /// `false` when the document was edited while the cycle ran.
        fresh: bool,
    },
    /// The cycle failed; the previous index was kept and the store is still
    /// stale.
    Failed(FlowError),
}

impl CycleOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, CycleOutcome::Applied { .. })
    }
}

/// Handle to a running refresh cycle.
#[derive(Debug)]
pub struct RefreshHandle {
    file: Utf8PathBuf,
    task: JoinHandle<CycleOutcome>,
}

impl RefreshHandle {
    /// The document being refreshed.
    pub fn file(&self) -> &Utf8Path {
        &self.file
    }

    /// Waits for the cycle to finish.
    pub async fn outcome(self) -> CycleOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => CycleOutcome::Failed(FlowError::TaskFailed(e.to_string())),
        }
    }
}

/// Resets the state to `Idle` when the cycle ends, even if it panicked.
struct RunningGuard(Arc<Mutex<RefreshState>>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        *lock(&self.0) = RefreshState::Idle;
    }
}

fn lock(state: &Mutex<RefreshState>) -> MutexGuard<'_, RefreshState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Refresh orchestration for one document.
///
/// Owns the document's [`DiagnosticStore`]; the renderer reads it through
/// [`RefreshScheduler::store`]. Triggering methods spawn onto the current
/// tokio runtime and must be called from within one.
pub struct RefreshScheduler<C: Checker> {
    file: Utf8PathBuf,
    checker: Arc<C>,
    store: Arc<DiagnosticStore>,
    state: Arc<Mutex<RefreshState>>,
}

impl<C: Checker> RefreshScheduler<C> {
    /// Creates a scheduler for `file` with a fresh, stale store.
    pub fn new(file: impl Into<Utf8PathBuf>, checker: Arc<C>) -> Self {
        Self {
            file: file.into(),
            checker,
            store: Arc::new(DiagnosticStore::new()),
            state: Arc::new(Mutex::new(RefreshState::Idle)),
        }
    }

    pub fn file(&self) -> &Utf8Path {
        &self.file
    }

    pub fn store(&self) -> &Arc<DiagnosticStore> {
        &self.store
    }

    pub fn state(&self) -> RefreshState {
        *lock(&self.state)
    }

    /// Handles a host signal. Returns the started cycle, if any.
    pub fn signal(&self, signal: Signal) -> Option<RefreshHandle> {
        match signal {
            Signal::Edited => {
                self.store.mark_stale();
                self.store.clear_visible();
                None
            }
            Signal::Saved | Signal::Reloaded => {
                self.store.mark_stale();
                self.store.clear_visible();
                self.trigger(CheckMode::Project)
            }
            Signal::LayoutChanged { dirty: true } => {
                self.store.clear_visible();
                None
            }
            Signal::LayoutChanged { dirty: false } => {
                // A fresh store is not re-checked, even if files the document
                // depends on changed behind our back.
                if self.store.is_stale() {
                    self.trigger(CheckMode::Project)
                } else {
                    None
                }
            }
        }
    }

    /// Starts a whole-project cycle unless one is already running.
    pub fn refresh(&self) -> Option<RefreshHandle> {
        self.trigger(CheckMode::Project)
    }

    /// Checks the live, possibly unsaved `contents` of the document.
    pub fn check_contents(&self, contents: impl Into<String>) -> Option<RefreshHandle> {
        self.store.mark_stale();
        self.trigger(CheckMode::Contents(contents.into()))
    }

    fn trigger(&self, mode: CheckMode) -> Option<RefreshHandle> {
        if !is_checkable(&self.file) {
            tracing::debug!(file = %self.file, "not a checkable file, skipping refresh");
            return None;
        }

        {
            let mut state = lock(&self.state);
            if *state == RefreshState::Running {
                tracing::debug!(file = %self.file, "refresh already running");
                return None;
            }
            *state = RefreshState::Running;
        }
        let guard = RunningGuard(Arc::clone(&self.state));

        let request = CheckRequest {
            file: self.file.clone(),
            mode,
        };
        let started_at = self.store.epoch();
        let checker = Arc::clone(&self.checker);
        let store = Arc::clone(&self.store);

        let task = tokio::spawn(async move {
            let _guard = guard;
            run_cycle(checker.as_ref(), &store, &request, started_at).await
        });

        Some(RefreshHandle {
            file: self.file.clone(),
            task,
        })
    }
}

async fn run_cycle<C: Checker>(
    checker: &C,
    store: &DiagnosticStore,
    request: &CheckRequest,
    started_at: Epoch,
) -> CycleOutcome {
    let start = Instant::now();
    let result = match checker.check(request).await {
        Ok(output) => parse_flow_output(&output),
        Err(e) => Err(e),
    };

    match result {
        Ok(index) => {
            let diagnostics = index.len();
            let fresh = store.apply(index, started_at);
            tracing::debug!(
                file = %request.file,
                diagnostics,
                fresh,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "diagnostics refreshed"
            );
            CycleOutcome::Applied { diagnostics, fresh }
        }
        Err(e) => {
            tracing::warn!(
                file = %request.file,
                error = %e,
                "refresh failed, keeping previous diagnostics"
            );
            CycleOutcome::Failed(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Returns canned output, optionally holding every call until released.
    struct FakeChecker {
        output: Mutex<Result<String, ()>>,
        calls: AtomicUsize,
        gate: Option<Notify>,
        requests: Mutex<Vec<CheckRequest>>,
    }

    impl FakeChecker {
        fn new(output: &str) -> Self {
            Self {
                output: Mutex::new(Ok(output.to_string())),
                calls: AtomicUsize::new(0),
                gate: None,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn gated(output: &str) -> Self {
            Self {
                gate: Some(Notify::new()),
                ..Self::new(output)
            }
        }

        fn set_output(&self, output: Result<&str, ()>) {
            *self.output.lock().unwrap() = output.map(str::to_string);
        }

        fn release(&self) {
            if let Some(gate) = &self.gate {
                gate.notify_one();
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Checker for FakeChecker {
        fn check(
            &self,
            request: &CheckRequest,
        ) -> impl Future<Output = Result<String, FlowError>> + Send {
            async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.requests.lock().unwrap().push(request.clone());
                if let Some(gate) = &self.gate {
                    gate.notified().await;
                }
                let output = self.output.lock().unwrap().clone();
                output.map_err(|()| FlowError::EmptyOutput)
            }
        }
    }

    const ONE_ERROR: &str =
        r#"{"errors":[{"message":[{"line":5,"path":"/p/a.js","descr":"bad"}]}]}"#;

    #[tokio::test]
    async fn test_end_to_end_refresh() {
        let checker = Arc::new(FakeChecker::new(ONE_ERROR));
        let scheduler = RefreshScheduler::new("/p/a.js", checker);

        let outcome = scheduler.refresh().unwrap().outcome().await;
        assert!(matches!(
            outcome,
            CycleOutcome::Applied {
                diagnostics: 1,
                fresh: true
            }
        ));

        let store = scheduler.store();
        let diags = store.current_diagnostics_for(Utf8Path::new("/p/a.js"));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].0, 5);
        assert!(store
            .current_diagnostics_for(Utf8Path::new("/p/b.js"))
            .is_empty());
        assert!(!store.is_stale());
        assert_eq!(scheduler.state(), RefreshState::Idle);
    }

    #[tokio::test]
    async fn test_single_flight() {
        let checker = Arc::new(FakeChecker::gated(ONE_ERROR));
        let scheduler = RefreshScheduler::new("/p/a.js", Arc::clone(&checker));

        let first = scheduler.signal(Signal::Saved).expect("first signal starts a cycle");
        assert_eq!(scheduler.state(), RefreshState::Running);
        assert!(scheduler.signal(Signal::Saved).is_none());
        assert!(scheduler
            .signal(Signal::LayoutChanged { dirty: false })
            .is_none());

        checker.release();
        assert!(first.outcome().await.is_applied());

        assert_eq!(checker.calls(), 1);
        assert_eq!(scheduler.state(), RefreshState::Idle);
    }

    #[tokio::test]
    async fn test_edit_during_cycle_leaves_store_stale() {
        let checker = Arc::new(FakeChecker::gated(ONE_ERROR));
        let scheduler = RefreshScheduler::new("/p/a.js", Arc::clone(&checker));

        let handle = scheduler.signal(Signal::Saved).unwrap();
        scheduler.signal(Signal::Edited);
        checker.release();

        let outcome = handle.outcome().await;
        assert!(matches!(outcome, CycleOutcome::Applied { fresh: false, .. }));
        assert!(scheduler.store().is_stale());
        // Applied anyway.
        assert_eq!(scheduler.store().index().len(), 1);

        // The next layout pass on a clean buffer catches up.
        let next = scheduler.signal(Signal::LayoutChanged { dirty: false });
        assert!(next.is_some());
        checker.release();
        assert!(next.unwrap().outcome().await.is_applied());
        assert!(!scheduler.store().is_stale());
        assert_eq!(checker.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_cycle_keeps_previous_index() {
        let checker = Arc::new(FakeChecker::new(ONE_ERROR));
        let scheduler = RefreshScheduler::new("/p/a.js", Arc::clone(&checker));
        scheduler.refresh().unwrap().outcome().await;

        checker.set_output(Ok("this is not json"));
        let outcome = scheduler.signal(Signal::Saved).unwrap().outcome().await;
        assert!(matches!(outcome, CycleOutcome::Failed(FlowError::ParseFailed(_))));
        assert!(scheduler.store().is_stale());
        assert_eq!(scheduler.store().index().len(), 1);

        checker.set_output(Err(()));
        let outcome = scheduler.signal(Signal::Reloaded).unwrap().outcome().await;
        assert!(matches!(outcome, CycleOutcome::Failed(FlowError::EmptyOutput)));
        assert_eq!(scheduler.store().index().len(), 1);
    }

    #[tokio::test]
    async fn test_no_errors_replaces_index() {
        let checker = Arc::new(FakeChecker::new(ONE_ERROR));
        let scheduler = RefreshScheduler::new("/p/a.js", Arc::clone(&checker));
        scheduler.refresh().unwrap().outcome().await;

        checker.set_output(Ok(r#"{"errors":[]}"#));
        scheduler.signal(Signal::Saved).unwrap().outcome().await;
        assert!(scheduler.store().index().is_empty());
        assert!(!scheduler.store().is_stale());
    }

    #[tokio::test]
    async fn test_layout_on_fresh_store_is_noop() {
        let checker = Arc::new(FakeChecker::new(ONE_ERROR));
        let scheduler = RefreshScheduler::new("/p/a.js", Arc::clone(&checker));
        scheduler.refresh().unwrap().outcome().await;

        assert!(scheduler
            .signal(Signal::LayoutChanged { dirty: false })
            .is_none());
        assert_eq!(checker.calls(), 1);
    }

    #[tokio::test]
    async fn test_edit_hides_diagnostics_without_checking() {
        let checker = Arc::new(FakeChecker::new(ONE_ERROR));
        let scheduler = RefreshScheduler::new("/p/a.js", Arc::clone(&checker));
        scheduler.refresh().unwrap().outcome().await;
        let path = Utf8Path::new("/p/a.js");
        assert_eq!(scheduler.store().current_diagnostics_for(path).len(), 1);

        assert!(scheduler.signal(Signal::Edited).is_none());
        assert!(scheduler
            .signal(Signal::LayoutChanged { dirty: true })
            .is_none());
        assert!(scheduler.store().current_diagnostics_for(path).is_empty());
        assert!(scheduler.store().is_stale());
        assert_eq!(checker.calls(), 1);
    }

    #[tokio::test]
    async fn test_check_contents_sends_buffer() {
        let checker = Arc::new(FakeChecker::new(ONE_ERROR));
        let scheduler = RefreshScheduler::new("/p/a.js", Arc::clone(&checker));

        let outcome = scheduler
            .check_contents("// @flow\nfoo();\n")
            .unwrap()
            .outcome()
            .await;
        assert!(outcome.is_applied());

        let requests = checker.requests.lock().unwrap();
        assert_eq!(
            requests[0],
            CheckRequest::contents("/p/a.js", "// @flow\nfoo();\n")
        );
    }

    #[tokio::test]
    async fn test_non_js_files_are_never_checked() {
        let checker = Arc::new(FakeChecker::new(ONE_ERROR));
        let scheduler = RefreshScheduler::new("/p/style.css", Arc::clone(&checker));

        assert!(scheduler.refresh().is_none());
        assert!(scheduler.signal(Signal::Saved).is_none());
        assert_eq!(checker.calls(), 0);
    }

    #[tokio::test]
    async fn test_documents_do_not_share_stores() {
        let checker = Arc::new(FakeChecker::new(ONE_ERROR));
        let a = RefreshScheduler::new("/p/a.js", Arc::clone(&checker));
        let b = RefreshScheduler::new("/p/b.js", Arc::clone(&checker));

        a.refresh().unwrap().outcome().await;

        assert!(!a.store().is_stale());
        assert!(b.store().is_stale());
        assert!(b.store().index().is_empty());
    }
}
