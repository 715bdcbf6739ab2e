//! flow process runner.

use crate::locate::locate_project_root;
use crate::scheduler::Checker;
use camino::{Utf8Path, Utf8PathBuf};
use std::future::Future;
use std::process::Stdio;
use std::time::Instant;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[cfg(windows)]
const FLOW_BIN_NAME: &str = "flow.cmd";
#[cfg(not(windows))]
const FLOW_BIN_NAME: &str = "flow";

/// File extensions flow-lint will check.
pub const CHECKABLE_EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "cjs"];

/// Returns whether `path` has a checkable extension.
pub fn is_checkable(path: &Utf8Path) -> bool {
    path.extension()
        .map(|ext| CHECKABLE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Error types for flow runner.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Failed to spawn flow process.
    #[error("failed to spawn flow: {0}")]
    SpawnFailed(#[from] std::io::Error),

    /// flow exited with an error and printed nothing on stdout.
    #[error("flow exited with code {code}: {stderr}")]
    ProcessFailed { code: i32, stderr: String },

    /// flow exited without printing anything.
    #[error("flow produced no output")]
    EmptyOutput,

    /// flow binary not found.
    #[error("flow binary not found (looked in {0}/node_modules/.bin and PATH)")]
    NotFound(Utf8PathBuf),

    /// No `.flowconfig` above the file.
    #[error("no .flowconfig found above {0}")]
    RootNotFound(Utf8PathBuf),

    /// Failed to parse flow output.
    #[error("failed to parse flow output: {0}")]
    ParseFailed(String),

    /// The background refresh task died.
    #[error("refresh task failed: {0}")]
    TaskFailed(String),
}

/// What the checker should look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckMode {
    /// Every diagnostic of the project, as saved on disk (`flow --json`).
    Project,
    /// The given buffer in place of the file on disk
    /// (`flow check-contents <file> --json`).
    Contents(String),
}

/// A request to check one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRequest {
    /// The document being checked.
    pub file: Utf8PathBuf,
    /// How to check it.
    pub mode: CheckMode,
}

impl CheckRequest {
    /// Whole-project check on behalf of `file`.
    pub fn project(file: impl Into<Utf8PathBuf>) -> Self {
        Self {
            file: file.into(),
            mode: CheckMode::Project,
        }
    }

    /// Check of the live `contents` of `file`.
    pub fn contents(file: impl Into<Utf8PathBuf>, contents: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            mode: CheckMode::Contents(contents.into()),
        }
    }
}

/// The flow runner.
#[derive(Debug, Clone, Default)]
pub struct FlowRunner {
    /// Explicit flow binary; resolved per project root when `None`.
    flow_path: Option<Utf8PathBuf>,
}

impl FlowRunner {
    /// Creates a new flow runner.
    pub fn new(flow_path: Option<Utf8PathBuf>) -> Self {
        Self { flow_path }
    }

    /// Attempts to find flow in the project or on PATH.
    /// 1. `<project_root>/node_modules/.bin/flow` (the `flow-bin` package)
    /// 2. PATH
    pub fn find_flow(project_root: Option<&Utf8Path>) -> Option<Utf8PathBuf> {
        if let Some(root) = project_root {
            let local = root.join("node_modules/.bin").join(FLOW_BIN_NAME);
            if local.is_file() {
                return Some(local);
            }
        }

        which::which("flow")
            .ok()
            .and_then(|path| Utf8PathBuf::try_from(path).ok())
    }

    fn resolve_flow(&self, project_root: &Utf8Path) -> Result<Utf8PathBuf, FlowError> {
        match &self.flow_path {
            Some(path) => Ok(path.clone()),
            None => Self::find_flow(Some(project_root))
                .ok_or_else(|| FlowError::NotFound(project_root.to_owned())),
        }
    }

    /// Gets the version of the flow binary used for `project_root`.
    pub async fn flow_version(
        &self,
        project_root: &Utf8Path,
    ) -> Result<(String, Utf8PathBuf), FlowError> {
        let flow_path = self.resolve_flow(project_root)?;

        let output = Command::new(&flow_path)
            .arg("version")
            .arg("--json")
            .current_dir(project_root)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FlowError::ProcessFailed {
                code: output.status.code().unwrap_or(-1),
                stderr: stderr.to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = serde_json::from_str::<serde_json::Value>(&stdout)
            .ok()
            .and_then(|v| v.get("semver").and_then(|s| s.as_str()).map(str::to_string))
            .unwrap_or_else(|| stdout.trim().to_string());

        Ok((version, flow_path))
    }

    /// Runs flow in `working_dir` and returns its complete stdout.
    ///
    /// flow exits with a non-zero code when it finds type errors, so the
    /// exit status only counts as a failure when stdout is empty.
    pub async fn run(
        &self,
        working_dir: &Utf8Path,
        request: &CheckRequest,
    ) -> Result<String, FlowError> {
        let flow_path = self.resolve_flow(working_dir)?;
        let start = Instant::now();

        let mut command = Command::new(&flow_path);
        match &request.mode {
            CheckMode::Project => {
                command.arg("--json").stdin(Stdio::null());
            }
            CheckMode::Contents(_) => {
                command
                    .arg("check-contents")
                    .arg(&request.file)
                    .arg("--json")
                    .stdin(Stdio::piped());
            }
        }

        let mut child = command
            .current_dir(working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Feed the buffer concurrently so a chatty child can't block on a
        // full stdout pipe while we are still writing.
        let writer = match (&request.mode, child.stdin.take()) {
            (CheckMode::Contents(contents), Some(mut stdin)) => {
                let contents = contents.clone();
                Some(tokio::spawn(async move {
                    stdin.write_all(contents.as_bytes()).await?;
                    stdin.shutdown().await
                }))
            }
            _ => None,
        };

        let output = child.wait_with_output().await?;

        if let Some(writer) = writer {
            if let Ok(Err(e)) = writer.await {
                tracing::debug!(error = %e, "flow closed stdin early");
            }
        }

        tracing::debug!(
            file = %request.file,
            root = %working_dir,
            status = ?output.status.code(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "flow finished"
        );

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if stdout.trim().is_empty() {
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(FlowError::ProcessFailed {
                    code: output.status.code().unwrap_or(-1),
                    stderr: stderr.trim().to_string(),
                });
            }
            return Err(FlowError::EmptyOutput);
        }

        Ok(stdout)
    }

    /// Like [`FlowRunner::run`], but never fails: errors are logged and
    /// reported as empty output. Use `run` to tell a failure apart from an
    /// empty result.
    pub async fn invoke(&self, working_dir: &Utf8Path, request: &CheckRequest) -> String {
        match self.run(working_dir, request).await {
            Ok(stdout) => stdout,
            Err(e) => {
                tracing::warn!(file = %request.file, root = %working_dir, error = %e, "flow invocation failed");
                String::new()
            }
        }
    }
}

impl Checker for FlowRunner {
    fn check(
        &self,
        request: &CheckRequest,
    ) -> impl Future<Output = Result<String, FlowError>> + Send {
        async move {
            let root = locate_project_root(&request.file)?;
            self.run(&root, request).await
        }
    }
}
