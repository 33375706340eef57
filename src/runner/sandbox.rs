//! Sandboxed execution of generated JavaScript.
//!
//! Each execution runs in a fresh Node.js child process. The embedded
//! prelude connects a MongoDB client, runs the snippet inside a `vm` context
//! that only exposes the allow-listed capabilities, closes the client, and
//! reports a single marker-prefixed JSON line on stdout.
//!
//! ```text
//! code → trailing-call rewrite → snippet.js ┐
//!                               prelude.js ─┴→ node (vm context) → result line
//! ```

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::result::ExecutionResult;
use super::rewrite::await_trailing_call;

/// Prefix of the stdout line carrying the execution result.
pub const RESULT_MARKER: &str = "__SKILL_EVAL_RESULT__";

const PRELUDE: &str = include_str!("prelude.js");

/// Maximum stderr kept in failure messages.
const STDERR_TAIL_CHARS: usize = 2000;

/// Runs generated code and reports the outcome.
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    /// Execute `code` with a wall-clock limit. Failures are encoded in the
    /// returned result, never raised.
    async fn execute(&self, code: &str, timeout: Duration) -> ExecutionResult;
}

/// Configuration for the Node.js sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Node.js executable.
    pub node_binary: String,
    /// Connection string handed to the sandboxed client.
    pub mongodb_uri: String,
    /// Directory containing the `mongodb` npm package (exported as NODE_PATH).
    pub node_modules: Option<PathBuf>,
    /// Extra time after the in-sandbox timeout before the process is killed.
    pub kill_grace: Duration,
}

impl SandboxConfig {
    /// Creates a sandbox configuration with defaults.
    pub fn new(mongodb_uri: impl Into<String>) -> Self {
        Self {
            node_binary: "node".to_string(),
            mongodb_uri: mongodb_uri.into(),
            node_modules: None,
            kill_grace: Duration::from_secs(3),
        }
    }

    /// Sets the Node.js executable.
    pub fn with_node_binary(mut self, node_binary: impl Into<String>) -> Self {
        self.node_binary = node_binary.into();
        self
    }

    /// Sets the module search directory. A relative path is taken relative
    /// to the current directory, not the sandbox work dir.
    pub fn with_node_modules(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.node_modules = Some(std::path::absolute(&dir).unwrap_or(dir));
        self
    }

    /// Sets the kill grace period.
    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }
}

/// Error types for sandbox setup and process handling.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("Setup failed: {0}")]
    Setup(String),

    #[error("Failed to start '{binary}': {message}")]
    Spawn { binary: String, message: String },

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result line written by the prelude.
#[derive(Debug, Deserialize)]
struct SandboxReport {
    success: bool,
    #[serde(default)]
    output: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    logs: Vec<String>,
}

/// Node.js child-process sandbox.
pub struct NodeSandbox {
    config: SandboxConfig,
    /// `PATH` of the harness process, used to locate the Node.js binary
    /// since the child itself runs with a cleared environment.
    search_path: Option<OsString>,
}

impl NodeSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            search_path: std::env::var_os("PATH"),
        }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    async fn run(&self, code: &str, timeout: Duration) -> Result<ExecutionResult, SandboxError> {
        let start = Instant::now();
        let workdir = tempfile::Builder::new()
            .prefix("skill-eval-sandbox-")
            .tempdir()
            .map_err(|e| SandboxError::Setup(format!("Failed to create work dir: {}", e)))?;

        let prelude_path = workdir.path().join("prelude.js");
        let snippet_path = workdir.path().join("snippet.js");
        tokio::fs::write(&prelude_path, PRELUDE).await?;
        tokio::fs::write(&snippet_path, await_trailing_call(code).as_bytes()).await?;

        let node_modules = match self.config.node_modules {
            Some(ref modules) => Some(std::path::absolute(modules)?),
            None => None,
        };

        let program = resolve_program(&self.config.node_binary, self.search_path.as_deref());
        debug!(program = %program.display(), "Resolved sandbox runtime");

        let mut command = Command::new(&program);
        command
            .arg(&prelude_path)
            .arg(&snippet_path)
            .current_dir(workdir.path())
            .env_clear()
            .env("SKILL_EVAL_MONGODB_URI", &self.config.mongodb_uri)
            .env("SKILL_EVAL_RESULT_MARKER", RESULT_MARKER)
            .env("SKILL_EVAL_TIMEOUT_MS", timeout.as_millis().to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref modules) = node_modules {
            command.env("NODE_PATH", modules);
        }

        let child = command.spawn().map_err(|e| SandboxError::Spawn {
            binary: self.config.node_binary.clone(),
            message: e.to_string(),
        })?;

        let hard_limit = timeout + self.config.kill_grace;
        // Dropping the child on timeout kills it (kill_on_drop).
        match tokio::time::timeout(hard_limit, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                Ok(parse_sandbox_output(
                    &stdout,
                    &stderr,
                    output.status.code(),
                    start.elapsed(),
                ))
            }
            Ok(Err(e)) => Err(SandboxError::Execution(format!(
                "Failed to wait for sandbox process: {}",
                e
            ))),
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Sandbox process did not exit in time; killed"
                );
                Ok(ExecutionResult::failure(
                    format!(
                        "Sandbox process killed after {}ms without reporting a result (timeout {}ms)",
                        hard_limit.as_millis(),
                        timeout.as_millis()
                    ),
                    start.elapsed(),
                ))
            }
        }
    }
}

#[async_trait]
impl CodeExecutor for NodeSandbox {
    async fn execute(&self, code: &str, timeout: Duration) -> ExecutionResult {
        let start = Instant::now();
        debug!(chars = code.len(), "Executing generated code in sandbox");

        let result = match self.run(code, timeout).await {
            Ok(result) => result,
            Err(e) => ExecutionResult::failure(e.to_string(), start.elapsed()),
        };

        info!(
            success = result.success,
            execution_time_ms = result.execution_time_ms,
            "Sandbox execution finished"
        );
        result
    }
}

/// Locate `program` in the directories of `search_path`, like a shell would.
/// Paths with a directory part are made absolute against the current
/// directory, since the child starts in its own work dir. Bare names not
/// found are returned unchanged.
fn resolve_program(program: &str, search_path: Option<&OsStr>) -> PathBuf {
    let name = Path::new(program);
    if name.components().count() != 1 || name.is_absolute() {
        return std::path::absolute(name).unwrap_or_else(|_| name.to_path_buf());
    }
    search_path
        .into_iter()
        .flat_map(|paths| std::env::split_paths(paths).collect::<Vec<_>>())
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
        .unwrap_or_else(|| name.to_path_buf())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Turn the sandbox process output into an [`ExecutionResult`].
fn parse_sandbox_output(
    stdout: &str,
    stderr: &str,
    exit_code: Option<i32>,
    elapsed: Duration,
) -> ExecutionResult {
    let report_line = stdout
        .lines()
        .rev()
        .find_map(|line| line.strip_prefix(RESULT_MARKER));

    let Some(line) = report_line else {
        let status = exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        return ExecutionResult::failure(
            format!(
                "Sandbox exited with status {} without reporting a result: {}",
                status,
                tail(stderr.trim(), STDERR_TAIL_CHARS)
            ),
            elapsed,
        );
    };

    match serde_json::from_str::<SandboxReport>(line) {
        Ok(report) if report.success => {
            ExecutionResult::success(report.output, elapsed).with_logs(report.logs)
        }
        Ok(report) => ExecutionResult::failure(
            report
                .error
                .unwrap_or_else(|| "Execution failed without an error message".to_string()),
            elapsed,
        )
        .with_logs(report.logs),
        Err(e) => ExecutionResult::failure(
            format!("Malformed sandbox result line: {}", e),
            elapsed,
        ),
    }
}

fn tail(s: &str, max_chars: usize) -> &str {
    let count = s.chars().count();
    if count <= max_chars {
        return s;
    }
    let skip = count - max_chars;
    let start = s.char_indices().nth(skip).map(|(i, _)| i).unwrap_or(0);
    &s[start..]
}
