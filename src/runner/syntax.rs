//! Parse-only JavaScript syntax checks.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

/// Outcome of a parse-only check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "message", rename_all = "snake_case")]
pub enum SyntaxVerdict {
    Valid,
    /// The code does not parse; carries the parser diagnostic.
    Invalid(String),
    /// The checker itself could not run.
    Unavailable(String),
}

impl SyntaxVerdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, SyntaxVerdict::Valid)
    }
}

/// Checks whether code parses without running it.
#[async_trait]
pub trait SyntaxChecker: Send + Sync {
    async fn check(&self, code: &str) -> SyntaxVerdict;
}

/// Runs `node --check` on the snippet saved as an ES module, so top-level
/// `await` parses the same way it does inside the sandbox wrapper.
pub struct NodeSyntaxChecker {
    node_binary: String,
    timeout: Duration,
}

impl NodeSyntaxChecker {
    pub fn new(node_binary: impl Into<String>) -> Self {
        Self {
            node_binary: node_binary.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for NodeSyntaxChecker {
    fn default() -> Self {
        Self::new("node")
    }
}

#[async_trait]
impl SyntaxChecker for NodeSyntaxChecker {
    async fn check(&self, code: &str) -> SyntaxVerdict {
        let workdir = match tempfile::Builder::new()
            .prefix("skill-eval-syntax-")
            .tempdir()
        {
            Ok(dir) => dir,
            Err(e) => return SyntaxVerdict::Unavailable(format!("Failed to create work dir: {}", e)),
        };
        let snippet = workdir.path().join("snippet.mjs");
        if let Err(e) = tokio::fs::write(&snippet, code).await {
            return SyntaxVerdict::Unavailable(format!("Failed to write snippet: {}", e));
        }

        let child = Command::new(&self.node_binary)
            .arg("--check")
            .arg(&snippet)
            .current_dir(workdir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(e) => {
                warn!(binary = %self.node_binary, error = %e, "Syntax checker unavailable");
                return SyntaxVerdict::Unavailable(format!(
                    "Failed to start '{}': {}",
                    self.node_binary, e
                ));
            }
        };

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) if output.status.success() => SyntaxVerdict::Valid,
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let message = syntax_diagnostic(&stderr);
                debug!(diagnostic = %message, "Generated code failed to parse");
                SyntaxVerdict::Invalid(message)
            }
            Ok(Err(e)) => SyntaxVerdict::Unavailable(format!("Syntax check failed: {}", e)),
            Err(_) => SyntaxVerdict::Unavailable(format!(
                "Syntax check timed out after {}ms",
                self.timeout.as_millis()
            )),
        }
    }
}

/// Pick the most useful line of Node's parse error output.
fn syntax_diagnostic(stderr: &str) -> String {
    stderr
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("SyntaxError"))
        .or_else(|| stderr.lines().map(str::trim).find(|l| !l.is_empty()))
        .unwrap_or("unknown syntax error")
        .to_string()
}
