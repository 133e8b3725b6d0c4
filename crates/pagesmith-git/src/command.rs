//! Git command execution abstraction

use async_trait::async_trait;
use pagesmith_core::{PagesmithError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::Mutex;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Output from a git command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    /// Exit code, `None` if the process was killed by a signal
    pub code: Option<i32>,
}

impl From<Output> for GitOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

impl GitOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            success: true,
            code: Some(0),
        }
    }

    /// Failed output with the given exit code and stderr
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            success: false,
            code: Some(code),
        }
    }
}

/// Trait for executing git commands (allows mocking in tests)
#[async_trait]
pub trait GitExecutor: Send + Sync + std::fmt::Debug {
    /// Execute a git command with the given arguments
    async fn exec(&self, args: &[&str]) -> Result<GitOutput>;

    /// Directory the commands run in
    fn work_dir(&self) -> &Path;
}

/// Real git command executor
#[derive(Debug, Clone)]
pub struct GitCommand {
    work_dir: PathBuf,
}

impl GitCommand {
    /// Create a new git executor bound to the given directory
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }
}

#[async_trait]
impl GitExecutor for GitCommand {
    #[instrument(skip(self, args), fields(dir = %self.work_dir.display(), cmd = args.first().copied().unwrap_or("")))]
    async fn exec(&self, args: &[&str]) -> Result<GitOutput> {
        debug!("Executing git {}", args.first().copied().unwrap_or(""));

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.work_dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .await
            .map_err(|e| PagesmithError::GitCommand(format!("Failed to execute git: {}", e)))?;

        let git_output = GitOutput::from(output);

        if !git_output.success {
            debug!("git command exited with {:?}", git_output.code);
        }

        Ok(git_output)
    }

    fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}

/// Mock git executor for testing
///
/// Responses are keyed by the space-joined argument list. Every call is
/// recorded so tests can assert on the exact command sequence.
#[derive(Debug)]
pub struct MockGitExecutor {
    work_dir: PathBuf,
    responses: HashMap<String, GitOutput>,
    calls: Mutex<Vec<String>>,
}

impl Default for MockGitExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGitExecutor {
    pub fn new() -> Self {
        Self {
            work_dir: PathBuf::from("/mock/repo"),
            responses: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(mut self, command: &str, output: GitOutput) -> Self {
        self.responses.insert(command.to_string(), output);
        self
    }

    /// Commands executed so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl GitExecutor for MockGitExecutor {
    async fn exec(&self, args: &[&str]) -> Result<GitOutput> {
        let key = args.join(" ");
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(key.clone());
        }
        self.responses
            .get(&key)
            .cloned()
            .ok_or_else(|| PagesmithError::GitCommand(format!("No mock response for: {}", key)))
    }

    fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}
