//! Working copy operations used by the repository lifecycle

use async_trait::async_trait;
use pagesmith_core::{CommitIdentity, PagesmithError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::command::{GitCommand, GitExecutor, GitOutput};

/// A local working copy of a hosted repository
#[async_trait]
pub trait WorkingCopy: Send + Sync + std::fmt::Debug {
    /// Directory holding the checked-out files
    fn path(&self) -> &Path;

    /// Initialize an empty repository in [`Self::path`]
    async fn init(&self) -> Result<()>;

    /// Register a remote push target
    async fn add_remote(&self, name: &str, url: &str) -> Result<()>;

    /// Clone `url` into [`Self::path`], which must be empty
    async fn clone_remote(&self, url: &str) -> Result<()>;

    /// Set the author/committer identity for this repository
    async fn set_identity(&self, identity: &CommitIdentity) -> Result<()>;

    /// Stage every change, including deletions
    async fn stage_all(&self) -> Result<()>;

    /// Latest commit id, `None` before the first commit
    async fn head_commit(&self) -> Result<Option<String>>;

    /// Whether the index differs from HEAD (or holds anything, before the first commit)
    async fn has_staged_changes(&self) -> Result<bool>;

    /// Commit the index and return the new commit id
    async fn commit(&self, message: &str) -> Result<String>;

    /// Force the current branch to the given name
    async fn rename_branch(&self, branch: &str) -> Result<()>;

    /// Force-push `branch` to `remote`, setting upstream tracking
    async fn push_upstream(&self, remote: &str, branch: &str) -> Result<()>;
}

/// Opens working copies for task directories
pub trait WorkingCopyFactory: Send + Sync + std::fmt::Debug {
    fn open(&self, path: &Path) -> Arc<dyn WorkingCopy>;
}

/// Working copy driven by the `git` command line
pub struct GitWorkingCopy<E: GitExecutor> {
    executor: E,
    path: PathBuf,
    /// Values scrubbed from git error output (tokens embedded in remote URLs)
    secrets: Vec<String>,
}

impl<E: GitExecutor> std::fmt::Debug for GitWorkingCopy<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitWorkingCopy")
            .field("executor", &self.executor)
            .field("path", &self.path)
            .field("secrets", &self.secrets.len())
            .finish()
    }
}

impl GitWorkingCopy<GitCommand> {
    /// Working copy backed by the real `git` binary
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::new(GitCommand::new(path.clone()), path)
    }
}

impl<E: GitExecutor> GitWorkingCopy<E> {
    pub fn new(executor: E, path: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            path: path.into(),
            secrets: Vec::new(),
        }
    }

    /// Scrub this value from any error message
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if !secret.is_empty() {
            self.secrets.push(secret);
        }
        self
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    fn scrub(&self, text: &str) -> String {
        self.secrets
            .iter()
            .fold(text.trim().to_string(), |acc, secret| {
                acc.replace(secret.as_str(), "********")
            })
    }

    /// Run a command that must succeed
    async fn run(&self, args: &[&str]) -> Result<GitOutput> {
        let output = self.executor.exec(args).await?;
        if !output.success {
            return Err(PagesmithError::GitCommand(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or(""),
                self.scrub(&output.stderr)
            )));
        }
        Ok(output)
    }
}

#[async_trait]
impl<E: GitExecutor> WorkingCopy for GitWorkingCopy<E> {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn init(&self) -> Result<()> {
        self.run(&["init"]).await?;
        info!("Initialized empty repository at {}", self.path.display());
        Ok(())
    }

    async fn add_remote(&self, name: &str, url: &str) -> Result<()> {
        self.run(&["remote", "add", name, url]).await?;
        debug!("Added remote {}", name);
        Ok(())
    }

    async fn clone_remote(&self, url: &str) -> Result<()> {
        self.run(&["clone", url, "."]).await?;
        info!("Cloned into {}", self.path.display());
        Ok(())
    }

    async fn set_identity(&self, identity: &CommitIdentity) -> Result<()> {
        self.run(&["config", "user.name", &identity.name]).await?;
        self.run(&["config", "user.email", &identity.email]).await?;
        Ok(())
    }

    async fn stage_all(&self) -> Result<()> {
        self.run(&["add", "-A"]).await?;
        Ok(())
    }

    async fn head_commit(&self) -> Result<Option<String>> {
        let output = self
            .executor
            .exec(&["rev-parse", "--verify", "--quiet", "HEAD"])
            .await?;
        if output.success {
            Ok(Some(output.stdout.trim().to_string()))
        } else {
            Ok(None)
        }
    }

    async fn has_staged_changes(&self) -> Result<bool> {
        if self.head_commit().await?.is_none() {
            let output = self.run(&["ls-files"]).await?;
            return Ok(!output.stdout.trim().is_empty());
        }

        let output = self
            .executor
            .exec(&["diff", "--cached", "--quiet", "HEAD"])
            .await?;
        match output.code {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(PagesmithError::GitCommand(format!(
                "git diff failed: {}",
                self.scrub(&output.stderr)
            ))),
        }
    }

    async fn commit(&self, message: &str) -> Result<String> {
        self.run(&["commit", "-m", message]).await?;
        self.head_commit().await?.ok_or_else(|| {
            PagesmithError::GitCommand("HEAD missing after commit".to_string())
        })
    }

    async fn rename_branch(&self, branch: &str) -> Result<()> {
        self.run(&["branch", "-M", branch]).await?;
        Ok(())
    }

    async fn push_upstream(&self, remote: &str, branch: &str) -> Result<()> {
        self.run(&["push", "--set-upstream", "--force", remote, branch])
            .await?;
        info!("Pushed {} to {}", branch, remote);
        Ok(())
    }
}

/// Factory for CLI-backed working copies
#[derive(Clone, Default)]
pub struct GitCliFactory {
    secrets: Vec<String>,
}

impl std::fmt::Debug for GitCliFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitCliFactory")
            .field("secrets", &self.secrets.len())
            .finish()
    }
}

impl GitCliFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scrub this value from errors of every working copy opened
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secrets.push(secret.into());
        self
    }
}

impl WorkingCopyFactory for GitCliFactory {
    fn open(&self, path: &Path) -> Arc<dyn WorkingCopy> {
        let copy = self
            .secrets
            .iter()
            .fold(GitWorkingCopy::open(path), |copy, secret| {
                copy.with_secret(secret.clone())
            });
        Arc::new(copy)
    }
}
