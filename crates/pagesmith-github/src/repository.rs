//! Repository lifecycle: create-or-clone, then commit-if-dirty and push

use pagesmith_core::{ErrorKind, PagesmithConfig, PagesmithError, RepoBranch, Result, Task};
use pagesmith_git::WorkingCopy;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::api::HostingApi;

/// Name of the push remote registered on every working copy
pub const REMOTE_NAME: &str = "origin";

/// A prepared working copy and the lifecycle branch that produced it
#[derive(Debug, Clone)]
pub struct RepositoryState {
    working_copy: Arc<dyn WorkingCopy>,
    branch: RepoBranch,
    repo: String,
}

impl RepositoryState {
    pub fn branch(&self) -> RepoBranch {
        self.branch
    }

    pub fn repo_name(&self) -> &str {
        &self.repo
    }

    /// Directory generated files must be written into
    pub fn path(&self) -> &Path {
        self.working_copy.path()
    }
}

/// Decides between creating and cloning a task's repository, and publishes it
#[derive(Debug, Clone)]
pub struct RepositoryManager {
    config: Arc<PagesmithConfig>,
    hosting: Arc<dyn HostingApi>,
}

impl RepositoryManager {
    pub fn new(config: Arc<PagesmithConfig>, hosting: Arc<dyn HostingApi>) -> Self {
        Self { config, hosting }
    }

    /// Prepare `working_copy` for the task
    ///
    /// Round 1 creates the remote and initializes an empty working copy. If
    /// the name is taken, or for any later round, the remote is cloned.
    #[instrument(skip(self, task, working_copy), fields(task = %task.id, round = task.round))]
    pub async fn setup(
        &self,
        task: &Task,
        working_copy: Arc<dyn WorkingCopy>,
    ) -> Result<RepositoryState> {
        let repo = task.repo_name();
        let remote = self.config.authenticated_remote(&repo);

        if task.round == 1 {
            match self.hosting.create_repository(&repo).await {
                Ok(()) => {
                    working_copy.init().await?;
                    working_copy.add_remote(REMOTE_NAME, &remote).await?;
                    info!("Repository {} created", repo);
                    return Ok(RepositoryState {
                        working_copy,
                        branch: RepoBranch::Created,
                        repo,
                    });
                }
                Err(e) if e.kind() == ErrorKind::NameConflict => {
                    info!("Repository {} already exists, cloning instead", repo);
                }
                Err(e) => return Err(e),
            }
        }

        working_copy
            .clone_remote(&remote)
            .await
            .map_err(|e| match e {
                PagesmithError::GitCommand(msg) => {
                    PagesmithError::GitCommand(self.config.redact(&msg))
                }
                other => other,
            })?;
        info!("Repository {} cloned", repo);

        Ok(RepositoryState {
            working_copy,
            branch: RepoBranch::Cloned,
            repo,
        })
    }

    /// Commit whatever is on disk and push it
    ///
    /// Returns the current HEAD unchanged when nothing differs from it. A
    /// first publish with nothing staged is a content error. Push failures are
    /// returned as-is; they are not retried.
    #[instrument(skip(self, state), fields(repo = %state.repo))]
    pub async fn publish(&self, state: &RepositoryState, task_id: &str, round: u32) -> Result<String> {
        let copy = &state.working_copy;
        let branch = self.config.service.github.branch.as_str();

        copy.set_identity(&self.config.service.commit).await?;
        copy.stage_all().await?;

        let staged = copy.has_staged_changes().await?;
        match copy.head_commit().await? {
            None if !staged => {
                return Err(PagesmithError::ContentContract(format!(
                    "nothing to commit on first publish of {}",
                    state.repo
                )));
            }
            Some(head) if !staged => {
                info!("No changes since {}, skipping commit", head);
                return Ok(head);
            }
            _ => {}
        }

        let sha = copy.commit(&commit_message(task_id, round)).await?;
        copy.rename_branch(branch).await?;
        copy.push_upstream(REMOTE_NAME, branch).await?;
        info!("Published {} at {}", state.repo, sha);

        Ok(sha)
    }
}

/// Commit message identifying the task and round
pub fn commit_message(task_id: &str, round: u32) -> String {
    format!("Task: {} | Round: {}", task_id, round)
}
