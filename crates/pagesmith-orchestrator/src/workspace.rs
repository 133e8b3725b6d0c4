//! Per-task working directories

use pagesmith_core::{validate_repo_name, PagesmithError, Result, Task};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A fresh directory owned by one task execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskWorkspace {
    path: PathBuf,
}

impl TaskWorkspace {
    /// Create a new, empty directory for the task under `root`
    ///
    /// Names combine repository, round and a random suffix, so duplicate
    /// submissions never share a directory.
    pub fn prepare(root: &Path, task: &Task) -> Result<Self> {
        let repo = task.repo_name();
        validate_repo_name(&repo)?;

        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let name = format!("{}-r{}-{}", repo, task.round, &suffix[..8]);
        let path = root.join(name);

        if path.exists() {
            return Err(PagesmithError::Other(format!(
                "Working directory already exists: {}",
                path.display()
            )));
        }
        std::fs::create_dir_all(&path)?;
        info!("Prepared working directory {}", path.display());

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the directory and everything in it
    pub async fn remove(&self) -> Result<()> {
        tokio::fs::remove_dir_all(&self.path).await?;
        debug!("Removed working directory {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task {
            email: "student@example.com".to_string(),
            secret: "s".to_string(),
            id: "My Demo".to_string(),
            round: 2,
            nonce: "n".to_string(),
            brief: "b".to_string(),
            checks: Vec::new(),
            callback_url: "https://example.com/notify".to_string(),
            attachments: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_prepare_and_remove() {
        let root = tempfile::tempdir().unwrap();
        let workspace = TaskWorkspace::prepare(root.path(), &task()).unwrap();

        assert!(workspace.path().is_dir());
        let name = workspace.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("my-demo-r2-"));

        std::fs::write(workspace.path().join("index.html"), "x").unwrap();
        workspace.remove().await.unwrap();
        assert!(!workspace.path().exists());
    }

    #[test]
    fn test_duplicate_tasks_get_distinct_directories() {
        let root = tempfile::tempdir().unwrap();
        let first = TaskWorkspace::prepare(root.path(), &task()).unwrap();
        let second = TaskWorkspace::prepare(root.path(), &task()).unwrap();
        assert_ne!(first.path(), second.path());
    }

    #[test]
    fn test_ids_cannot_leave_the_root() {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("work");

        for id in ["../escaped", "a/b"] {
            let mut task = task();
            task.id = id.to_string();
            assert!(TaskWorkspace::prepare(&work, &task).is_err(), "{id} accepted");
        }
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
