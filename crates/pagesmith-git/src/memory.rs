//! In-memory working copy for tests and dry runs
//!
//! File contents are read from the real directory, so whatever the workflow
//! materializes is what gets committed. History and remotes live in memory.

use async_trait::async_trait;
use pagesmith_core::{CommitIdentity, PagesmithError, Result};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::working_copy::{WorkingCopy, WorkingCopyFactory};

/// Snapshot of a tree: relative path -> file bytes
pub type Tree = BTreeMap<String, Vec<u8>>;

/// A commit recorded by [`MemoryWorkingCopy`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryCommit {
    pub id: String,
    pub message: String,
    pub tree: Tree,
}

/// Shared set of remote repositories, keyed by URL
#[derive(Debug, Clone, Default)]
pub struct MemoryRemotes {
    repos: Arc<Mutex<HashMap<String, Vec<MemoryCommit>>>>,
}

impl MemoryRemotes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty remote (as the hosting provider does on creation)
    pub fn create(&self, url: &str) {
        lock(&self.repos).entry(url.to_string()).or_default();
    }

    pub fn exists(&self, url: &str) -> bool {
        lock(&self.repos).contains_key(url)
    }

    /// History of the remote's primary branch, oldest first
    pub fn history(&self, url: &str) -> Vec<MemoryCommit> {
        lock(&self.repos).get(url).cloned().unwrap_or_default()
    }

    fn replace(&self, url: &str, history: Vec<MemoryCommit>) {
        lock(&self.repos).insert(url.to_string(), history);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Debug, Default)]
struct LocalState {
    initialized: bool,
    remotes: HashMap<String, String>,
    identity: Option<CommitIdentity>,
    branch: Option<String>,
    index: Option<Tree>,
    history: Vec<MemoryCommit>,
    fail_push: bool,
}

/// Working copy with in-memory history
#[derive(Debug)]
pub struct MemoryWorkingCopy {
    path: PathBuf,
    remotes: MemoryRemotes,
    state: Mutex<LocalState>,
}

impl MemoryWorkingCopy {
    pub fn new(path: impl Into<PathBuf>, remotes: MemoryRemotes) -> Self {
        Self {
            path: path.into(),
            remotes,
            state: Mutex::new(LocalState::default()),
        }
    }

    /// Make every subsequent push fail
    pub fn fail_pushes(&self) {
        lock(&self.state).fail_push = true;
    }

    /// Local history, oldest first
    pub fn history(&self) -> Vec<MemoryCommit> {
        lock(&self.state).history.clone()
    }

    pub fn branch(&self) -> Option<String> {
        lock(&self.state).branch.clone()
    }

    pub fn identity(&self) -> Option<CommitIdentity> {
        lock(&self.state).identity.clone()
    }

    pub fn remote_url(&self, name: &str) -> Option<String> {
        lock(&self.state).remotes.get(name).cloned()
    }

    fn ensure_repo(state: &LocalState) -> Result<()> {
        if state.initialized {
            Ok(())
        } else {
            Err(PagesmithError::GitCommand(
                "fatal: not a git repository".to_string(),
            ))
        }
    }
}

#[async_trait]
impl WorkingCopy for MemoryWorkingCopy {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.path)?;
        let mut state = lock(&self.state);
        state.initialized = true;
        state.branch = Some("master".to_string());
        Ok(())
    }

    async fn add_remote(&self, name: &str, url: &str) -> Result<()> {
        let mut state = lock(&self.state);
        Self::ensure_repo(&state)?;
        if state.remotes.contains_key(name) {
            return Err(PagesmithError::GitCommand(format!(
                "error: remote {} already exists",
                name
            )));
        }
        state.remotes.insert(name.to_string(), url.to_string());
        Ok(())
    }

    async fn clone_remote(&self, url: &str) -> Result<()> {
        if !self.remotes.exists(url) {
            return Err(PagesmithError::GitCommand(format!(
                "fatal: repository '{}' not found",
                url
            )));
        }
        std::fs::create_dir_all(&self.path)?;
        if std::fs::read_dir(&self.path)?.next().is_some() {
            return Err(PagesmithError::GitCommand(format!(
                "fatal: destination path '{}' is not empty",
                self.path.display()
            )));
        }

        let history = self.remotes.history(url);
        if let Some(tip) = history.last() {
            write_tree(&self.path, &tip.tree)?;
        }

        let mut state = lock(&self.state);
        state.initialized = true;
        state.branch = Some("main".to_string());
        state.remotes.insert("origin".to_string(), url.to_string());
        state.history = history;
        Ok(())
    }

    async fn set_identity(&self, identity: &CommitIdentity) -> Result<()> {
        let mut state = lock(&self.state);
        Self::ensure_repo(&state)?;
        state.identity = Some(identity.clone());
        Ok(())
    }

    async fn stage_all(&self) -> Result<()> {
        let tree = snapshot(&self.path)?;
        let mut state = lock(&self.state);
        Self::ensure_repo(&state)?;
        state.index = Some(tree);
        Ok(())
    }

    async fn head_commit(&self) -> Result<Option<String>> {
        let state = lock(&self.state);
        Self::ensure_repo(&state)?;
        Ok(state.history.last().map(|c| c.id.clone()))
    }

    async fn has_staged_changes(&self) -> Result<bool> {
        let state = lock(&self.state);
        Self::ensure_repo(&state)?;
        let index = state.index.clone().unwrap_or_default();
        Ok(match state.history.last() {
            None => !index.is_empty(),
            Some(head) => head.tree != index,
        })
    }

    async fn commit(&self, message: &str) -> Result<String> {
        let mut state = lock(&self.state);
        Self::ensure_repo(&state)?;
        if state.identity.is_none() {
            return Err(PagesmithError::GitCommand(
                "Author identity unknown".to_string(),
            ));
        }
        let tree = state.index.clone().unwrap_or_default();
        let parent = state.history.last().map(|c| c.id.clone()).unwrap_or_default();
        let id = commit_id(&parent, message, &tree);
        state.history.push(MemoryCommit {
            id: id.clone(),
            message: message.to_string(),
            tree,
        });
        Ok(id)
    }

    async fn rename_branch(&self, branch: &str) -> Result<()> {
        let mut state = lock(&self.state);
        Self::ensure_repo(&state)?;
        state.branch = Some(branch.to_string());
        Ok(())
    }

    async fn push_upstream(&self, remote: &str, branch: &str) -> Result<()> {
        let (url, history) = {
            let state = lock(&self.state);
            Self::ensure_repo(&state)?;
            if state.fail_push {
                return Err(PagesmithError::GitCommand(
                    "fatal: unable to access remote: Connection reset".to_string(),
                ));
            }
            if state.branch.as_deref() != Some(branch) {
                return Err(PagesmithError::GitCommand(format!(
                    "error: src refspec {} does not match any",
                    branch
                )));
            }
            let url = state.remotes.get(remote).cloned().ok_or_else(|| {
                PagesmithError::GitCommand(format!("fatal: '{}' does not appear to be a git repository", remote))
            })?;
            (url, state.history.clone())
        };

        if !self.remotes.exists(&url) {
            return Err(PagesmithError::GitCommand(format!(
                "fatal: repository '{}' not found",
                url
            )));
        }
        self.remotes.replace(&url, history);
        Ok(())
    }
}

/// Factory producing [`MemoryWorkingCopy`] handles that share one remote set
#[derive(Debug, Clone, Default)]
pub struct MemoryFactory {
    remotes: MemoryRemotes,
    opened: Arc<Mutex<Vec<Arc<MemoryWorkingCopy>>>>,
}

impl MemoryFactory {
    pub fn new(remotes: MemoryRemotes) -> Self {
        Self {
            remotes,
            opened: Arc::default(),
        }
    }

    /// Every working copy handed out so far, in order
    pub fn opened(&self) -> Vec<Arc<MemoryWorkingCopy>> {
        lock(&self.opened).clone()
    }
}

impl WorkingCopyFactory for MemoryFactory {
    fn open(&self, path: &Path) -> Arc<dyn WorkingCopy> {
        let copy = Arc::new(MemoryWorkingCopy::new(path, self.remotes.clone()));
        lock(&self.opened).push(Arc::clone(&copy));
        copy
    }
}

fn commit_id(parent: &str, message: &str, tree: &Tree) -> String {
    let mut hasher = Sha256::new();
    hasher.update(parent.as_bytes());
    hasher.update(message.as_bytes());
    for (path, content) in tree {
        hasher.update(path.as_bytes());
        hasher.update(content);
    }
    hex::encode(hasher.finalize())[..40].to_string()
}

/// Read every file under `root` (skipping `.git`) into a tree
pub fn snapshot(root: &Path) -> Result<Tree> {
    let mut tree = Tree::new();
    if root.exists() {
        collect(root, root, &mut tree)?;
    }
    Ok(tree)
}

fn collect(root: &Path, dir: &Path, tree: &mut Tree) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_name() == ".git" {
            continue;
        }
        if entry.file_type()?.is_dir() {
            collect(root, &path, tree)?;
        } else {
            let relative = path
                .strip_prefix(root)
                .map_err(|e| PagesmithError::Other(e.to_string()))?
                .to_string_lossy()
                .replace('\\', "/");
            tree.insert(relative, std::fs::read(&path)?);
        }
    }
    Ok(())
}

fn write_tree(root: &Path, tree: &Tree) -> Result<()> {
    for (relative, content) in tree {
        let target = root.join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(target, content)?;
    }
    Ok(())
}
