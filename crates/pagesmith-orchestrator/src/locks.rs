//! Per-repository serialization of workflow runs
//!
//! Two runs against the same repository name (duplicate submissions, or a
//! revision arriving while the previous round is still running) would
//! otherwise interleave clone, commit and push. Runs on different
//! repositories are not affected.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OwnedMutexGuard;

type LockMap = HashMap<String, Arc<tokio::sync::Mutex<()>>>;

/// Registry of one async lock per repository name
#[derive(Debug, Clone, Default)]
pub struct RepoLocks {
    locks: Arc<Mutex<LockMap>>,
}

/// Held lock on one repository; the registry entry is dropped with the last holder
#[derive(Debug)]
pub struct RepoGuard {
    repo: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<Mutex<LockMap>>,
}

fn lock_map(locks: &Mutex<LockMap>) -> MutexGuard<'_, LockMap> {
    match locks.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl RepoLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other run holds `repo`, then hold it until the guard drops
    pub async fn acquire(&self, repo: &str) -> RepoGuard {
        let lock = Arc::clone(lock_map(&self.locks).entry(repo.to_string()).or_default());
        let guard = lock.lock_owned().await;
        RepoGuard {
            repo: repo.to_string(),
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Whether a run currently holds `repo`
    pub fn is_held(&self, repo: &str) -> bool {
        lock_map(&self.locks)
            .get(repo)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }

    /// Number of repositories held or waited on
    pub fn len(&self) -> usize {
        lock_map(&self.locks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for RepoGuard {
    fn drop(&mut self) {
        // Release first so the owned guard no longer counts as a reference
        self.guard.take();
        let mut locks = lock_map(&self.locks);
        // Waiters hold their own clone, so a count of 1 means only the map is left
        if locks
            .get(&self.repo)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.repo);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_repo_is_serialized() {
        let locks = RepoLocks::new();
        let guard = locks.acquire("demo").await;
        assert!(locks.is_held("demo"));

        let waiting = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("demo").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .unwrap()
            .unwrap();
        assert!(!locks.is_held("demo"));
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_released_repos_are_pruned() {
        let locks = RepoLocks::new();
        let demo = locks.acquire("demo").await;
        let other = locks.acquire("other").await;
        assert_eq!(locks.len(), 2);

        drop(demo);
        assert_eq!(locks.len(), 1);
        assert!(!locks.is_held("demo"));

        drop(other);
        assert!(locks.is_empty());

        // Reacquiring after pruning still serializes
        let again = locks.acquire("demo").await;
        assert!(locks.is_held("demo"));
        drop(again);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_entry_survives_while_someone_waits() {
        let locks = RepoLocks::new();
        let first = locks.acquire("demo").await;

        let waiting = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("demo").await;
                tokio::time::sleep(Duration::from_millis(20)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(first);
        assert_eq!(locks.len(), 1);

        tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .unwrap()
            .unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_different_repos_do_not_block() {
        let locks = RepoLocks::new();
        let _demo = locks.acquire("demo").await;
        let other = tokio::time::timeout(Duration::from_millis(100), locks.acquire("other")).await;
        assert!(other.is_ok());
    }
}
