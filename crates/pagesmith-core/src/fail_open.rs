//! Fail-open helper for housekeeping
//!
//! Use for work whose failure must not change a task's outcome, such as
//! removing a finished working directory. Never for workflow steps.

use std::future::Future;
use tracing::warn;

use crate::Result;

/// Run an operation that should fail open
///
/// Logs the error via `tracing::warn!` on failure and returns `None`.
///
/// ```no_run
/// use pagesmith_core::fail_open::fail_open;
/// use pagesmith_core::Result;
///
/// async fn remove_workdir() -> Result<()> {
///     Ok(())
/// }
///
/// async fn example() {
///     let removed = fail_open("workdir cleanup", || remove_workdir()).await;
///     assert!(removed.is_some());
/// }
/// ```
pub async fn fail_open<F, Fut, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PagesmithError;

    #[tokio::test]
    async fn test_fail_open_success() {
        let result = fail_open("test_op", || async { Ok::<_, PagesmithError>(42) }).await;
        assert_eq!(result, Some(42));
    }

    #[tokio::test]
    async fn test_fail_open_failure() {
        let result = fail_open("test_op", || async {
            Err::<i32, _>(PagesmithError::Other("disk full".to_string()))
        })
        .await;
        assert_eq!(result, None);
    }
}
