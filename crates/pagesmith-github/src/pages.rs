//! GitHub Pages activation

use pagesmith_core::retry::{retry, Disposition};
use pagesmith_core::{ErrorKind, PagesmithConfig, PagesmithError, Result, RetryPolicy};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::api::HostingApi;

/// Ensures a repository is served from its primary branch
#[derive(Debug, Clone)]
pub struct PagesActivator {
    config: Arc<PagesmithConfig>,
    hosting: Arc<dyn HostingApi>,
    policy: RetryPolicy,
}

impl PagesActivator {
    pub fn new(config: Arc<PagesmithConfig>, hosting: Arc<dyn HostingApi>) -> Self {
        Self {
            config,
            hosting,
            policy: RetryPolicy::hosting_activation(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Create or update the Pages configuration and return the site URL
    ///
    /// Retries only while the provider reports the branch as missing.
    #[instrument(skip(self))]
    pub async fn activate(&self, repo: &str) -> Result<String> {
        let branch = self.config.service.github.branch.as_str();
        let hosting = &self.hosting;

        let outcome = retry(
            "pages activation",
            &self.policy,
            branch_not_yet_visible,
            |_attempt| async move {
                match hosting.create_pages(repo, branch).await {
                    Err(e) if e.kind() == ErrorKind::AlreadyConfigured => {
                        info!("Pages already configured for {}, updating", repo);
                        hosting.update_pages(repo, branch).await
                    }
                    other => other,
                }
            },
        )
        .await;

        match outcome {
            Ok(()) => {
                let url = self.config.pages_url(repo);
                info!("Pages enabled at {}", url);
                Ok(url)
            }
            Err(PagesmithError::RetriesExhausted { attempts, last, .. }) => {
                Err(PagesmithError::ActivationExhausted { attempts, last })
            }
            Err(e) => Err(e),
        }
    }
}

/// Retry only the "primary branch not found" signal
pub fn branch_not_yet_visible(error: &PagesmithError) -> Disposition {
    match error.kind() {
        ErrorKind::BranchNotFound => Disposition::Retry,
        _ => Disposition::Abort,
    }
}
