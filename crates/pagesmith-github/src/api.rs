//! GitHub REST calls used by the repository lifecycle and Pages activation
//!
//! Provider responses that drive control flow are mapped to explicit error
//! variants here, so callers match on [`pagesmith_core::ErrorKind`] instead of
//! inspecting status codes or bodies.

use async_trait::async_trait;
use pagesmith_core::{GitHubSettings, PagesmithConfig, PagesmithError, Result};
use pagesmith_git::MemoryRemotes;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// Repository hosting provider
#[async_trait]
pub trait HostingApi: Send + Sync + std::fmt::Debug {
    /// Create a public, empty repository owned by the configured account
    ///
    /// Fails with [`PagesmithError::NameConflict`] if the name is taken.
    async fn create_repository(&self, name: &str) -> Result<()>;

    /// Create the Pages configuration serving `branch` at the root path
    ///
    /// Fails with [`PagesmithError::AlreadyConfigured`] if one exists and
    /// [`PagesmithError::BranchNotFound`] if the branch is not visible yet.
    async fn create_pages(&self, repo: &str, branch: &str) -> Result<()>;

    /// Point an existing Pages configuration at `branch`, root path
    async fn update_pages(&self, repo: &str, branch: &str) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct CreateRepositoryRequest<'a> {
    name: &'a str,
    private: bool,
    auto_init: bool,
}

#[derive(Debug, Serialize)]
struct PagesSource<'a> {
    branch: &'a str,
    path: &'a str,
}

#[derive(Debug, Serialize)]
struct PagesRequest<'a> {
    source: PagesSource<'a>,
}

/// Marker GitHub puts in the 422 body when the Pages branch is missing
const BRANCH_MISSING_MARKER: &str = "branch must exist";

/// [`HostingApi`] backed by the GitHub REST API
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    settings: GitHubSettings,
    account: String,
    token: String,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_base", &self.settings.api_base)
            .field("account", &self.account)
            .field("token", &"********")
            .finish()
    }
}

impl GitHubClient {
    pub fn new(config: &PagesmithConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("pagesmith/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PagesmithError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            settings: config.service.github.clone(),
            account: config.account().to_string(),
            token: config.credentials.github_token.clone(),
        })
    }

    fn pages_endpoint(&self, repo: &str) -> String {
        format!(
            "{}/repos/{}/{}/pages",
            self.settings.api_base.trim_end_matches('/'),
            self.account,
            repo
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", &self.settings.api_version)
    }

    async fn send_pages(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
        repo: &str,
        branch: &str,
    ) -> Result<()> {
        let body = PagesRequest {
            source: PagesSource { branch, path: "/" },
        };
        let response = self
            .authorized(request)
            .timeout(Duration::from_secs(self.settings.pages_timeout_secs))
            .json(&body)
            .send()
            .await
            .map_err(|e| PagesmithError::transport(operation, e))?;

        let status = response.status().as_u16();
        if response.status().is_success() {
            debug!("{} for {} returned {}", operation, repo, status);
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        Err(classify_pages_failure(operation, repo, status, text))
    }
}

/// Map a failed Pages response to its error variant
fn classify_pages_failure(operation: &str, repo: &str, status: u16, body: String) -> PagesmithError {
    match status {
        409 => PagesmithError::AlreadyConfigured(repo.to_string()),
        422 if body.to_lowercase().contains(BRANCH_MISSING_MARKER) => {
            PagesmithError::BranchNotFound(format!("{}: {}", repo, body.trim()))
        }
        _ => PagesmithError::http(operation, status, body),
    }
}

#[async_trait]
impl HostingApi for GitHubClient {
    async fn create_repository(&self, name: &str) -> Result<()> {
        let url = format!("{}/user/repos", self.settings.api_base.trim_end_matches('/'));
        let body = CreateRepositoryRequest {
            name,
            private: false,
            auto_init: false,
        };

        let response = self
            .authorized(self.http.post(&url))
            .timeout(Duration::from_secs(self.settings.repo_timeout_secs))
            .json(&body)
            .send()
            .await
            .map_err(|e| PagesmithError::transport("create repository", e))?;

        let status = response.status().as_u16();
        if response.status().is_success() {
            info!("Created repository {}/{}", self.account, name);
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        if status == 422 {
            return Err(PagesmithError::NameConflict(name.to_string()));
        }
        Err(PagesmithError::http("create repository", status, text))
    }

    async fn create_pages(&self, repo: &str, branch: &str) -> Result<()> {
        let request = self.http.post(self.pages_endpoint(repo));
        self.send_pages("create pages", request, repo, branch).await
    }

    async fn update_pages(&self, repo: &str, branch: &str) -> Result<()> {
        let request = self.http.put(self.pages_endpoint(repo));
        self.send_pages("update pages", request, repo, branch).await
    }
}

/// Calls a [`MockHostingApi`] can be scripted for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockCall {
    CreateRepository,
    CreatePages,
    UpdatePages,
}

/// Scripted reply for one mock call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockReply {
    Ok,
    NameConflict,
    AlreadyConfigured,
    BranchNotFound,
    Status(u16),
    Transport,
}

impl MockReply {
    fn into_result(self, operation: &str, target: &str) -> Result<()> {
        match self {
            Self::Ok => Ok(()),
            Self::NameConflict => Err(PagesmithError::NameConflict(target.to_string())),
            Self::AlreadyConfigured => Err(PagesmithError::AlreadyConfigured(target.to_string())),
            Self::BranchNotFound => Err(PagesmithError::BranchNotFound(format!(
                "{}: main branch must exist",
                target
            ))),
            Self::Status(status) => Err(PagesmithError::http(operation, status, "mock failure")),
            Self::Transport => Err(PagesmithError::transport(operation, "connection reset")),
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    replies: HashMap<MockCall, VecDeque<MockReply>>,
    repositories: HashSet<String>,
    pages: HashSet<String>,
    calls: Vec<String>,
}

/// In-memory hosting provider for testing
///
/// Unscripted calls behave like the real provider: creating a taken name is
/// a conflict, creating Pages twice is a conflict. When backed by
/// [`MemoryRemotes`], created repositories become cloneable remotes.
#[derive(Debug, Default)]
pub struct MockHostingApi {
    state: Mutex<MockState>,
    remotes: Option<(MemoryRemotes, Arc<PagesmithConfig>)>,
}

impl MockHostingApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register created repositories as remotes at the config's push URL
    pub fn backed_by(remotes: MemoryRemotes, config: Arc<PagesmithConfig>) -> Self {
        Self {
            state: Mutex::default(),
            remotes: Some((remotes, config)),
        }
    }

    /// Treat `name` as already existing
    pub fn with_repository(self, name: &str) -> Self {
        self.lock().repositories.insert(name.to_string());
        self
    }

    /// Queue replies for a call; once drained, default behavior resumes
    pub fn with_replies(self, call: MockCall, replies: impl IntoIterator<Item = MockReply>) -> Self {
        self.lock().replies.entry(call).or_default().extend(replies);
        self
    }

    /// Calls received so far, e.g. `create_pages demo main`
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn count(&self, call: MockCall) -> usize {
        let prefix = match call {
            MockCall::CreateRepository => "create_repository ",
            MockCall::CreatePages => "create_pages ",
            MockCall::UpdatePages => "update_pages ",
        };
        self.lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn scripted(state: &mut MockState, call: MockCall) -> Option<MockReply> {
        state.replies.get_mut(&call).and_then(|queue| queue.pop_front())
    }
}

#[async_trait]
impl HostingApi for MockHostingApi {
    async fn create_repository(&self, name: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(format!("create_repository {}", name));

        if let Some(reply) = Self::scripted(&mut state, MockCall::CreateRepository) {
            return reply.into_result("create repository", name);
        }
        if !state.repositories.insert(name.to_string()) {
            return Err(PagesmithError::NameConflict(name.to_string()));
        }
        if let Some((remotes, config)) = &self.remotes {
            remotes.create(&config.authenticated_remote(name));
        }
        Ok(())
    }

    async fn create_pages(&self, repo: &str, branch: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(format!("create_pages {} {}", repo, branch));

        if let Some(reply) = Self::scripted(&mut state, MockCall::CreatePages) {
            return reply.into_result("create pages", repo);
        }
        if !state.pages.insert(repo.to_string()) {
            return Err(PagesmithError::AlreadyConfigured(repo.to_string()));
        }
        Ok(())
    }

    async fn update_pages(&self, repo: &str, branch: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(format!("update_pages {} {}", repo, branch));

        if let Some(reply) = Self::scripted(&mut state, MockCall::UpdatePages) {
            return reply.into_result("update pages", repo);
        }
        state.pages.insert(repo.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagesmith_core::ErrorKind;

    #[test]
    fn test_pages_conflict_maps_to_already_configured() {
        let err = classify_pages_failure("create pages", "demo", 409, String::new());
        assert_eq!(err.kind(), ErrorKind::AlreadyConfigured);
    }

    #[test]
    fn test_pages_missing_branch_is_distinct_from_other_422() {
        let missing = classify_pages_failure(
            "create pages",
            "demo",
            422,
            r#"{"message":"The main branch must exist before GitHub Pages can be built."}"#
                .to_string(),
        );
        assert_eq!(missing.kind(), ErrorKind::BranchNotFound);

        let invalid = classify_pages_failure(
            "create pages",
            "demo",
            422,
            r#"{"message":"Invalid request"}"#.to_string(),
        );
        assert_eq!(invalid.kind(), ErrorKind::HttpStatus);
    }

    #[test]
    fn test_pages_server_error_is_http_status() {
        let err = classify_pages_failure("update pages", "demo", 502, "bad gateway".to_string());
        match err {
            PagesmithError::Http { status, .. } => assert_eq!(status, 502),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_request_bodies() {
        let repo = serde_json::to_value(CreateRepositoryRequest {
            name: "demo",
            private: false,
            auto_init: false,
        })
        .unwrap();
        assert_eq!(
            repo,
            serde_json::json!({"name": "demo", "private": false, "auto_init": false})
        );

        let pages = serde_json::to_value(PagesRequest {
            source: PagesSource {
                branch: "main",
                path: "/",
            },
        })
        .unwrap();
        assert_eq!(
            pages,
            serde_json::json!({"source": {"branch": "main", "path": "/"}})
        );
    }

    #[test]
    fn test_pages_endpoint() {
        let client = GitHubClient::new(&PagesmithConfig::for_account("octo")).unwrap();
        assert_eq!(
            client.pages_endpoint("demo"),
            "https://api.github.com/repos/octo/demo/pages"
        );
    }

    #[tokio::test]
    async fn test_mock_create_twice_conflicts() {
        let api = MockHostingApi::new();
        api.create_repository("demo").await.unwrap();
        let err = api.create_repository("demo").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NameConflict);
        assert_eq!(api.count(MockCall::CreateRepository), 2);
    }

    #[tokio::test]
    async fn test_mock_scripted_replies_drain() {
        let api = MockHostingApi::new()
            .with_replies(MockCall::CreatePages, [MockReply::BranchNotFound]);
        assert_eq!(
            api.create_pages("demo", "main").await.unwrap_err().kind(),
            ErrorKind::BranchNotFound
        );
        api.create_pages("demo", "main").await.unwrap();
    }
}
