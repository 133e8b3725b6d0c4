//! Configuration management for Pagesmith
//!
//! Secrets come from the environment (optionally seeded from a `.env` file).
//! Service tunables come from an optional `pagesmith.toml`. The resulting
//! [`PagesmithConfig`] is built once and handed to every component at
//! construction time.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{PagesmithError, Result};

/// Default location of the tunables file
pub const DEFAULT_CONFIG_FILE: &str = "pagesmith.toml";

const MASK: &str = "********";

/// Complete runtime configuration
#[derive(Debug, Clone)]
pub struct PagesmithConfig {
    pub credentials: Credentials,
    pub service: ServiceSettings,
}

/// Secrets and account identity
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Generative model API key
    pub google_api_key: String,
    /// GitHub token used for REST calls and git transport
    pub github_token: String,
    /// GitHub account that owns the generated repositories
    pub github_user: String,
    /// Shared secret callers must present
    pub student_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("google_api_key", &MASK)
            .field("github_token", &MASK)
            .field("github_user", &self.github_user)
            .field("student_secret", &MASK)
            .finish()
    }
}

impl Credentials {
    /// Environment variable names, in the order they are reported when missing
    pub const VARS: [&'static str; 4] = [
        "GOOGLE_API_KEY",
        "GITHUB_TOKEN",
        "GITHUB_USER",
        "STUDENT_SECRET",
    ];

    /// Load credentials from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load credentials through an arbitrary lookup
    ///
    /// Blank values count as missing; all missing names are reported at once.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut fetch = |name: &str| match lookup(name) {
            Some(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => {
                missing.push(name.to_string());
                String::new()
            }
        };

        let [google_api_key, github_token, github_user, student_secret] =
            Self::VARS.map(&mut fetch);
        let credentials = Self {
            google_api_key,
            github_token,
            github_user,
            student_secret,
        };

        if !missing.is_empty() {
            return Err(PagesmithError::Config(format!(
                "Missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        Ok(credentials)
    }
}

/// Tunable service settings, loaded from `pagesmith.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Address the HTTP intake listens on
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Directory under which per-task working copies are created
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,

    /// Keep task working copies after the workflow ends
    #[serde(default)]
    pub keep_workdirs: bool,

    /// Generative model settings
    #[serde(default)]
    pub model: ModelSettings,

    /// GitHub settings
    #[serde(default)]
    pub github: GitHubSettings,

    /// Identity used for commits
    #[serde(default)]
    pub commit: CommitIdentity,
}

/// Generative model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default = "default_model_name")]
    pub name: String,

    #[serde(default = "default_model_api_base")]
    pub api_base: String,

    #[serde(default = "default_model_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

/// GitHub REST and Pages settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitHubSettings {
    #[serde(default = "default_github_api_base")]
    pub api_base: String,

    #[serde(default = "default_github_api_version")]
    pub api_version: String,

    /// Host serving git transport and repository pages
    #[serde(default = "default_github_web_host")]
    pub web_host: String,

    /// Host suffix for published sites: `https://<account>.<pages_host>/<repo>/`
    #[serde(default = "default_pages_host")]
    pub pages_host: String,

    /// Primary branch pushed and served
    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default = "default_repo_timeout_secs")]
    pub repo_timeout_secs: u64,

    #[serde(default = "default_pages_timeout_secs")]
    pub pages_timeout_secs: u64,

    /// Pause between a successful push and Pages activation
    #[serde(default = "default_activation_delay_secs")]
    pub activation_delay_secs: u64,
}

/// Author/committer identity for generated commits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitIdentity {
    #[serde(default = "default_commit_name")]
    pub name: String,

    #[serde(default = "default_commit_email")]
    pub email: String,
}

// Default value providers
fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_workspace_root() -> PathBuf {
    std::env::temp_dir().join("pagesmith")
}

fn default_model_name() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_model_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta/models".to_string()
}

fn default_model_timeout_secs() -> u64 {
    180
}

fn default_temperature() -> f32 {
    0.1
}

fn default_github_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_github_api_version() -> String {
    "2022-11-28".to_string()
}

fn default_github_web_host() -> String {
    "github.com".to_string()
}

fn default_pages_host() -> String {
    "github.io".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_repo_timeout_secs() -> u64 {
    45
}

fn default_pages_timeout_secs() -> u64 {
    30
}

fn default_activation_delay_secs() -> u64 {
    5
}

fn default_commit_name() -> String {
    "LLM Agent Bot".to_string()
}

fn default_commit_email() -> String {
    "bot@example.com".to_string()
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            workspace_root: default_workspace_root(),
            keep_workdirs: false,
            model: ModelSettings::default(),
            github: GitHubSettings::default(),
            commit: CommitIdentity::default(),
        }
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            api_base: default_model_api_base(),
            timeout_secs: default_model_timeout_secs(),
            temperature: default_temperature(),
        }
    }
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            api_base: default_github_api_base(),
            api_version: default_github_api_version(),
            web_host: default_github_web_host(),
            pages_host: default_pages_host(),
            branch: default_branch(),
            repo_timeout_secs: default_repo_timeout_secs(),
            pages_timeout_secs: default_pages_timeout_secs(),
            activation_delay_secs: default_activation_delay_secs(),
        }
    }
}

impl Default for CommitIdentity {
    fn default() -> Self {
        Self {
            name: default_commit_name(),
            email: default_commit_email(),
        }
    }
}

impl ServiceSettings {
    /// Load settings from a TOML file, or use defaults when it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content).map_err(|e| {
                PagesmithError::Config(format!(
                    "Failed to parse {}: {}",
                    path.display(),
                    e
                ))
            })
        } else {
            Ok(Self::default())
        }
    }

    /// Write the default settings to a TOML file
    pub fn write_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| PagesmithError::Config(format!("Failed to serialize settings: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `PAGESMITH_BIND` / `PAGESMITH_WORKDIR` overrides
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("PAGESMITH_BIND").filter(|v| !v.trim().is_empty()) {
            self.bind_addr = bind;
        }
        if let Some(dir) = lookup("PAGESMITH_WORKDIR").filter(|v| !v.trim().is_empty()) {
            self.workspace_root = PathBuf::from(dir);
        }
    }
}

impl PagesmithConfig {
    pub fn new(credentials: Credentials, service: ServiceSettings) -> Self {
        Self {
            credentials,
            service,
        }
    }

    /// Load `.env` (if present), environment secrets and the optional tunables file
    pub fn load(settings_path: Option<&Path>) -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(PagesmithError::Config(format!("Failed to read .env: {}", e)));
            }
        }

        let credentials = Credentials::from_env()?;
        let path = settings_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let mut service = ServiceSettings::load_or_default(path)?;
        service.apply_overrides(|name| std::env::var(name).ok());

        Ok(Self::new(credentials, service))
    }

    /// Account owning the generated repositories
    pub fn account(&self) -> &str {
        &self.credentials.github_user
    }

    /// Public web URL of a repository
    pub fn repo_url(&self, repo: &str) -> String {
        format!(
            "https://{}/{}/{}",
            self.service.github.web_host,
            self.account(),
            repo
        )
    }

    /// Published site URL of a repository
    pub fn pages_url(&self, repo: &str) -> String {
        format!(
            "https://{}.{}/{}/",
            self.account(),
            self.service.github.pages_host,
            repo
        )
    }

    /// Git remote URL with the token embedded
    pub fn authenticated_remote(&self, repo: &str) -> String {
        format!(
            "https://{}:{}@{}/{}/{}.git",
            self.account(),
            self.credentials.github_token,
            self.service.github.web_host,
            self.account(),
            repo
        )
    }

    /// Remove every secret from text before it is logged or surfaced
    pub fn redact(&self, text: &str) -> String {
        let mut out = text.to_string();
        for secret in [
            &self.credentials.github_token,
            &self.credentials.google_api_key,
            &self.credentials.student_secret,
        ] {
            if !secret.is_empty() {
                out = out.replace(secret.as_str(), MASK);
            }
        }
        out
    }

    /// Pause between push and hosting activation
    pub fn activation_delay(&self) -> Duration {
        Duration::from_secs(self.service.github.activation_delay_secs)
    }

    /// Human-readable summary with secrets masked
    pub fn summary(&self) -> String {
        format!(
            "Settings loaded:\n  GITHUB_USER: {}\n  STUDENT_SECRET: {MASK}\n  GITHUB_TOKEN: {MASK}\n  GOOGLE_API_KEY: {MASK}\n  bind: {}\n  workspace: {}\n  model: {}",
            self.account(),
            self.service.bind_addr,
            self.service.workspace_root.display(),
            self.service.model.name,
        )
    }

    /// Configuration with fixed fake credentials, for tests and local dry runs
    pub fn for_account(account: &str) -> Self {
        Self::new(
            Credentials {
                google_api_key: "test-google-key".to_string(),
                github_token: "test-github-token".to_string(),
                github_user: account.to_string(),
                student_secret: "test-secret".to_string(),
            },
            ServiceSettings::default(),
        )
    }
}
