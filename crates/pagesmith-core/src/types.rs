//! Core type definitions for Pagesmith tasks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{PagesmithError, Result};

/// File attached to a task, delivered as a data URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// File name, e.g. `sample.png`
    pub name: String,
    /// Content encoded as a data URI (`data:<mime>;base64,<payload>`)
    pub url: String,
}

/// A task submission
///
/// Immutable once received; the workflow only reads it.
#[derive(Clone, Serialize, Deserialize)]
pub struct Task {
    /// Caller identity
    pub email: String,
    /// Shared secret, checked before the task is scheduled
    pub secret: String,
    /// Unique task id
    #[serde(rename = "task")]
    pub id: String,
    /// Revision index, 1 for the first round
    pub round: u32,
    /// Correlation token echoed back in the notification
    pub nonce: String,
    /// What the generated site should do
    pub brief: String,
    /// Evaluation checks the caller will run
    #[serde(default)]
    pub checks: Vec<String>,
    /// Where the final result is delivered
    #[serde(rename = "evaluation_url")]
    pub callback_url: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("email", &self.email)
            .field("secret", &"********")
            .field("id", &self.id)
            .field("round", &self.round)
            .field("nonce", &self.nonce)
            .field("brief", &self.brief)
            .field("checks", &self.checks)
            .field("callback_url", &self.callback_url)
            .field("attachments", &self.attachments.len())
            .finish()
    }
}

impl Task {
    /// Reject submissions the workflow cannot act on
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(PagesmithError::InvalidTask("task id is empty".to_string()));
        }
        if self.round == 0 {
            return Err(PagesmithError::InvalidTask(format!(
                "round must be at least 1 (task {})",
                self.id
            )));
        }
        validate_repo_name(&self.repo_name())
    }

    /// Repository name derived from the task id
    pub fn repo_name(&self) -> String {
        repo_name_for(&self.id)
    }

    /// Names of all attachments, in submission order
    pub fn attachment_names(&self) -> Vec<String> {
        self.attachments.iter().map(|a| a.name.clone()).collect()
    }
}

/// Repository name for a task id: spaces become dashes, everything lowercased
pub fn repo_name_for(task_id: &str) -> String {
    task_id.trim().replace(' ', "-").to_lowercase()
}

/// Reject names that are not a plain repository name
///
/// The name becomes a directory, a remote URL and an API path segment, so
/// only `[A-Za-z0-9._-]` is allowed and `.`/`..` are refused.
pub fn validate_repo_name(name: &str) -> Result<()> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-');
    if name.is_empty() || name == "." || name == ".." || !name.chars().all(allowed) {
        return Err(PagesmithError::InvalidTask(format!(
            "task id does not form a valid repository name: {:?}",
            name
        )));
    }
    Ok(())
}

/// A file produced by the generative model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    /// Path relative to the repository root
    pub path: String,
    /// Full text content
    pub content: String,
}

impl GeneratedFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Files every generation must contain
pub const REQUIRED_FILES: &[&str] = &["index.html", "README.md", "LICENSE"];

/// Required files missing from a generated set
pub fn missing_required_files(files: &[GeneratedFile]) -> Vec<&'static str> {
    REQUIRED_FILES
        .iter()
        .copied()
        .filter(|required| !files.iter().any(|f| f.path.trim_start_matches("./") == *required))
        .collect()
}

/// Which lifecycle branch produced a working copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoBranch {
    /// A new remote was created and an empty working copy initialized
    Created,
    /// An existing remote was cloned
    Cloned,
}

impl std::fmt::Display for RepoBranch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Cloned => write!(f, "cloned"),
        }
    }
}

/// Outcome of a fully published and hosted task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub success: bool,
    pub email: String,
    pub task: String,
    pub round: u32,
    pub nonce: String,
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_url: String,
    pub completed_at: DateTime<Utc>,
}

impl WorkflowResult {
    /// Build a successful result, echoing the task's identity fields
    pub fn published(
        task: &Task,
        repo_url: impl Into<String>,
        commit_sha: impl Into<String>,
        pages_url: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            email: task.email.clone(),
            task: task.id.clone(),
            round: task.round,
            nonce: task.nonce.clone(),
            repo_url: repo_url.into(),
            commit_sha: commit_sha.into(),
            pages_url: pages_url.into(),
            completed_at: Utc::now(),
        }
    }

    /// Flattened payload delivered to the callback URL
    pub fn payload(&self) -> NotificationPayload {
        NotificationPayload {
            email: self.email.clone(),
            task: self.task.clone(),
            round: self.round,
            nonce: self.nonce.clone(),
            repo_url: self.repo_url.clone(),
            commit_sha: self.commit_sha.clone(),
            pages_url: self.pages_url.clone(),
        }
    }
}

/// JSON body posted to the caller's callback URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub email: String,
    pub task: String,
    pub round: u32,
    pub nonce: String,
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> Task {
        Task {
            email: "student@example.com".to_string(),
            secret: "s3cret".to_string(),
            id: "Demo Task".to_string(),
            round: 1,
            nonce: "abc-123".to_string(),
            brief: "a hello-world page".to_string(),
            checks: vec![],
            callback_url: "https://example.com/notify".to_string(),
            attachments: vec![],
        }
    }

    #[test]
    fn test_task_deserializes_wire_names() {
        let json = r#"{
            "email": "a@b.c",
            "secret": "x",
            "task": "demo",
            "round": 2,
            "nonce": "n-1",
            "brief": "add a contact form",
            "evaluation_url": "https://example.com/cb",
            "attachments": [{"name": "data.csv", "url": "data:text/csv;base64,YSxi"}]
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.id, "demo");
        assert_eq!(task.round, 2);
        assert_eq!(task.callback_url, "https://example.com/cb");
        assert!(task.checks.is_empty());
        assert_eq!(task.attachment_names(), vec!["data.csv".to_string()]);
    }

    #[test]
    fn test_repo_name() {
        assert_eq!(sample_task().repo_name(), "demo-task");
        assert_eq!(repo_name_for("demo"), "demo");
    }

    #[test]
    fn test_validate_rejects_round_zero() {
        let mut task = sample_task();
        assert!(task.validate().is_ok());
        task.round = 0;
        assert!(task.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unsafe_ids() {
        for id in ["../x", "a/b", "..", ".", "a\\b", "demo?x", "ünï"] {
            let mut task = sample_task();
            task.id = id.to_string();
            assert!(task.validate().is_err(), "{id:?} accepted");
        }
        for id in ["demo", "Demo Task", "site.v2", "my_site-1"] {
            let mut task = sample_task();
            task.id = id.to_string();
            assert!(task.validate().is_ok(), "{id:?} rejected");
        }
    }

    #[test]
    fn test_debug_hides_secret() {
        let rendered = format!("{:?}", sample_task());
        assert!(!rendered.contains("s3cret"));
    }

    #[test]
    fn test_missing_required_files() {
        let files = vec![
            GeneratedFile::new("index.html", "<html></html>"),
            GeneratedFile::new("./README.md", "# Demo"),
        ];
        assert_eq!(missing_required_files(&files), vec!["LICENSE"]);
    }

    #[test]
    fn test_payload_echoes_nonce() {
        let task = sample_task();
        let result = WorkflowResult::published(
            &task,
            "https://github.com/octo/demo-task",
            "deadbeef",
            "https://octo.github.io/demo-task/",
        );
        let payload = result.payload();
        assert_eq!(payload.nonce, "abc-123");
        assert_eq!(payload.round, 1);

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["commit_sha"], "deadbeef");
        assert!(value.get("completed_at").is_none());
    }
}
