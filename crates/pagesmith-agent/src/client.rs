//! Gemini API client
//!
//! One call per attempt and nothing else: retries, parsing and content checks
//! live in [`crate::GenerationClient`].

use async_trait::async_trait;
use pagesmith_core::{ModelSettings, PagesmithConfig, PagesmithError, Result};
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use crate::types::{GenerateContentRequest, GenerateContentResponse};

/// A generative model reachable over the network
#[async_trait]
pub trait GenerativeModel: Send + Sync + std::fmt::Debug {
    /// Send one `generateContent` request
    async fn generate_content(&self, request: &GenerateContentRequest) -> Result<GenerateContentResponse>;
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// Readable message from a Gemini error body, falling back to the raw text
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            let status = wrapper.error.status.unwrap_or_default();
            let message = wrapper.error.message.unwrap_or_else(|| body.to_string());
            if status.is_empty() {
                message
            } else {
                format!("{status}: {message}")
            }
        })
        .unwrap_or_else(|_| body.to_string())
}

/// [`GenerativeModel`] backed by the Gemini REST API
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    settings: ModelSettings,
    api_key: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.settings.name)
            .field("api_key", &"********")
            .finish()
    }
}

impl GeminiClient {
    pub fn new(config: &PagesmithConfig) -> Result<Self> {
        let settings = config.service.model.clone();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| PagesmithError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            settings,
            api_key: config.credentials.google_api_key.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}:generateContent",
            self.settings.api_base.trim_end_matches('/'),
            self.settings.name
        )
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate_content(&self, request: &GenerateContentRequest) -> Result<GenerateContentResponse> {
        debug!("Sending request to {} model", self.settings.name);

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| PagesmithError::transport("generate content", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PagesmithError::http(
                "generate content",
                status.as_u16(),
                error_message(&body),
            ));
        }

        let text = response
            .text()
            .await
            .map_err(|e| PagesmithError::transport("generate content", e))?;
        serde_json::from_str(&text).map_err(|e| {
            PagesmithError::MalformedResponse(format!("Failed to parse Gemini response: {}", e))
        })
    }
}

/// Scripted reply for [`MockModel`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelReply {
    /// A candidate whose first part carries this text
    Text(String),
    /// A response with no candidates
    Empty,
    Status(u16),
    Transport,
}

impl ModelReply {
    /// Text reply holding a `{files: [...]}` document
    pub fn files(files: &[(&str, &str)]) -> Self {
        let files: Vec<serde_json::Value> = files
            .iter()
            .map(|(path, content)| serde_json::json!({ "path": path, "content": content }))
            .collect();
        Self::Text(serde_json::json!({ "files": files }).to_string())
    }

    /// A complete site with the three required files
    pub fn site(title: &str) -> Self {
        let index = format!("<!doctype html><title>{title}</title><h1>{title}</h1>");
        let readme = format!("# {title}");
        Self::files(&[
            ("index.html", index.as_str()),
            ("README.md", readme.as_str()),
            ("LICENSE", "MIT License"),
        ])
    }
}

/// Mock model for testing
///
/// Replies are served in order; once drained, the fallback reply (if any)
/// repeats. Every request is recorded.
#[derive(Debug, Default)]
pub struct MockModel {
    replies: Mutex<VecDeque<ModelReply>>,
    fallback: Option<ModelReply>,
    requests: Mutex<Vec<GenerateContentRequest>>,
}

impl MockModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer with `reply`
    pub fn always(reply: ModelReply) -> Self {
        Self {
            fallback: Some(reply),
            ..Self::default()
        }
    }

    pub fn with_replies(self, replies: impl IntoIterator<Item = ModelReply>) -> Self {
        if let Ok(mut queue) = self.replies.lock() {
            queue.extend(replies);
        }
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<GenerateContentRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }
}

#[async_trait]
impl GenerativeModel for MockModel {
    async fn generate_content(&self, request: &GenerateContentRequest) -> Result<GenerateContentResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let next = self
            .replies
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .or_else(|| self.fallback.clone());

        match next {
            Some(ModelReply::Text(text)) => Ok(GenerateContentResponse::from_text(text)),
            Some(ModelReply::Empty) => Ok(GenerateContentResponse::default()),
            Some(ModelReply::Status(status)) => {
                Err(PagesmithError::http("generate content", status, "mock failure"))
            }
            Some(ModelReply::Transport) => {
                Err(PagesmithError::transport("generate content", "connection reset"))
            }
            None => Err(PagesmithError::Other("MockModel has no reply queued".to_string())),
        }
    }
}
