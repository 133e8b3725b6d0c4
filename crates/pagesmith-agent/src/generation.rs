//! Generation client: prompt in, validated files out

use pagesmith_core::retry::{retry, transient_network};
use pagesmith_core::{
    missing_required_files, GeneratedFile, PagesmithError, Result, RetryPolicy, Task,
};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::client::GenerativeModel;
use crate::prompt::{build_prompt, response_schema, RESPONSE_MIME_TYPE, SYSTEM_PROMPT};
use crate::types::{
    Content, GenerateContentRequest, GenerateContentResponse, GeneratedSite, GenerationConfig,
    Part,
};

/// Asks the model for a site and checks what comes back
#[derive(Debug, Clone)]
pub struct GenerationClient {
    model: Arc<dyn GenerativeModel>,
    policy: RetryPolicy,
    temperature: f32,
}

impl GenerationClient {
    pub fn new(model: Arc<dyn GenerativeModel>, temperature: f32) -> Self {
        Self {
            model,
            policy: RetryPolicy::generation(),
            temperature,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build the full request: image parts first, then the prompt text
    pub fn build_request(&self, task: &Task, image_parts: Vec<Part>) -> GenerateContentRequest {
        let prompt = build_prompt(&task.brief, task.round, &task.attachment_names());

        let mut parts = image_parts;
        parts.push(Part::Text { text: prompt });

        GenerateContentRequest {
            contents: vec![Content::user(parts)],
            system_instruction: Content::text(SYSTEM_PROMPT),
            generation_config: GenerationConfig {
                response_mime_type: RESPONSE_MIME_TYPE.to_string(),
                response_schema: response_schema(),
                temperature: self.temperature,
            },
        }
    }

    /// Generate the files for a task
    ///
    /// Transport errors, non-2xx responses and unparseable output are retried
    /// under the generation policy. A parsed result that lacks a required file
    /// is a content error and is not retried.
    #[instrument(skip(self, task, image_parts), fields(task = %task.id, round = task.round))]
    pub async fn generate(&self, task: &Task, image_parts: Vec<Part>) -> Result<Vec<GeneratedFile>> {
        let request = self.build_request(task, image_parts);
        let model = &self.model;
        let request = &request;

        let site = retry("generation", &self.policy, transient_network, |_attempt| async move {
            let response = model.generate_content(request).await?;
            parse_site(&response)
        })
        .await
        .map_err(|e| match e {
            PagesmithError::RetriesExhausted { attempts, last, .. } => {
                PagesmithError::GenerationFailed { attempts, last }
            }
            other => other,
        })?;

        let missing = missing_required_files(&site.files);
        if !missing.is_empty() {
            return Err(PagesmithError::ContentContract(format!(
                "generated output is missing {}",
                missing.join(", ")
            )));
        }

        info!("Generated {} files", site.files.len());
        Ok(site.files)
    }
}

/// Parse the model's text as the declared `{files: [...]}` schema
pub fn parse_site(response: &GenerateContentResponse) -> Result<GeneratedSite> {
    let text = response.first_text().ok_or_else(|| {
        PagesmithError::MalformedResponse("response has no candidate text".to_string())
    })?;

    serde_json::from_str(strip_code_fence(text)).map_err(|e| {
        PagesmithError::MalformedResponse(format!("model output is not a file list: {}", e))
    })
}

/// Tolerate a ```json fence around otherwise valid output
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}
