//! # pagesmith-agent
//!
//! Generative side of Pagesmith: builds the prompt for a task, calls Gemini,
//! validates the structured reply and writes the resulting files (and any
//! task attachments) into the working directory.

mod attachments;
mod client;
mod files;
mod generation;
mod prompt;
mod types;

pub use attachments::{decode_all, image_parts, DecodedAttachment};
pub use client::{GeminiClient, GenerativeModel, MockModel, ModelReply};
pub use files::{materialize, validate_path, write_attachments, MaterializeReport};
pub use generation::{parse_site, GenerationClient};
pub use prompt::{build_prompt, response_schema, SYSTEM_PROMPT};
pub use types::{
    Content, GenerateContentRequest, GenerateContentResponse, GeneratedSite, GenerationConfig,
    InlineData, Part,
};
