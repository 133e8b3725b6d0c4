//! Prompt text, system instruction and output schema

/// Fixed system instruction describing the required output
pub const SYSTEM_PROMPT: &str = r#"You are an expert full-stack engineer. Your task is to generate a
complete web application in a structured JSON response.

You must return a JSON object with a 'files' array.
Each object in the array must have 'path' (e.g., 'index.html', 'README.md', 'LICENSE')
and 'content' (the full string content of the file).

The response MUST include:
1.  index.html: A single, complete, responsive HTML file. Use Tailwind CSS via CDN.
    All JavaScript MUST be inline inside <script> tags.
2.  README.md: Professional documentation (Title, Description, Usage).
3.  LICENSE: The full text of the MIT License.

Follow the user's brief exactly.
"#;

/// MIME type requested for the structured response
pub const RESPONSE_MIME_TYPE: &str = "application/json";

/// Schema declaration for `{ files: [{ path, content }] }`
pub fn response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "files": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "path": { "type": "STRING" },
                        "content": { "type": "STRING" }
                    },
                    "required": ["path", "content"]
                }
            }
        },
        "required": ["files"]
    })
}

/// Build the prompt for one round of a task
///
/// Round 1 asks for a new project; later rounds ask for complete replacement
/// files. Attachment names are listed only when there are any.
pub fn build_prompt(brief: &str, round: u32, attachment_names: &[String]) -> String {
    let mut prompt = if round > 1 {
        format!(
            "REVISION (ROUND {round}): Update the project based on this new brief: '{brief}'. \
             You MUST provide the complete, new versions of all files (index.html, README.md, LICENSE)."
        )
    } else {
        format!("NEW PROJECT (ROUND 1): Create a new project based on this brief: '{brief}'.")
    };

    if !attachment_names.is_empty() {
        prompt.push_str(&format!(
            "\nThe project directory will include these files: {}. \
             Ensure your code (e.g., in index.html) correctly references them.",
            attachment_names.join(", ")
        ));
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_round_prompt() {
        let prompt = build_prompt("a hello-world page", 1, &[]);
        assert!(prompt.starts_with("NEW PROJECT (ROUND 1)"));
        assert!(prompt.contains("'a hello-world page'"));
        assert!(!prompt.contains("project directory will include"));
    }

    #[test]
    fn test_revision_prompt_demands_all_files() {
        let prompt = build_prompt("add a contact form", 2, &[]);
        assert!(prompt.starts_with("REVISION (ROUND 2)"));
        assert!(prompt.contains("complete, new versions of all files"));
    }

    #[test]
    fn test_attachment_names_appended() {
        let names = vec!["data.csv".to_string(), "logo.png".to_string()];
        let prompt = build_prompt("chart the data", 1, &names);
        assert!(prompt.contains("\nThe project directory will include these files: data.csv, logo.png."));
    }

    #[test]
    fn test_schema_requires_files() {
        let schema = response_schema();
        assert_eq!(schema["required"][0], "files");
        assert_eq!(schema["properties"]["files"]["type"], "ARRAY");
    }
}
