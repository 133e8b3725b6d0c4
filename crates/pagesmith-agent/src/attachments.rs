//! Attachment decoding
//!
//! Attachments arrive as `data:<mime>;base64,<payload>` URIs. Every
//! attachment is written into the working directory; images are also sent to
//! the model as inline parts.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use pagesmith_core::{Attachment, PagesmithError, Result};

use crate::types::{InlineData, Part};

/// An attachment with its payload decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAttachment {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl DecodedAttachment {
    pub fn decode(attachment: &Attachment) -> Result<Self> {
        let (mime_type, bytes) = decode_data_uri(&attachment.url)
            .map_err(|reason| PagesmithError::Attachment(format!("{}: {}", attachment.name, reason)))?;
        Ok(Self {
            name: attachment.name.clone(),
            mime_type,
            bytes,
        })
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Inline model part carrying this attachment
    pub fn to_part(&self) -> Part {
        Part::InlineData {
            inline_data: InlineData {
                mime_type: self.mime_type.clone(),
                data: BASE64_STANDARD.encode(&self.bytes),
            },
        }
    }
}

/// Decode every attachment of a task, failing on the first bad one
pub fn decode_all(attachments: &[Attachment]) -> Result<Vec<DecodedAttachment>> {
    attachments.iter().map(DecodedAttachment::decode).collect()
}

/// Inline parts for the image attachments, in submission order
pub fn image_parts(attachments: &[DecodedAttachment]) -> Vec<Part> {
    attachments
        .iter()
        .filter(|a| a.is_image())
        .map(DecodedAttachment::to_part)
        .collect()
}

fn decode_data_uri(uri: &str) -> std::result::Result<(String, Vec<u8>), String> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| "not a data URI".to_string())?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| "data URI has no payload".to_string())?;

    let mut params = header.split(';');
    let mime_type = match params.next() {
        Some(m) if !m.is_empty() => m.to_string(),
        _ => "text/plain".to_string(),
    };
    let base64 = params.any(|p| p.eq_ignore_ascii_case("base64"));

    let bytes = if base64 {
        BASE64_STANDARD
            .decode(payload.trim())
            .map_err(|e| format!("invalid base64 payload: {}", e))?
    } else {
        payload.as_bytes().to_vec()
    };

    Ok((mime_type, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(name: &str, url: &str) -> Attachment {
        Attachment {
            name: name.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_decode_base64_image() {
        let decoded =
            DecodedAttachment::decode(&attachment("dot.png", "data:image/png;base64,aGVsbG8=")).unwrap();
        assert_eq!(decoded.mime_type, "image/png");
        assert_eq!(decoded.bytes, b"hello");
        assert!(decoded.is_image());
    }

    #[test]
    fn test_decode_plain_data_uri() {
        let decoded = DecodedAttachment::decode(&attachment("data.csv", "data:text/csv,a,b\n1,2")).unwrap();
        assert_eq!(decoded.mime_type, "text/csv");
        assert_eq!(decoded.bytes, b"a,b\n1,2");
        assert!(!decoded.is_image());
    }

    #[test]
    fn test_rejects_non_data_uri() {
        let err = DecodedAttachment::decode(&attachment("x.png", "https://example.com/x.png")).unwrap_err();
        assert!(matches!(err, PagesmithError::Attachment(_)));
        assert!(err.to_string().contains("x.png"));
    }

    #[test]
    fn test_rejects_bad_base64() {
        assert!(DecodedAttachment::decode(&attachment("x.png", "data:image/png;base64,!!!")).is_err());
    }

    #[test]
    fn test_only_images_become_parts() {
        let decoded = decode_all(&[
            attachment("data.csv", "data:text/csv;base64,YSxi"),
            attachment("logo.png", "data:image/png;base64,aGVsbG8="),
        ])
        .unwrap();

        let parts = image_parts(&decoded);
        assert_eq!(parts.len(), 1);
        match &parts[0] {
            Part::InlineData { inline_data } => {
                assert_eq!(inline_data.mime_type, "image/png");
                assert_eq!(inline_data.data, "aGVsbG8=");
            }
            other => panic!("unexpected part: {:?}", other),
        }
    }
}
