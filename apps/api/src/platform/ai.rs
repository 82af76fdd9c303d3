use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{PlatformError, Storage};
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{LlmClient, LlmError};

/// Result envelope of an AI scoring call.
///
/// `success == Some(false)` marks an explicit failure, with the reason in
/// `error.message`. A missing `success` flag is treated as success.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<AiError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<AiMessage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiError {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiMessage {
    pub content: MessageContent,
}

/// The two shapes the collaborator uses for message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(default)]
    pub text: Option<String>,
}

impl AiResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            success: Some(true),
            error: None,
            message: Some(AiMessage {
                content: MessageContent::Text(text.into()),
            }),
        }
    }

    pub fn parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            success: Some(true),
            error: None,
            message: Some(AiMessage {
                content: MessageContent::Parts(
                    parts
                        .into_iter()
                        .map(|t| ContentPart {
                            text: Some(t.into()),
                        })
                        .collect(),
                ),
            }),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: Some(false),
            error: Some(AiError {
                message: Some(message.into()),
            }),
            message: None,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.success == Some(false)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().and_then(|e| e.message.as_deref())
    }

    /// Raw payload text: the string itself, or the first part's text.
    pub fn payload_text(&self) -> Option<&str> {
        match &self.message.as_ref()?.content {
            MessageContent::Text(text) => Some(text.as_str()),
            MessageContent::Parts(parts) => parts.first()?.text.as_deref(),
        }
    }
}

/// AI inference: scores the resume preview at `image_path` against `instructions`.
#[async_trait]
pub trait AiScorer: Send + Sync {
    async fn score_resume(
        &self,
        image_path: &str,
        instructions: &str,
    ) -> Result<AiResponse, PlatformError>;
}

/// Claude-backed scorer. Reads the preview back from storage and sends it inline.
pub struct LlmScorer {
    llm: LlmClient,
    storage: Arc<dyn Storage>,
}

impl LlmScorer {
    pub fn new(llm: LlmClient, storage: Arc<dyn Storage>) -> Self {
        Self { llm, storage }
    }
}

#[async_trait]
impl AiScorer for LlmScorer {
    async fn score_resume(
        &self,
        image_path: &str,
        instructions: &str,
    ) -> Result<AiResponse, PlatformError> {
        let image = self.storage.read(image_path).await?;
        debug!("Sending {} byte preview '{}' to the LLM", image.len(), image_path);

        match self
            .llm
            .call_with_image(&image, media_type_for(image_path), instructions, JSON_ONLY_SYSTEM)
            .await
        {
            Ok(response) => Ok(AiResponse::parts(
                response.text_blocks().into_iter().map(str::to_string),
            )),
            Err(LlmError::Api {
                status,
                error_type,
                message,
            }) => {
                warn!("LLM API returned {status} ({error_type}): {message}");
                Ok(AiResponse::failure(format!("{error_type}: {message}")))
            }
            Err(LlmError::EmptyContent) => Ok(AiResponse {
                success: Some(true),
                ..AiResponse::default()
            }),
            Err(e @ LlmError::Http(_)) => Err(PlatformError::Ai(e.to_string())),
        }
    }
}

fn media_type_for(path: &str) -> &'static str {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else {
        "image/png"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_text_from_plain_string() {
        let response: AiResponse =
            serde_json::from_str(r#"{"message":{"content":"{\"a\":1}"}}"#).unwrap();
        assert_eq!(response.payload_text(), Some("{\"a\":1}"));
        assert!(!response.is_failure());
    }

    #[test]
    fn test_payload_text_from_content_list_takes_first() {
        let response: AiResponse = serde_json::from_str(
            r#"{"success":true,"message":{"content":[{"text":"first"},{"text":"second"}]}}"#,
        )
        .unwrap();
        assert_eq!(response.payload_text(), Some("first"));
    }

    #[test]
    fn test_payload_text_missing() {
        let empty_list: AiResponse =
            serde_json::from_str(r#"{"message":{"content":[]}}"#).unwrap();
        assert_eq!(empty_list.payload_text(), None);
        assert_eq!(AiResponse::default().payload_text(), None);
    }

    #[test]
    fn test_failure_envelope() {
        let response: AiResponse = serde_json::from_str(
            r#"{"success":false,"error":{"message":"Permission denied: usage-limited"}}"#,
        )
        .unwrap();
        assert!(response.is_failure());
        assert_eq!(
            response.error_message(),
            Some("Permission denied: usage-limited")
        );
    }

    #[test]
    fn test_media_type_for() {
        assert_eq!(media_type_for("uploads/a/cv.PNG"), "image/png");
        assert_eq!(media_type_for("uploads/a/cv.jpeg"), "image/jpeg");
        assert_eq!(media_type_for("uploads/a/cv"), "image/png");
    }
}
