use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Substrings the AI collaborator puts in quota / permission failures.
/// There is no structured error code to match on; swap this for one if the
/// collaborator ever exposes it.
const QUOTA_MARKERS: &[&str] = &["usage-limited", "Permission denied", "rate_limit_error", "quota"];

/// Classification carried by a failed run's terminal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "UploadError")]
    Upload,
    #[serde(rename = "ConversionError")]
    Conversion,
    #[serde(rename = "AIRequestError")]
    AiRequest,
    #[serde(rename = "AIQuotaExceededError")]
    AiQuotaExceeded,
    #[serde(rename = "ResponseParseError")]
    ResponseParse,
    #[serde(rename = "PersistenceError")]
    Persistence,
}

/// The AI text could not be turned into JSON.
#[derive(Debug, Clone, Error)]
#[error("Could not parse AI response as JSON: {reason}")]
pub struct ResponseParseError {
    /// Text exactly as the AI returned it.
    pub raw: String,
    /// Last string a parse was attempted on.
    pub candidate: String,
    pub reason: String,
}

/// Which of the two uploads a run makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadTarget {
    Document,
    Preview,
}

impl std::fmt::Display for UploadTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadTarget::Document => f.write_str("CV"),
            UploadTarget::Preview => f.write_str("preview image"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Upload of {0} failed: {1}")]
    Upload(UploadTarget, String),

    #[error("Conversion failed: {0}")]
    Conversion(String),

    #[error("AI request failed: {0}")]
    AiRequest(String),

    #[error("AI usage limit reached: {0}")]
    AiQuotaExceeded(String),

    #[error(transparent)]
    ResponseParse(#[from] ResponseParseError),

    #[error("Persisting record failed: {0}")]
    Persistence(String),
}

impl PipelineError {
    /// Builds an AI failure from the collaborator's message, reclassifying
    /// quota and permission denials.
    pub fn from_ai_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_quota_message(&message) {
            PipelineError::AiQuotaExceeded(message)
        } else {
            PipelineError::AiRequest(message)
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Upload(..) => ErrorKind::Upload,
            PipelineError::Conversion(_) => ErrorKind::Conversion,
            PipelineError::AiRequest(_) => ErrorKind::AiRequest,
            PipelineError::AiQuotaExceeded(_) => ErrorKind::AiQuotaExceeded,
            PipelineError::ResponseParse(_) => ErrorKind::ResponseParse,
            PipelineError::Persistence(_) => ErrorKind::Persistence,
        }
    }

    /// Text shown to the person who submitted the CV.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Upload(UploadTarget::Document, _) => {
                "Failed to upload your CV. Please try again.".to_string()
            }
            PipelineError::Upload(UploadTarget::Preview, _) => "Failed to upload image".to_string(),
            PipelineError::Conversion(_) => "Failed to convert PDF to image".to_string(),
            PipelineError::AiRequest(msg) => msg.clone(),
            PipelineError::AiQuotaExceeded(_) => {
                "AI usage limit reached. Please try again later or upgrade your account."
                    .to_string()
            }
            PipelineError::ResponseParse(_) => {
                "AI returned invalid JSON. Please try again.".to_string()
            }
            PipelineError::Persistence(_) => {
                "Failed to save your analysis. Please try again.".to_string()
            }
        }
    }

    /// Whether restarting the run later may succeed without changing the input.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, PipelineError::Conversion(_))
    }
}

fn is_quota_message(message: &str) -> bool {
    QUOTA_MARKERS.iter().any(|marker| message.contains(marker))
}
