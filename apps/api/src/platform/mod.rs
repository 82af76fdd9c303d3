//! External collaborators consumed by the analysis pipeline.
//!
//! The pipeline only ever sees the traits in this module. Production adapters
//! live in the submodules and are wired together in `main.rs`:
//! `S3Storage`, `PdftoppmConverter`, `LlmScorer`, `RedisStore`, `StaticTokenAuth`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod ai;
pub mod auth;
pub mod convert;
pub mod kv;
pub mod storage;

pub use ai::{AiResponse, AiScorer};
pub use auth::{Authenticator, User};
pub use convert::{ConvertedImage, Converter};
pub use kv::KeyValueStore;
pub use storage::Storage;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("AI error: {0}")]
    Ai(String),

    #[error("Key-value store error: {0}")]
    Kv(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redis::RedisError> for PlatformError {
    fn from(e: redis::RedisError) -> Self {
        PlatformError::Kv(e.to_string())
    }
}

/// A blob handed to or produced by the pipeline: the uploaded CV or its preview.
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl Document {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn is_pdf(&self) -> bool {
        self.content_type == "application/pdf"
            || self.name.to_ascii_lowercase().ends_with(".pdf")
    }

    /// File name without its extension, used to name derived artifacts.
    pub fn stem(&self) -> &str {
        self.name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .filter(|stem| !stem.is_empty())
            .unwrap_or(&self.name)
    }
}

/// Reference returned by `Storage` for an uploaded blob. `path` is opaque to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: String,
    pub name: String,
    pub path: String,
}
