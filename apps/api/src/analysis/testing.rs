//! In-memory collaborators for pipeline tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::analysis::record::JobContext;
use crate::analysis::status::{PipelineStatus, Stage, StatusReporter};
use crate::platform::{
    AiResponse, AiScorer, ConvertedImage, Converter, Document, KeyValueStore, PlatformError,
    Storage, StoredFile,
};

pub fn pdf_document() -> Document {
    Document::new(
        "cv.pdf",
        "application/pdf",
        Bytes::from_static(b"%PDF-1.4 fake"),
    )
}

pub fn sample_job() -> JobContext {
    JobContext {
        company_name: "Acme".to_string(),
        job_title: "Engineer".to_string(),
        job_description: "Build reliable services in Rust".to_string(),
    }
}

/// Storage that keeps blobs in a map. Uploads are numbered from 1.
#[derive(Default)]
pub struct FakeStorage {
    files: Mutex<BTreeMap<String, (String, Bytes)>>,
    uploads: AtomicUsize,
    fail_on: Mutex<Option<usize>>,
    uploaded: Mutex<Vec<String>>,
}

impl FakeStorage {
    /// Makes the n-th upload (1-based) fail.
    pub fn fail_upload_number(&self, n: usize) {
        *self.fail_on.lock().unwrap() = Some(n);
    }

    pub fn uploaded_names(&self) -> Vec<String> {
        self.uploaded.lock().unwrap().clone()
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }
}

#[async_trait]
impl Storage for FakeStorage {
    async fn upload(&self, document: &Document) -> Result<StoredFile, PlatformError> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_on.lock().unwrap() == Some(n) {
            return Err(PlatformError::Storage("upload did not complete".to_string()));
        }
        let id = format!("file-{n}");
        let path = format!("uploads/{id}/{}", document.name);
        self.files.lock().unwrap().insert(
            path.clone(),
            (document.name.clone(), document.bytes.clone()),
        );
        self.uploaded.lock().unwrap().push(document.name.clone());
        Ok(StoredFile {
            id,
            name: document.name.clone(),
            path,
        })
    }

    async fn read(&self, path: &str) -> Result<Bytes, PlatformError> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| PlatformError::NotFound(path.to_string()))
    }

    async fn read_dir(&self, _path: &str) -> Result<Vec<StoredFile>, PlatformError> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .iter()
            .map(|(path, (name, _))| StoredFile {
                id: path.clone(),
                name: name.clone(),
                path: path.clone(),
            })
            .collect())
    }

    async fn delete(&self, path: &str) -> Result<(), PlatformError> {
        self.files
            .lock()
            .unwrap()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| PlatformError::NotFound(path.to_string()))
    }
}

pub struct FakeConverter {
    error: Option<String>,
    calls: AtomicUsize,
}

impl FakeConverter {
    pub fn rendering() -> Self {
        Self {
            error: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Converter for FakeConverter {
    async fn to_image(&self, document: &Document) -> Result<ConvertedImage, PlatformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(match &self.error {
            Some(error) => ConvertedImage::failed(error.clone()),
            None => ConvertedImage::rendered(Document::new(
                format!("{}.png", document.stem()),
                "image/png",
                Bytes::from_static(b"\x89PNG fake"),
            )),
        })
    }
}

enum AiOutcome {
    Respond(AiResponse),
    Error(String),
}

pub struct FakeAi {
    outcome: AiOutcome,
    delay: Option<Duration>,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeAi {
    pub fn responding(response: AiResponse) -> Self {
        Self {
            outcome: AiOutcome::Respond(response),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn erroring(message: &str) -> Self {
        Self {
            outcome: AiOutcome::Error(message.to_string()),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `(image_path, instructions)` for every call, in order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiScorer for FakeAi {
    async fn score_resume(
        &self,
        image_path: &str,
        instructions: &str,
    ) -> Result<AiResponse, PlatformError> {
        self.calls
            .lock()
            .unwrap()
            .push((image_path.to_string(), instructions.to_string()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.outcome {
            AiOutcome::Respond(response) => Ok(response.clone()),
            AiOutcome::Error(message) => Err(PlatformError::Ai(message.clone())),
        }
    }
}

/// Key-value store that keeps a log of every `set`.
#[derive(Default)]
pub struct RecordingKv {
    entries: Mutex<BTreeMap<String, String>>,
    writes: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
}

impl RecordingKv {
    pub fn fail_writes(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<(String, String)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn writes_for(&self, key: &str) -> Vec<String> {
        self.writes()
            .into_iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v)
            .collect()
    }

    pub fn total_writes(&self) -> usize {
        self.writes.lock().unwrap().len()
    }
}

#[async_trait]
impl KeyValueStore for RecordingKv {
    async fn set(&self, key: &str, value: &str) -> Result<(), PlatformError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PlatformError::Kv("connection refused".to_string()));
        }
        self.writes
            .lock()
            .unwrap()
            .push((key.to_string(), value.to_string()));
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, PlatformError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn list(&self, pattern: &str) -> Result<Vec<(String, String)>, PlatformError> {
        let prefix = pattern.trim_end_matches('*');
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn flush(&self) -> Result<(), PlatformError> {
        self.entries.lock().unwrap().clear();
        Ok(())
    }
}

/// Keeps every reported status.
#[derive(Default)]
pub struct RecordingReporter {
    statuses: Mutex<Vec<PipelineStatus>>,
}

impl RecordingReporter {
    pub fn stages(&self) -> Vec<Stage> {
        self.statuses.lock().unwrap().iter().map(|s| s.stage).collect()
    }

    pub fn last(&self) -> Option<PipelineStatus> {
        self.statuses.lock().unwrap().last().cloned()
    }
}

impl StatusReporter for RecordingReporter {
    fn report(&self, status: &PipelineStatus) {
        self.statuses.lock().unwrap().push(status.clone());
    }
}
