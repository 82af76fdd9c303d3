use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::{debug, info};
use uuid::Uuid;

use super::{Document, PlatformError, StoredFile};

const UPLOAD_PREFIX: &str = "uploads";

/// Raw byte storage. `upload` either returns a reference or fails.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn upload(&self, document: &Document) -> Result<StoredFile, PlatformError>;

    async fn read(&self, path: &str) -> Result<Bytes, PlatformError>;

    /// Lists files under `path`. Only the bulk wipe uses this.
    async fn read_dir(&self, path: &str) -> Result<Vec<StoredFile>, PlatformError>;

    async fn delete(&self, path: &str) -> Result<(), PlatformError>;
}

/// S3 / MinIO backed storage. Every upload gets its own key prefix so
/// identical file names never overwrite each other.
#[derive(Clone)]
pub struct S3Storage {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn upload(&self, document: &Document) -> Result<StoredFile, PlatformError> {
        let id = Uuid::new_v4().to_string();
        let key = object_key(&id, &document.name);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(document.bytes.clone()))
            .content_type(&document.content_type)
            .send()
            .await
            .map_err(|e| PlatformError::Storage(format!("S3 upload failed: {e}")))?;

        info!("Uploaded {} bytes to s3://{}/{}", document.bytes.len(), self.bucket, key);

        Ok(StoredFile {
            id,
            name: document.name.clone(),
            path: key,
        })
    }

    async fn read(&self, path: &str) -> Result<Bytes, PlatformError> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| PlatformError::Storage(format!("S3 read of '{path}' failed: {e}")))?;

        let data = object
            .body
            .collect()
            .await
            .map_err(|e| PlatformError::Storage(format!("S3 body read failed: {e}")))?;
        Ok(data.into_bytes())
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<StoredFile>, PlatformError> {
        let prefix = path.trim_start_matches("./").trim_start_matches('/');
        let mut files = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket);
            if !prefix.is_empty() {
                request = request.prefix(prefix);
            }
            if let Some(token) = continuation.take() {
                request = request.continuation_token(token);
            }
            let page = request
                .send()
                .await
                .map_err(|e| PlatformError::Storage(format!("S3 list failed: {e}")))?;

            for object in page.contents() {
                if let Some(key) = object.key() {
                    files.push(stored_file_from_key(key));
                }
            }

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        debug!("Listed {} objects under '{}'", files.len(), prefix);
        Ok(files)
    }

    async fn delete(&self, path: &str) -> Result<(), PlatformError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| PlatformError::Storage(format!("S3 delete of '{path}' failed: {e}")))?;
        Ok(())
    }
}

fn object_key(id: &str, name: &str) -> String {
    let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    format!("{UPLOAD_PREFIX}/{id}/{name}")
}

/// Rebuilds a `StoredFile` from an `uploads/{id}/{name}` key. Keys written by
/// something else keep the whole key as id.
fn stored_file_from_key(key: &str) -> StoredFile {
    let mut parts = key.splitn(3, '/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(UPLOAD_PREFIX), Some(id), Some(name)) => StoredFile {
            id: id.to_string(),
            name: name.to_string(),
            path: key.to_string(),
        },
        _ => StoredFile {
            id: key.to_string(),
            name: key.rsplit('/').next().unwrap_or(key).to_string(),
            path: key.to_string(),
        },
    }
}
