use async_trait::async_trait;
use bytes::Bytes;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{Document, PlatformError};

/// Output of a conversion. `image` is absent when rendering failed; `error`
/// then says why. There is no partial result.
#[derive(Debug, Clone, Default)]
pub struct ConvertedImage {
    pub image: Option<Document>,
    pub error: Option<String>,
}

impl ConvertedImage {
    pub fn rendered(image: Document) -> Self {
        Self {
            image: Some(image),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            image: None,
            error: Some(error.into()),
        }
    }
}

/// Renders the first page of a document into a preview image.
#[async_trait]
pub trait Converter: Send + Sync {
    async fn to_image(&self, document: &Document) -> Result<ConvertedImage, PlatformError>;
}

/// Rasterizes page 1 of a PDF with poppler's `pdftoppm`.
pub struct PdftoppmConverter {
    dpi: u32,
}

impl PdftoppmConverter {
    pub fn new(dpi: u32) -> Self {
        Self { dpi }
    }
}

#[async_trait]
impl Converter for PdftoppmConverter {
    async fn to_image(&self, document: &Document) -> Result<ConvertedImage, PlatformError> {
        if !document.is_pdf() {
            return Ok(ConvertedImage::failed(format!(
                "'{}' is not a PDF ({})",
                document.name, document.content_type
            )));
        }

        // Removed on drop, together with whatever pdftoppm wrote into it.
        let workdir = tempfile::tempdir()?;
        let pdf_path = workdir.path().join("source.pdf");
        let output_prefix = workdir.path().join("page");
        tokio::fs::write(&pdf_path, &document.bytes).await?;

        let output = Command::new("pdftoppm")
            .arg("-png")
            .arg("-singlefile")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-f")
            .arg("1")
            .arg("-l")
            .arg("1")
            .arg(&pdf_path)
            .arg(&output_prefix)
            .output()
            .await
            .map_err(|e| {
                PlatformError::Conversion(format!(
                    "Failed to run pdftoppm: {e}. Make sure poppler-utils is installed."
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("pdftoppm failed for '{}': {}", document.name, stderr.trim());
            return Ok(ConvertedImage::failed(format!(
                "pdftoppm failed: {}",
                stderr.trim()
            )));
        }

        // -singlefile writes exactly `<prefix>.png`
        let image_path = output_prefix.with_extension("png");
        let image_bytes = match tokio::fs::read(&image_path).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => return Ok(ConvertedImage::failed("pdftoppm produced an empty image")),
            Err(e) => {
                return Ok(ConvertedImage::failed(format!(
                    "Failed to read rendered image: {e}"
                )))
            }
        };

        debug!(
            "Rendered '{}' page 1 at {} dpi ({} bytes)",
            document.name,
            self.dpi,
            image_bytes.len()
        );

        Ok(ConvertedImage::rendered(Document::new(
            format!("{}.png", document.stem()),
            "image/png",
            Bytes::from(image_bytes),
        )))
    }
}
