//! Axum route handlers for the Analysis API.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::analysis::library::{get_record, list_records, wipe_all, RecordSummary, WipeReport};
use crate::analysis::record::{JobContext, ResumeRecord};
use crate::analysis::scoring::{FeedbackScoreSet, ScoreTier};
use crate::analysis::status::PipelineStatus;
use crate::errors::AppError;
use crate::platform::{Document, StoredFile};
use crate::state::AppState;

/// Uploads above this are rejected before any collaborator is called.
pub const MAX_DOCUMENT_BYTES: usize = 20 * 1024 * 1024;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAnalysisResponse {
    pub run_id: Uuid,
    pub status: PipelineStatus,
}

#[derive(Debug, Serialize)]
pub struct ResumeListResponse {
    pub resumes: Vec<RecordSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeDetailResponse {
    pub resume: ResumeRecord,
    /// Absent while the analysis is still pending.
    pub scores: Option<FeedbackScoreSet>,
    pub tier: Option<ScoreTier>,
}

#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub files: Vec<StoredFile>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/analyses
///
/// Multipart fields: `file` (PDF), `company_name`, `job_title`, `job_description`.
/// Starts a run in the background and returns its id; poll
/// `GET /api/v1/analyses/:run_id` for progress.
pub async fn handle_start_analysis(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<StartAnalysisResponse>), AppError> {
    let (document, job) = read_submission(multipart).await?;

    let (run_id, reporter) = state.runs.register().await;
    let status = state
        .runs
        .status(run_id)
        .await
        .ok_or_else(|| anyhow::anyhow!("run {run_id} vanished from the registry"))?;

    info!(
        "Accepted '{}' ({} bytes) as run {}",
        document.name,
        document.bytes.len(),
        run_id
    );

    let analyzer = state.analyzer.clone();
    tokio::spawn(async move {
        // The outcome reaches callers through the reporter; the record through the KV store.
        let _ = analyzer.run(run_id, document, job, &reporter).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(StartAnalysisResponse { run_id, status }),
    ))
}

/// GET /api/v1/analyses/:run_id
pub async fn handle_get_status(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<PipelineStatus>, AppError> {
    state
        .runs
        .status(run_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Run {run_id} not found")))
}

/// GET /api/v1/resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
) -> Result<Json<ResumeListResponse>, AppError> {
    let records = list_records(state.kv.as_ref()).await?;
    Ok(Json(ResumeListResponse {
        resumes: records.iter().map(RecordSummary::from).collect(),
    }))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResumeDetailResponse>, AppError> {
    let resume = get_record(state.kv.as_ref(), id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;

    let scores = resume.feedback.as_value().map(FeedbackScoreSet::from_feedback);
    let tier = scores.map(|s| ScoreTier::for_score(s.overall_score));

    Ok(Json(ResumeDetailResponse {
        resume,
        scores,
        tier,
    }))
}

/// GET /api/v1/files
pub async fn handle_list_files(
    State(state): State<AppState>,
) -> Result<Json<FileListResponse>, AppError> {
    let files = state.storage.read_dir("./").await?;
    Ok(Json(FileListResponse { files }))
}

/// DELETE /api/v1/data
///
/// Deletes every stored file and flushes all records.
pub async fn handle_wipe(State(state): State<AppState>) -> Result<Json<WipeReport>, AppError> {
    let report = wipe_all(state.storage.as_ref(), state.kv.as_ref()).await?;
    Ok(Json(report))
}

// ────────────────────────────────────────────────────────────────────────────
// Multipart parsing
// ────────────────────────────────────────────────────────────────────────────

async fn read_submission(mut multipart: Multipart) -> Result<(Document, JobContext), AppError> {
    let mut document: Option<Document> = None;
    let mut job = JobContext::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().replace('-', "_");
        match name.as_str() {
            "file" => {
                let file_name = field
                    .file_name()
                    .filter(|n| !n.is_empty())
                    .unwrap_or("resume.pdf")
                    .to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await?;
                document = Some(Document::new(file_name, content_type, bytes));
            }
            "company_name" => job.company_name = field.text().await?,
            "job_title" => job.job_title = field.text().await?,
            "job_description" => job.job_description = field.text().await?,
            _ => {}
        }
    }

    let document =
        document.ok_or_else(|| AppError::Validation("A CV file is required".to_string()))?;
    validate_document(&document)?;
    Ok((document, job))
}

fn validate_document(document: &Document) -> Result<(), AppError> {
    if document.bytes.is_empty() {
        return Err(AppError::Validation("The uploaded file is empty".to_string()));
    }
    if document.bytes.len() > MAX_DOCUMENT_BYTES {
        return Err(AppError::Validation(format!(
            "The uploaded file exceeds {} MB",
            MAX_DOCUMENT_BYTES / (1024 * 1024)
        )));
    }
    if !document.is_pdf() {
        return Err(AppError::Validation(format!(
            "Only PDF files are supported, got '{}'",
            document.name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_validate_document() {
        let ok = Document::new("cv.pdf", "application/pdf", Bytes::from_static(b"%PDF"));
        assert!(validate_document(&ok).is_ok());

        let empty = Document::new("cv.pdf", "application/pdf", Bytes::new());
        assert!(matches!(
            validate_document(&empty),
            Err(AppError::Validation(_))
        ));

        let docx = Document::new("cv.docx", "application/msword", Bytes::from_static(b"x"));
        assert!(matches!(
            validate_document(&docx),
            Err(AppError::Validation(_))
        ));
    }
}
