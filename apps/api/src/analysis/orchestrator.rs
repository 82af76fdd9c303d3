//! Analysis Orchestrator: runs one CV through the full pipeline.
//!
//! Flow: upload CV → render preview → upload preview → persist pending record →
//!       AI scoring → extract JSON → persist final record.
//!
//! Every step awaits its collaborator before the next starts. Nothing is
//! retried: the first failure ends the run in `Stage::Failed`, and a retry is
//! a new run with a new id.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::analysis::error::{PipelineError, UploadTarget};
use crate::analysis::extract::extract_json;
use crate::analysis::prompts::prepare_instructions;
use crate::analysis::record::{Feedback, JobContext, ResumeRecord};
use crate::analysis::scoring::{compute_overall_score, ScoreTier};
use crate::analysis::status::{PipelineTracker, Stage, StatusReporter};
use crate::platform::{
    AiResponse, AiScorer, ConvertedImage, Converter, Document, KeyValueStore, Storage,
};

/// Fallback when the collaborator flags a failure without saying why.
const UNKNOWN_AI_ERROR: &str = "Unknown error occurred";

/// Holds the four collaborators. Keeps no per-run state, so one instance
/// serves any number of concurrent runs.
pub struct Analyzer {
    storage: Arc<dyn Storage>,
    converter: Arc<dyn Converter>,
    ai: Arc<dyn AiScorer>,
    kv: Arc<dyn KeyValueStore>,
    ai_timeout: Option<Duration>,
}

impl Analyzer {
    pub fn new(
        storage: Arc<dyn Storage>,
        converter: Arc<dyn Converter>,
        ai: Arc<dyn AiScorer>,
        kv: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            storage,
            converter,
            ai,
            kv,
            ai_timeout: None,
        }
    }

    /// Bounds the AI step. `None` waits for as long as the collaborator takes.
    pub fn with_ai_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.ai_timeout = timeout;
        self
    }

    /// Runs the pipeline under a freshly generated run id.
    pub async fn analyze(
        &self,
        document: Document,
        job: JobContext,
        reporter: &dyn StatusReporter,
    ) -> Result<ResumeRecord, PipelineError> {
        self.run(Uuid::new_v4(), document, job, reporter).await
    }

    /// Runs the pipeline under `run_id`, which must not have been used before.
    ///
    /// Every outcome is reported: success ends in `Succeeded`, any error ends
    /// in `Failed` with its classification, and the error is also returned.
    pub async fn run(
        &self,
        run_id: Uuid,
        document: Document,
        job: JobContext,
        reporter: &dyn StatusReporter,
    ) -> Result<ResumeRecord, PipelineError> {
        let mut tracker = PipelineTracker::new(run_id, reporter);
        info!("Starting analysis run {} for '{}'", run_id, document.name);

        match self.execute(run_id, &document, job, &mut tracker).await {
            Ok(record) => {
                enter(&mut tracker, Stage::Succeeded);
                let score = record
                    .feedback
                    .as_value()
                    .map(compute_overall_score)
                    .unwrap_or_default();
                info!(
                    "Analysis run {} succeeded: overall score {}/100 ({})",
                    run_id,
                    score,
                    ScoreTier::for_score(score).label()
                );
                Ok(record)
            }
            Err(err) => {
                warn!("Analysis run {} failed ({:?}): {}", run_id, err.kind(), err);
                if let Err(e) = tracker.fail(&err) {
                    error!("Run {run_id}: {e}");
                }
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        run_id: Uuid,
        document: &Document,
        job: JobContext,
        tracker: &mut PipelineTracker<'_>,
    ) -> Result<ResumeRecord, PipelineError> {
        // Step 1: Upload the source CV
        enter(tracker, Stage::UploadingDocument);
        let resume = self
            .storage
            .upload(document)
            .await
            .map_err(|e| PipelineError::Upload(UploadTarget::Document, e.to_string()))?;
        info!("Run {}: CV stored at {}", run_id, resume.path);

        // Step 2: Render the preview image
        enter(tracker, Stage::ConvertingToImage);
        let ConvertedImage { image, error } = self
            .converter
            .to_image(document)
            .await
            .map_err(|e| PipelineError::Conversion(e.to_string()))?;
        let image = image.ok_or_else(|| {
            PipelineError::Conversion(error.unwrap_or_else(|| "no image was produced".to_string()))
        })?;

        // Step 3: Upload the preview
        enter(tracker, Stage::UploadingPreview);
        let preview = self
            .storage
            .upload(&image)
            .await
            .map_err(|e| PipelineError::Upload(UploadTarget::Preview, e.to_string()))?;
        info!("Run {}: preview stored at {}", run_id, preview.path);

        // Step 4: Persist the pending record so a later failure still leaves a trace
        let instructions = prepare_instructions(&job);
        let mut record = ResumeRecord::new(run_id, resume.path, preview.path, job);
        self.persist(&record).await?;

        // Step 5: AI scoring
        enter(tracker, Stage::AwaitingAiAnalysis);
        let response = self.request_analysis(&record.image_path, &instructions).await?;
        let raw = response.payload_text().ok_or_else(|| {
            PipelineError::AiRequest("AI response contained no content".to_string())
        })?;
        debug!("Run {run_id}: raw AI feedback: {raw}");

        // Step 6: Extract and attach feedback, then overwrite the pending record
        let feedback = extract_json(raw).inspect_err(|e| {
            debug!("Run {run_id}: unparseable candidate: {}", e.candidate);
        })?;
        record.feedback = Feedback::Ready(feedback);
        self.persist(&record).await?;

        Ok(record)
    }

    async fn request_analysis(
        &self,
        image_path: &str,
        instructions: &str,
    ) -> Result<AiResponse, PipelineError> {
        let call = self.ai.score_resume(image_path, instructions);
        let result = match self.ai_timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                PipelineError::AiRequest(format!("AI analysis timed out after {limit:?}"))
            })?,
            None => call.await,
        };

        let response = result.map_err(|e| PipelineError::from_ai_message(e.to_string()))?;
        if response.is_failure() {
            return Err(PipelineError::from_ai_message(
                response.error_message().unwrap_or(UNKNOWN_AI_ERROR),
            ));
        }
        Ok(response)
    }

    /// Writes the whole record under its key, replacing any earlier version.
    async fn persist(&self, record: &ResumeRecord) -> Result<(), PipelineError> {
        let serialized = serde_json::to_string(record)
            .map_err(|e| PipelineError::Persistence(format!("serialize record: {e}")))?;
        self.kv
            .set(&record.kv_key(), &serialized)
            .await
            .map_err(|e| PipelineError::Persistence(e.to_string()))?;
        debug!(
            "Persisted {} (feedback {})",
            record.kv_key(),
            if record.feedback.is_pending() { "pending" } else { "ready" }
        );
        Ok(())
    }
}

/// The orchestrator only ever asks for the next stage on a fresh tracker, so
/// a rejected transition means a bug here, not bad input.
fn enter(tracker: &mut PipelineTracker<'_>, stage: Stage) {
    if let Err(e) = tracker.advance(stage) {
        error!("Run {}: {e}", tracker.status().run_id);
    }
}
