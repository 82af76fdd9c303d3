//! Pipeline state machine.
//!
//! `Idle → UploadingDocument → ConvertingToImage → UploadingPreview →
//! AwaitingAiAnalysis → Succeeded`, or `Failed` from any non-terminal stage.
//! Both terminal stages are final: a run cannot be resumed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

use crate::analysis::error::{ErrorKind, PipelineError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Idle,
    UploadingDocument,
    ConvertingToImage,
    UploadingPreview,
    #[serde(rename = "AwaitingAIAnalysis")]
    AwaitingAiAnalysis,
    Succeeded,
    Failed,
}

impl Stage {
    /// The only stage reachable from `self` on the success path.
    pub fn successor(self) -> Option<Stage> {
        match self {
            Stage::Idle => Some(Stage::UploadingDocument),
            Stage::UploadingDocument => Some(Stage::ConvertingToImage),
            Stage::ConvertingToImage => Some(Stage::UploadingPreview),
            Stage::UploadingPreview => Some(Stage::AwaitingAiAnalysis),
            Stage::AwaitingAiAnalysis => Some(Stage::Succeeded),
            Stage::Succeeded | Stage::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Succeeded | Stage::Failed)
    }

    fn message(self) -> &'static str {
        match self {
            Stage::Idle => "Waiting for a CV",
            Stage::UploadingDocument => "Uploading your CV...",
            Stage::ConvertingToImage => "Converting to image...",
            Stage::UploadingPreview => "Uploading image...",
            Stage::AwaitingAiAnalysis => "Analyzing your CV with AI...",
            Stage::Succeeded => "CV analyzed successfully",
            Stage::Failed => "Error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalError {
    pub kind: ErrorKind,
    /// User-facing text.
    pub message: String,
    /// Full error chain, for logs and support.
    pub detail: String,
    pub retryable: bool,
}

impl From<&PipelineError> for TerminalError {
    fn from(err: &PipelineError) -> Self {
        Self {
            kind: err.kind(),
            message: err.user_message(),
            detail: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

/// Latest observable state of one run. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatus {
    pub run_id: Uuid,
    pub stage: Stage,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_error: Option<TerminalError>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineStatus {
    pub fn idle(run_id: Uuid) -> Self {
        Self {
            run_id,
            stage: Stage::Idle,
            message: Stage::Idle.message().to_string(),
            terminal_error: None,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid pipeline transition {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: Stage,
    pub to: Stage,
}

/// Receives every status the tracker enters.
pub trait StatusReporter: Send + Sync {
    fn report(&self, status: &PipelineStatus);
}

/// Publishes each status on a `watch` channel so pollers see the latest one.
pub struct WatchReporter {
    sender: watch::Sender<PipelineStatus>,
}

impl WatchReporter {
    pub fn new(sender: watch::Sender<PipelineStatus>) -> Self {
        Self { sender }
    }
}

impl StatusReporter for WatchReporter {
    fn report(&self, status: &PipelineStatus) {
        // Keeps the value even if every receiver has gone away.
        self.sender.send_replace(status.clone());
    }
}

/// Owns the status of one run and enforces forward-only transitions.
pub struct PipelineTracker<'a> {
    status: PipelineStatus,
    reporter: &'a dyn StatusReporter,
}

impl<'a> PipelineTracker<'a> {
    pub fn new(run_id: Uuid, reporter: &'a dyn StatusReporter) -> Self {
        let status = PipelineStatus::idle(run_id);
        reporter.report(&status);
        Self { status, reporter }
    }

    pub fn status(&self) -> &PipelineStatus {
        &self.status
    }

    /// Moves to the immediate successor of the current stage.
    pub fn advance(&mut self, next: Stage) -> Result<(), TransitionError> {
        let from = self.status.stage;
        if from.successor() != Some(next) {
            return Err(TransitionError { from, to: next });
        }
        self.enter(next, next.message().to_string(), None);
        Ok(())
    }

    /// Records the terminal error. Rejected once the run has already ended.
    pub fn fail(&mut self, error: &PipelineError) -> Result<(), TransitionError> {
        let from = self.status.stage;
        if from.is_terminal() {
            return Err(TransitionError {
                from,
                to: Stage::Failed,
            });
        }
        let terminal = TerminalError::from(error);
        let message = format!("{}: {}", Stage::Failed.message(), terminal.message);
        self.enter(Stage::Failed, message, Some(terminal));
        Ok(())
    }

    fn enter(&mut self, stage: Stage, message: String, terminal_error: Option<TerminalError>) {
        self.status.stage = stage;
        self.status.message = message;
        self.status.terminal_error = terminal_error;
        self.status.updated_at = Utc::now();
        self.reporter.report(&self.status);
    }
}
