use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::analysis::status::{PipelineStatus, WatchReporter};
use crate::analysis::Analyzer;
use crate::platform::{Authenticator, KeyValueStore, Storage};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
    /// Same store the analyzer writes to; read by the record endpoints.
    pub kv: Arc<dyn KeyValueStore>,
    /// Same storage the analyzer uploads to; used for listing and the wipe.
    pub storage: Arc<dyn Storage>,
    pub auth: Arc<dyn Authenticator>,
    pub runs: RunRegistry,
}

/// How long a finished run stays pollable when no retention is configured.
pub const DEFAULT_RUN_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Latest status of every run started by this process, keyed by run id.
///
/// Holds only `watch` receivers; each run's task owns its sender. Runs that
/// ended (terminal stage, or their task dropped the sender) are pruned on the
/// next `register` once their last update is older than the retention window.
#[derive(Clone)]
pub struct RunRegistry {
    runs: Arc<RwLock<HashMap<Uuid, watch::Receiver<PipelineStatus>>>>,
    retention: Duration,
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RUN_RETENTION)
    }
}

impl RunRegistry {
    pub fn with_retention(retention: Duration) -> Self {
        Self {
            runs: Arc::default(),
            retention,
        }
    }

    /// Allocates a new run id and returns the reporter its pipeline should use.
    pub async fn register(&self) -> (Uuid, WatchReporter) {
        let run_id = Uuid::new_v4();
        let (tx, rx) = watch::channel(PipelineStatus::idle(run_id));

        let mut runs = self.runs.write().await;
        let before = runs.len();
        runs.retain(|_, rx| !self.is_expired(rx));
        let pruned = before - runs.len();
        if pruned > 0 {
            debug!("Pruned {pruned} finished runs from the registry");
        }
        runs.insert(run_id, rx);

        (run_id, WatchReporter::new(tx))
    }

    pub async fn status(&self, run_id: Uuid) -> Option<PipelineStatus> {
        self.runs
            .read()
            .await
            .get(&run_id)
            .map(|rx| rx.borrow().clone())
    }

    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }

    fn is_expired(&self, rx: &watch::Receiver<PipelineStatus>) -> bool {
        let orphaned = rx.has_changed().is_err();
        let status = rx.borrow();
        let ended = orphaned || status.stage.is_terminal();
        // A negative age (clock moved back) counts as fresh.
        let aged_out = (Utc::now() - status.updated_at)
            .to_std()
            .map(|age| age >= self.retention)
            .unwrap_or(false);
        ended && aged_out
    }
}
