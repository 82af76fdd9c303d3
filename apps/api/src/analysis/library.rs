//! Read side of persisted records, plus the bulk wipe.

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::record::{record_key, record_key_pattern, ResumeRecord};
use crate::analysis::scoring::{compute_overall_score, ScoreTier};
use crate::platform::{KeyValueStore, PlatformError, Storage};

/// Root passed to `Storage::read_dir` when wiping.
const STORAGE_ROOT: &str = "./";

/// One entry of the record listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSummary {
    pub id: Uuid,
    pub company_name: String,
    pub job_title: String,
    pub image_path: String,
    pub analyzed: bool,
    pub overall_score: u8,
    pub tier: ScoreTier,
}

impl From<&ResumeRecord> for RecordSummary {
    fn from(record: &ResumeRecord) -> Self {
        let overall_score = record
            .feedback
            .as_value()
            .map(compute_overall_score)
            .unwrap_or(0);
        Self {
            id: record.id,
            company_name: record.company_name.clone(),
            job_title: record.job_title.clone(),
            image_path: record.image_path.clone(),
            analyzed: !record.feedback.is_pending(),
            overall_score,
            tier: ScoreTier::for_score(overall_score),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WipeReport {
    pub files_deleted: usize,
    pub files_failed: usize,
}

/// Every persisted record, sorted by key. Entries that no longer parse are
/// skipped and logged rather than failing the whole listing.
pub async fn list_records(kv: &dyn KeyValueStore) -> Result<Vec<ResumeRecord>, PlatformError> {
    let entries = kv.list(&record_key_pattern()).await?;
    Ok(entries
        .into_iter()
        .filter_map(|(key, value)| match serde_json::from_str::<ResumeRecord>(&value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping unreadable record {key}: {e}");
                None
            }
        })
        .collect())
}

pub async fn get_record(
    kv: &dyn KeyValueStore,
    id: Uuid,
) -> Result<Option<ResumeRecord>, PlatformError> {
    let Some(value) = kv.get(&record_key(id)).await? else {
        return Ok(None);
    };
    serde_json::from_str(&value)
        .map(Some)
        .map_err(|e| PlatformError::Kv(format!("record {id} is corrupt: {e}")))
}

/// Deletes every stored file, then flushes the key-value store.
///
/// A file that fails to delete is counted and logged; the flush still runs.
pub async fn wipe_all(
    storage: &dyn Storage,
    kv: &dyn KeyValueStore,
) -> Result<WipeReport, PlatformError> {
    let files = storage.read_dir(STORAGE_ROOT).await?;
    let mut report = WipeReport {
        files_deleted: 0,
        files_failed: 0,
    };

    for file in &files {
        match storage.delete(&file.path).await {
            Ok(()) => report.files_deleted += 1,
            Err(e) => {
                warn!("Failed to delete {}: {e}", file.path);
                report.files_failed += 1;
            }
        }
    }

    kv.flush().await?;
    info!(
        "Wiped app data: {} files deleted, {} failed, key-value store flushed",
        report.files_deleted, report.files_failed
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::analysis::record::{Feedback, JobContext};
    use crate::analysis::testing::{pdf_document, FakeStorage, RecordingKv};

    fn record(feedback: Feedback) -> ResumeRecord {
        let mut record = ResumeRecord::new(
            Uuid::new_v4(),
            "uploads/a/cv.pdf".into(),
            "uploads/b/cv.png".into(),
            JobContext {
                company_name: "Acme".into(),
                job_title: "Engineer".into(),
                job_description: String::new(),
            },
        );
        record.feedback = feedback;
        record
    }

    async fn store(kv: &RecordingKv, record: &ResumeRecord) {
        kv.set(&record.kv_key(), &serde_json::to_string(record).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_skips_corrupt_and_foreign_entries() {
        let kv = RecordingKv::default();
        let good = record(Feedback::Ready(json!({"overallScore": 88})));
        store(&kv, &good).await;
        kv.set("resume:broken", "{not json").await.unwrap();
        kv.set("session:abc", "{}").await.unwrap();

        let records = list_records(&kv).await.unwrap();
        assert_eq!(records, vec![good]);
    }

    #[tokio::test]
    async fn test_summary_scores() {
        let done = RecordSummary::from(&record(Feedback::Ready(json!({
            "content": {"score": 40}, "skills": {"score": 50}
        }))));
        assert!(done.analyzed);
        assert_eq!(done.overall_score, 45);
        assert_eq!(done.tier, ScoreTier::NeedsWork);

        let pending = RecordSummary::from(&record(Feedback::Pending));
        assert!(!pending.analyzed);
        assert_eq!(pending.overall_score, 0);
    }

    #[tokio::test]
    async fn test_get_record() {
        let kv = RecordingKv::default();
        let saved = record(Feedback::Pending);
        store(&kv, &saved).await;

        assert_eq!(get_record(&kv, saved.id).await.unwrap(), Some(saved));
        assert_eq!(get_record(&kv, Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_corrupt_record_is_error() {
        let kv = RecordingKv::default();
        let id = Uuid::new_v4();
        kv.set(&record_key(id), "[]").await.unwrap();
        assert!(get_record(&kv, id).await.is_err());
    }

    #[tokio::test]
    async fn test_wipe_deletes_files_and_flushes() {
        let storage = FakeStorage::default();
        let kv = RecordingKv::default();
        storage.upload(&pdf_document()).await.unwrap();
        storage.upload(&pdf_document()).await.unwrap();
        store(&kv, &record(Feedback::Pending)).await;

        let report = wipe_all(&storage, &kv).await.unwrap();

        assert_eq!(report.files_deleted, 2);
        assert_eq!(report.files_failed, 0);
        assert_eq!(storage.file_count(), 0);
        assert!(list_records(&kv).await.unwrap().is_empty());
    }
}
