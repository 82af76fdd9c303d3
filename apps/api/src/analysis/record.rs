use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

const KEY_PREFIX: &str = "resume:";

/// Free-text job context supplied with the CV. Only used to build the prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobContext {
    pub company_name: String,
    pub job_title: String,
    pub job_description: String,
}

/// AI feedback attached to a record. Stored as `""` until the analysis lands.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Feedback {
    #[default]
    Pending,
    Ready(Value),
}

impl Feedback {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Feedback::Pending => None,
            Feedback::Ready(value) => Some(value),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Feedback::Pending)
    }
}

impl Serialize for Feedback {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Feedback::Pending => serializer.serialize_str(""),
            Feedback::Ready(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Feedback {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Null => Feedback::Pending,
            Value::String(s) if s.is_empty() => Feedback::Pending,
            other => Feedback::Ready(other),
        })
    }
}

/// The durable result of one run, persisted under `resume:{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRecord {
    pub id: Uuid,
    pub resume_path: String,
    pub image_path: String,
    pub company_name: String,
    pub job_title: String,
    pub job_description: String,
    #[serde(default)]
    pub feedback: Feedback,
}

impl ResumeRecord {
    pub fn new(id: Uuid, resume_path: String, image_path: String, job: JobContext) -> Self {
        Self {
            id,
            resume_path,
            image_path,
            company_name: job.company_name,
            job_title: job.job_title,
            job_description: job.job_description,
            feedback: Feedback::Pending,
        }
    }

    pub fn kv_key(&self) -> String {
        record_key(self.id)
    }
}

pub fn record_key(id: Uuid) -> String {
    format!("{KEY_PREFIX}{id}")
}

/// Pattern matching every record key.
pub fn record_key_pattern() -> String {
    format!("{KEY_PREFIX}*")
}
