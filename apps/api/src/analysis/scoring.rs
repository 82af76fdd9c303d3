//! Score normalization: reduces whatever the AI returned to usable integers.
//!
//! Nothing in here fails. Unusable fields are skipped and an unusable payload
//! scores 0, so every displayed score is an integer in [0, 100].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Category keys averaged when `overallScore` is unusable, in display order.
const CATEGORY_KEYS: [&str; 5] = ["ATS", "toneAndStyle", "content", "structure", "skills"];

/// Normalized scores for one feedback payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackScoreSet {
    pub overall_score: u8,
    #[serde(rename = "ATS")]
    pub ats: Option<u8>,
    pub tone_and_style: Option<u8>,
    pub content: Option<u8>,
    pub structure: Option<u8>,
    pub skills: Option<u8>,
}

impl FeedbackScoreSet {
    pub fn from_feedback(feedback: &Value) -> Self {
        Self {
            overall_score: compute_overall_score(feedback),
            ats: category_score(feedback, "ATS"),
            tone_and_style: category_score(feedback, "toneAndStyle"),
            content: category_score(feedback, "content"),
            structure: category_score(feedback, "structure"),
            skills: category_score(feedback, "skills"),
        }
    }
}

/// Badge shown next to a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreTier {
    Strong,
    GoodStart,
    NeedsWork,
}

impl ScoreTier {
    pub fn for_score(score: u8) -> Self {
        match score {
            71.. => ScoreTier::Strong,
            50..=70 => ScoreTier::GoodStart,
            _ => ScoreTier::NeedsWork,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScoreTier::Strong => "Strong",
            ScoreTier::GoodStart => "Good Start",
            ScoreTier::NeedsWork => "Needs work",
        }
    }
}

/// Reduces a feedback payload to one score in [0, 100].
///
/// 1. Non-object → 0
/// 2. Usable `overallScore` → that value, rounded half-up
/// 3. Otherwise the rounded mean of the usable category scores, or 0 if none
pub fn compute_overall_score(feedback: &Value) -> u8 {
    let Some(obj) = feedback.as_object() else {
        return 0;
    };

    if let Some(direct) = obj.get("overallScore").and_then(valid_score) {
        return round_half_up(direct);
    }

    let parts: Vec<f64> = CATEGORY_KEYS
        .iter()
        .filter_map(|key| obj.get(*key))
        .filter_map(|category| category.get("score"))
        .filter_map(valid_score)
        .collect();

    if parts.is_empty() {
        return 0;
    }

    let avg = parts.iter().sum::<f64>() / parts.len() as f64;
    round_half_up(avg)
}

fn category_score(feedback: &Value, key: &str) -> Option<u8> {
    feedback
        .get(key)?
        .get("score")
        .and_then(valid_score)
        .map(round_half_up)
}

/// A number, or a string holding one, within [0, 100].
fn valid_score(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (n.is_finite() && (0.0..=100.0).contains(&n)).then_some(n)
}

/// Inputs are already within [0, 100], so the cast cannot truncate.
fn round_half_up(n: f64) -> u8 {
    (n + 0.5).floor() as u8
}
