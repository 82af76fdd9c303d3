//! Recovers the JSON object from loosely formatted AI output.
//!
//! Handles markdown fences and prose around the object. Brace recovery is a
//! first-`{`-to-last-`}` heuristic: it does not balance braces, so a response
//! with a stray `}` after the object (or `{` before it) will not parse.

use serde_json::Value;

use crate::analysis::error::ResponseParseError;

/// Parses the AI text into JSON, tolerating fences and surrounding prose.
pub fn extract_json(raw: &str) -> Result<Value, ResponseParseError> {
    let cleaned = strip_code_fences(raw.trim());

    if let Ok(value) = serde_json::from_str::<Value>(cleaned) {
        return Ok(value);
    }

    let candidate = outermost_braces(cleaned).unwrap_or(cleaned);

    serde_json::from_str::<Value>(candidate).map_err(|e| ResponseParseError {
        raw: raw.to_string(),
        candidate: candidate.to_string(),
        reason: e.to_string(),
    })
}

/// Strips ```lang ... ``` or ``` ... ``` fences. Text without an opening fence
/// is returned as is; a missing closing fence is tolerated.
fn strip_code_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the language tag line (`json`, `JSON`, `json5`, empty).
    let body = match rest.split_once('\n') {
        Some((tag, body)) if is_language_tag(tag.trim()) => body,
        _ => rest,
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn is_language_tag(tag: &str) -> bool {
    tag.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '.'))
}

fn outermost_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fenced_with_json_tag() {
        let value = extract_json("```json\n{\"a\":1}\n```").unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_fenced_without_tag() {
        let value = extract_json("```\n{\"key\": \"value\"}\n```").unwrap();
        assert_eq!(value, json!({"key": "value"}));
    }

    #[test]
    fn test_fence_on_same_line_as_object() {
        let value = extract_json("```{\"a\":1}```").unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_object_starting_on_fence_line() {
        let value = extract_json("```{\n\"a\": 1}\n```").unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_unclosed_fence() {
        let value = extract_json("```json\n{\"a\":1}").unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_prose_around_object() {
        let value = extract_json("Here is your result: {\"a\":1} Thanks!").unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_prose_inside_fence() {
        let raw = "```json\nSure! {\"overallScore\": 80, \"skills\": {\"score\": 75}}\n```";
        let value = extract_json(raw).unwrap();
        assert_eq!(value["overallScore"], 80);
        assert_eq!(value["skills"]["score"], 75);
    }

    #[test]
    fn test_nested_objects_survive_greedy_match() {
        let raw = "Result:\n{\"ATS\": {\"score\": 70, \"tips\": [{\"tip\": \"x\"}]}}\nDone.";
        let value = extract_json(raw).unwrap();
        assert_eq!(value["ATS"]["tips"][0]["tip"], "x");
    }

    #[test]
    fn test_not_json_fails_with_diagnostics() {
        let err = extract_json("not json at all").unwrap_err();
        assert_eq!(err.raw, "not json at all");
        assert_eq!(err.candidate, "not json at all");
        assert!(!err.reason.is_empty());
    }

    #[test]
    fn test_trailing_brace_in_prose_defeats_heuristic() {
        let raw = "{\"a\":1} and a stray } here";
        let err = extract_json(raw).unwrap_err();
        assert_eq!(err.candidate, "{\"a\":1} and a stray }");
    }

    #[test]
    fn test_whitespace_only_fails() {
        assert!(extract_json("   \n ").is_err());
    }
}
