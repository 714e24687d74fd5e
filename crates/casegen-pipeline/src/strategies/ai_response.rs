//! Lenient parsing of model-generated test cases.
//!
//! Models wrap JSON in code fences, return steps as objects, or return
//! expected results as lists. Everything is normalized to plain strings.

use serde_json::Value;

use casegen_core::{Error, Priority, Result};

/// Test case fields extracted from a model response. Missing fields are
/// empty and later filled with placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AiTestCase {
    pub title: String,
    pub summary: String,
    pub description: String,
    pub preconditions: String,
    pub steps: Vec<String>,
    pub expected_results: String,
    pub priority: Option<Priority>,
}

/// Slice from the first `{` to the last `}`.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn strip_list_marker(step: &str) -> String {
    let trimmed = step.trim();
    let digits = trimmed.len() - trimmed.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    let rest = &trimmed[digits..];
    if digits > 0 && rest.starts_with(['.', ')', ':']) {
        return rest[1..].trim().to_string();
    }
    trimmed.trim_start_matches(['-', '*', '•']).trim().to_string()
}

fn field<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k)).filter(|v| !v.is_null())
}

fn as_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| as_text(Some(v)))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("; "),
        Some(Value::Object(_)) => as_text(value.and_then(|v| {
            field(v, &["text", "description", "action", "step", "result"])
        })),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn as_steps(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| strip_list_marker(&as_text(Some(v))))
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .lines()
            .map(strip_list_marker)
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Parse a model response into an [`AiTestCase`].
///
/// Fails when there is no JSON object or when it carries neither a title
/// nor any steps.
pub fn parse_ai_response(text: &str) -> Result<AiTestCase> {
    let json = extract_json_object(text)
        .ok_or_else(|| Error::Inference("Model response contained no JSON object".into()))?;
    let value: Value = serde_json::from_str(json)
        .map_err(|e| Error::Inference(format!("Model response is not valid JSON: {}", e)))?;

    let parsed = AiTestCase {
        title: as_text(field(&value, &["title", "name", "test_case_title"])),
        summary: as_text(field(&value, &["summary"])),
        description: as_text(field(&value, &["description", "full_script"])),
        preconditions: as_text(field(&value, &["preconditions", "prerequisites"])),
        steps: as_steps(field(&value, &["steps", "test_steps"])),
        expected_results: as_text(field(&value, &["expected_results", "expected_result", "expected"])),
        priority: field(&value, &["priority"])
            .and_then(Value::as_str)
            .and_then(|p| p.parse::<Priority>().ok()),
    };

    if parsed.title.is_empty() && parsed.steps.is_empty() {
        return Err(Error::Inference(
            "Model response has neither a title nor steps".into(),
        ));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fenced_json() {
        let text = r#"Here you go:
```json
{
  "title": "Login with valid credentials",
  "description": "User logs in",
  "preconditions": ["Account exists", "App is open"],
  "steps": ["1. Open the app", "2) Enter username", "- Click Login"],
  "expected_results": "Dashboard is shown",
  "priority": "high"
}
```"#;
        let parsed = parse_ai_response(text).unwrap();
        assert_eq!(parsed.title, "Login with valid credentials");
        assert_eq!(parsed.preconditions, "Account exists; App is open");
        assert_eq!(parsed.steps, vec!["Open the app", "Enter username", "Click Login"]);
        assert_eq!(parsed.expected_results, "Dashboard is shown");
        assert_eq!(parsed.priority, Some(Priority::High));
    }

    #[test]
    fn test_parse_step_objects_and_string_steps() {
        let parsed = parse_ai_response(
            r#"{"title": "T", "steps": [{"step": 1, "action": "Click Save"}, {"description": "Check toast"}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.steps, vec!["Click Save", "Check toast"]);

        let parsed = parse_ai_response(r#"{"title": "T", "steps": "1. Open\n2. Close\n"}"#).unwrap();
        assert_eq!(parsed.steps, vec!["Open", "Close"]);
    }

    #[test]
    fn test_unknown_priority_is_none() {
        let parsed = parse_ai_response(r#"{"title": "T", "priority": "P9"}"#).unwrap();
        assert!(parsed.priority.is_none());

        let parsed = parse_ai_response(r#"{"title": "T", "priority": "Low"}"#).unwrap();
        assert_eq!(parsed.priority, Some(Priority::Low));
    }

    #[test]
    fn test_rejects_non_json_and_empty() {
        assert!(parse_ai_response("I cannot see any video.").is_err());
        assert!(parse_ai_response("{not json}").is_err());
        assert!(parse_ai_response(r#"{"description": "only text"}"#).is_err());
    }

    #[test]
    fn test_null_fields_are_empty() {
        let parsed = parse_ai_response(r#"{"title": "T", "summary": null, "steps": null}"#).unwrap();
        assert_eq!(parsed.summary, "");
        assert!(parsed.steps.is_empty());
    }

    #[test]
    fn test_strip_list_marker() {
        assert_eq!(strip_list_marker("12. Do it"), "Do it");
        assert_eq!(strip_list_marker("* Do it"), "Do it");
        assert_eq!(strip_list_marker("Do it"), "Do it");
        assert_eq!(strip_list_marker("2FA code entered"), "2FA code entered");
        assert_eq!(strip_list_marker("3: Done"), "Done");
    }
}
