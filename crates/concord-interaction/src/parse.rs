//! Normalization and parsing of generation output.
//!
//! Engines routinely wrap JSON answers in Markdown code fences; those are
//! stripped before parsing. A parse miss is reported as `Unparseable`, which
//! every call site treats exactly like a failed generation call.

use concord_core::generation::GenerationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^```(?:json)?\s*(.*?)\s*```$").expect("valid code fence regex")
});

/// Removes a surrounding ```json ... ``` (or plain ```) wrapper, if any.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    match CODE_FENCE.captures(trimmed) {
        Some(captures) => captures.get(1).map(|m| m.as_str()).unwrap_or(trimmed),
        None => trimmed,
    }
}

/// Parses generation output as JSON of the documented shape.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, GenerationError> {
    let cleaned = strip_code_fences(text);
    serde_json::from_str(cleaned).map_err(|err| GenerationError::Unparseable(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence() {
        let wrapped = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(wrapped), "{\"a\": 1}");
    }

    #[test]
    fn strips_bare_fence() {
        let wrapped = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(wrapped), "{\"a\": 1}");
    }

    #[test]
    fn leaves_unfenced_text_alone() {
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
        assert_eq!(strip_code_fences("plain text"), "plain text");
    }

    #[test]
    fn parse_json_reports_unparseable() {
        let result: Result<serde_json::Value, _> = parse_json("not json at all");
        assert!(matches!(result, Err(GenerationError::Unparseable(_))));
    }

    #[test]
    fn parse_json_reads_fenced_payloads() {
        let value: serde_json::Value = parse_json("```json\n{\"ok\": true}\n```").unwrap();
        assert_eq!(value["ok"], true);
    }
}
