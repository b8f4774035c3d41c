//! Extraction of a single JSON value from free-form model output.
//!
//! Models wrap payloads in markdown fences, prefix them with status chatter
//! ("Initializing model...") or follow them with commentary. The parser
//! locates the payload, tolerates the noise around it and normalizes list
//! fields that sometimes arrive as comma-joined strings.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::core::config::ParserConfig;
use crate::core::error::AiError;

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z0-9_+-]*").expect("fence pattern is valid"));

/// Fields the schema declares as arrays of strings.
pub const LIST_FIELDS: [&str; 3] = ["steps", "applications", "tags"];

#[derive(Debug, Clone)]
pub struct ResponseParser {
    status_keywords: Vec<String>,
    lookbehind_chars: usize,
    raw_prefix_chars: usize,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new(&ParserConfig::default())
    }
}

impl ResponseParser {
    pub fn new(config: &ParserConfig) -> Self {
        Self {
            status_keywords: config
                .status_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            lookbehind_chars: config.lookbehind_chars,
            raw_prefix_chars: config.raw_prefix_chars,
        }
    }

    pub fn parse(&self, raw: &str) -> Result<Value, AiError> {
        let text = strip_code_fences(raw);

        if !text.contains(['{', '[']) {
            return Err(AiError::NoJsonFound {
                raw_prefix: raw_prefix(raw, self.raw_prefix_chars),
            });
        }

        let mut last_error = None;
        if let Some(span) = self.primary_span(&text) {
            match serde_json::from_str::<Value>(span) {
                Ok(mut value) => {
                    normalize_list_fields(&mut value);
                    return Ok(value);
                }
                Err(e) => last_error = Some(e.to_string()),
            }
        }

        // Brute force: every delimiter is a candidate, status vocabulary or not.
        for start in candidate_starts(&text) {
            let Some(end) = match_delimiters(&text, start) else {
                continue;
            };
            match serde_json::from_str::<Value>(&text[start..=end]) {
                Ok(mut value) => {
                    normalize_list_fields(&mut value);
                    return Ok(value);
                }
                Err(e) => last_error = Some(e.to_string()),
            }
        }

        Err(AiError::MalformedJson {
            reason: last_error.unwrap_or_else(|| "unbalanced braces or brackets".to_string()),
            raw_prefix: raw_prefix(raw, self.raw_prefix_chars),
        })
    }

    /// First span that starts away from status vocabulary and passes the delimiter checks.
    fn primary_span<'a>(&self, text: &'a str) -> Option<&'a str> {
        for start in candidate_starts(text) {
            if self.preceded_by_status(text, start) {
                continue;
            }
            let Some(end) = match_delimiters(text, start) else {
                continue;
            };
            let span = &text[start..=end];
            if self.is_plausible_payload(span) {
                return Some(span);
            }
        }
        None
    }

    fn preceded_by_status(&self, text: &str, idx: usize) -> bool {
        let before = &text[..idx];
        let window_start = before
            .char_indices()
            .rev()
            .nth(self.lookbehind_chars.saturating_sub(1))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let window = before[window_start..].to_lowercase();
        self.status_keywords.iter().any(|k| window.contains(k.as_str()))
    }

    fn is_plausible_payload(&self, span: &str) -> bool {
        let trimmed = span.trim();
        let delimiters_match = (trimmed.starts_with('{') && trimmed.ends_with('}'))
            || (trimmed.starts_with('[') && trimmed.ends_with(']'));
        if !delimiters_match {
            return false;
        }
        let inner = trimmed[1..].trim_start().to_lowercase();
        !self
            .status_keywords
            .iter()
            .any(|k| inner.starts_with(k.as_str()))
    }
}

pub fn strip_code_fences(text: &str) -> String {
    FENCE_RE.replace_all(text, "").into_owned()
}

pub fn raw_prefix(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn candidate_starts(text: &str) -> impl Iterator<Item = usize> + '_ {
    text.char_indices()
        .filter(|(_, c)| *c == '{' || *c == '[')
        .map(|(i, _)| i)
}

/// Byte index of the delimiter closing the one at `start`. String literals are skipped.
fn match_delimiters(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split comma-joined list fields into arrays and turn `null` lists into empty ones,
/// on a top-level object or each object of an array.
pub fn normalize_list_fields(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for field in LIST_FIELDS {
                let items = match map.get(field) {
                    Some(Value::String(joined)) => split_list(joined),
                    Some(Value::Null) => Vec::new(),
                    _ => continue,
                };
                map.insert(field.to_string(), Value::Array(items));
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut().filter(|v| v.is_object()) {
                normalize_list_fields(item);
            }
        }
        _ => {}
    }
}

fn split_list(joined: &str) -> Vec<Value> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Value::String(s.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::AiErrorKind;
    use serde_json::json;

    fn parser() -> ResponseParser {
        ResponseParser::default()
    }

    #[test]
    fn initializing_prefix_with_comma_joined_steps() {
        let raw = "Initializing model...\n{\"name\":\"Foo\",\"steps\":\"a, b, c\"}";
        let value = parser().parse(raw).expect("payload should parse");
        assert_eq!(value, json!({"name": "Foo", "steps": ["a", "b", "c"]}));
    }

    #[test]
    fn loading_prose_before_object_extracts_that_object() {
        let raw = "Loading weights, please hold on. Done loading.\n{\"name\":\"Ant Colony\",\"tags\":[\"swarm\"]}\nHope this helps!";
        let value = parser().parse(raw).expect("payload should parse");
        assert_eq!(value, json!({"name": "Ant Colony", "tags": ["swarm"]}));
    }

    #[test]
    fn no_delimiters_is_no_json_found() {
        let err = parser()
            .parse("The model is still loading, please retry later.")
            .expect_err("must fail");
        assert_eq!(err.kind(), AiErrorKind::NoJsonFound);
        assert_eq!(
            err.raw_prefix(),
            Some("The model is still loading, please retry later.")
        );
    }

    #[test]
    fn fenced_block_with_trailing_prose() {
        let raw = "Here you go:\n```json\n{\"name\":\"Slime Mold Router\",\"applications\":\"networks , logistics\"}\n```\nLet me know if you need more.";
        let value = parser().parse(raw).expect("payload should parse");
        assert_eq!(value["applications"], json!(["networks", "logistics"]));
    }

    #[test]
    fn braces_inside_error_message_are_skipped() {
        let raw = "error: unexpected token {at position 3}\n{\"name\":\"Real\"}";
        let value = parser().parse(raw).expect("payload should parse");
        assert_eq!(value, json!({"name": "Real"}));
    }

    #[test]
    fn braces_inside_string_literals_do_not_end_the_span() {
        let raw = r#"{"name":"Tricky","pseudoCode":"if x { return [1] }"} trailing"#;
        let value = parser().parse(raw).expect("payload should parse");
        assert_eq!(value["pseudoCode"], "if x { return [1] }");
    }

    #[test]
    fn top_level_array_elements_are_normalized() {
        let raw = r#"[{"title":"A","tags":"x,y"},{"title":"B","tags":["z"]}]"#;
        let value = parser().parse(raw).expect("payload should parse");
        assert_eq!(value[0]["tags"], json!(["x", "y"]));
        assert_eq!(value[1]["tags"], json!(["z"]));
    }

    #[test]
    fn truncated_payload_is_malformed_with_prefix() {
        let raw = "{\"name\":\"Cut off\",\"steps\":[\"a\"";
        let err = parser().parse(raw).expect_err("must fail");
        assert_eq!(err.kind(), AiErrorKind::MalformedJson);
        assert_eq!(err.raw_prefix(), Some(raw));
    }

    #[test]
    fn raw_prefix_is_capped() {
        let raw = format!("{{ not json {}", "x".repeat(2000));
        let err = parser().parse(&raw).expect_err("must fail");
        assert_eq!(err.raw_prefix().map(|p| p.chars().count()), Some(500));
    }

    #[test]
    fn comma_joined_lists_reconstruct_original_arrays() {
        let original = vec!["sense gradient", "move", "deposit pheromone"];
        let mut value = json!({"steps": original.join(", "), "tags": "a,b"});
        normalize_list_fields(&mut value);
        assert_eq!(value["steps"], json!(original));
        assert_eq!(value["tags"], json!(["a", "b"]));
    }

    #[test]
    fn null_lists_become_empty_arrays() {
        let mut value = json!({"tags": null, "steps": ["keep"], "applications": null});
        normalize_list_fields(&mut value);
        assert_eq!(value["tags"], json!([]));
        assert_eq!(value["applications"], json!([]));
        assert_eq!(value["steps"], json!(["keep"]));
    }

    #[test]
    fn keyword_list_is_configurable() {
        let config = ParserConfig {
            status_keywords: vec!["warming up".to_string()],
            ..ParserConfig::default()
        };
        let parser = ResponseParser::new(&config);
        let raw = "warming up {partial}\n{\"name\":\"Ok\"}";
        assert_eq!(parser.parse(raw).expect("parse"), json!({"name": "Ok"}));
    }

    #[test]
    fn inner_status_text_is_rejected_as_primary_candidate() {
        let raw = "{Loading model} then {\"name\":\"Bee\"}";
        let value = parser().parse(raw).expect("payload should parse");
        assert_eq!(value, json!({"name": "Bee"}));
    }
}
