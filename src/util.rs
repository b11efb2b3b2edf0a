//! Helpers for pulling structured data out of agent prose.

use serde::de::DeserializeOwned;

/// Deserialize the first `{...}` span of `text` that parses as `T`.
///
/// Returns `None` when the text holds no balanced object at all. When spans
/// exist but none parse, the first span's error is returned.
pub fn parse_json_object<T: DeserializeOwned>(text: &str) -> Option<Result<T, serde_json::Error>> {
    parse_first_balanced(text, '{', '}')
}

/// Deserialize the first `[...]` span of `text` that parses as `T`, skipping
/// bracketed prose ahead of it.
pub fn parse_json_array<T: DeserializeOwned>(text: &str) -> Option<Result<T, serde_json::Error>> {
    parse_first_balanced(text, '[', ']')
}

fn parse_first_balanced<T: DeserializeOwned>(
    text: &str,
    open: char,
    close: char,
) -> Option<Result<T, serde_json::Error>> {
    let mut first_err = None;
    for (start, _) in text.match_indices(open) {
        let Some(span) = balanced_at(text, start, open, close) else {
            continue;
        };
        match serde_json::from_str(span) {
            Ok(value) => return Some(Ok(value)),
            Err(e) => {
                first_err.get_or_insert(e);
            }
        }
    }
    first_err.map(Err)
}

fn balanced_at(text: &str, start: usize, open: char, close: char) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Truncate to `max_len` characters, marking the cut with `...`.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{Value, json};

    fn object(text: &str) -> Option<Value> {
        parse_json_object(text).and_then(Result::ok)
    }

    fn array(text: &str) -> Option<Value> {
        parse_json_array(text).and_then(Result::ok)
    }

    #[test]
    fn test_parse_json_object_simple() {
        assert_eq!(object(r#"{"key": "value"}"#), Some(json!({"key": "value"})));
    }

    #[test]
    fn test_parse_json_object_with_surrounding_prose() {
        let text = r#"Here is the review: {"success": true} and some more text"#;
        assert_eq!(object(text), Some(json!({"success": true})));
    }

    #[test]
    fn test_parse_json_object_nested() {
        let text = r#"{"outer": {"inner": "value"}}"#;
        assert_eq!(object(text), Some(json!({"outer": {"inner": "value"}})));
    }

    #[test]
    fn test_brackets_inside_strings_are_ignored() {
        let text = r#"{"summary": "closing } early", "n": 1} trailing"#;
        assert_eq!(object(text), Some(json!({"summary": "closing } early", "n": 1})));
        let text = r#"[{"error": "index ] out of \"range\""}]"#;
        assert_eq!(array(text), Some(json!([{"error": "index ] out of \"range\""}])));
    }

    #[test]
    fn test_parse_json_array_from_fenced_block() {
        let text = "```json\n[{\"passed\": true}]\n```";
        assert_eq!(array(text), Some(json!([{"passed": true}])));
    }

    #[test]
    fn test_none_when_absent_or_unclosed() {
        assert!(parse_json_object::<Value>("No JSON here").is_none());
        assert!(parse_json_object::<Value>(r#"{"key": "value""#).is_none());
        assert!(parse_json_array::<Value>("[1, 2").is_none());
    }

    #[test]
    fn test_parse_json_array_skips_bracketed_prose() {
        let text = "Ran suites [unit, e2e]:\n[{\"passed\": true}]";
        let parsed: Vec<Value> = parse_json_array(text).unwrap().unwrap();
        assert_eq!(parsed, vec![json!({"passed": true})]);
    }

    #[test]
    fn test_parse_json_object_skips_braced_prose() {
        #[derive(serde::Deserialize)]
        struct Verdict {
            success: bool,
        }
        let text = r#"Checked {the diff} then: {"success": false}"#;
        let verdict: Verdict = parse_json_object(text).unwrap().unwrap();
        assert!(!verdict.success);
    }

    #[test]
    fn test_parse_json_reports_first_error_or_none() {
        let err = parse_json_array::<Vec<u32>>("[a] then [b]").unwrap();
        assert!(err.is_err());
        assert!(parse_json_array::<Vec<u32>>("no brackets").is_none());
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("short", 10), "short");
        assert_eq!(truncate_str("abcdefghij", 6), "abc...");
    }
}
