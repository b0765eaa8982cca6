//! Response parser — turns free-text planning output into a decision.
//!
//! Small models wrap their JSON in reasoning traces, code fences and
//! prose. Parsing is layered:
//!
//! 1. strip `<think>…</think>` traces (only matched pairs)
//! 2. strip code fence markers, keeping the enclosed text
//! 3. parse the remainder as JSON
//! 4. failing that, parse the first brace-balanced `{…}` substring
//!
//! Step 4 is a heuristic: braces inside JSON strings are counted like any
//! other brace, so adversarial text can defeat it.

use leap_core::ToolRequest;
use regex_lite::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static REASONING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<think>.*?</think>|<thinking>.*?</thinking>").expect("invalid reasoning regex")
});

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json|JSON)?[ \t]*").expect("invalid fence regex"));

/// What the planning model decided.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    /// Run this tool next.
    Call(ToolRequest),
    /// `{"tool": null}`: no further action.
    Finish,
    /// Nothing usable in the reply.
    Unparseable,
}

/// Remove matched reasoning-trace blocks. An unterminated `<think>` is left alone.
///
/// Repeats until nothing changes, so the result is a fixpoint and
/// stripping twice equals stripping once.
pub fn strip_reasoning(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = REASONING_RE.replace_all(&current, "").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Remove ```` ``` ```` and ```` ```json ```` markers without touching the enclosed text.
pub fn strip_fences(text: &str) -> String {
    FENCE_RE.replace_all(text, "").into_owned()
}

/// The first substring starting at `open` whose `open`/`close` count balances.
pub fn extract_balanced(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    for (offset, c) in text[start..].char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(&text[start..start + offset + c.len_utf8()]);
            }
        }
    }
    None
}

/// The first balanced JSON object or array, whichever opens first.
pub fn extract_json_fragment(text: &str) -> Option<&str> {
    let brace = text.find('{');
    let bracket = text.find('[');
    match (brace, bracket) {
        (Some(b), Some(k)) if k < b => extract_balanced(text, '[', ']'),
        (Some(_), _) => extract_balanced(text, '{', '}'),
        (None, Some(_)) => extract_balanced(text, '[', ']'),
        (None, None) => None,
    }
}

/// Parse a planning-model reply.
pub fn parse(raw: &str) -> ParsedResponse {
    let cleaned = strip_fences(&strip_reasoning(raw));
    let cleaned = cleaned.trim();

    if let Some(decision) = serde_json::from_str::<Value>(cleaned)
        .ok()
        .and_then(|v| interpret(&v))
    {
        return decision;
    }

    extract_balanced(cleaned, '{', '}')
        .and_then(|fragment| serde_json::from_str::<Value>(fragment).ok())
        .and_then(|v| interpret(&v))
        .unwrap_or(ParsedResponse::Unparseable)
}

/// Interpret a JSON value as a decision. `None` if it isn't a mapping with a usable `tool` key.
fn interpret(value: &Value) -> Option<ParsedResponse> {
    let obj = value.as_object()?;
    let tool = match obj.get("tool")? {
        Value::Null => return Some(ParsedResponse::Finish),
        Value::String(s) => s.trim(),
        _ => return None,
    };
    if tool.is_empty() || tool == "null" {
        return Some(ParsedResponse::Finish);
    }

    let params = match obj.get("params") {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    let filter = match obj.get("filter") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    };

    Some(ParsedResponse::Call(ToolRequest {
        tool: tool.to_string(),
        params,
        filter,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(tool: &str, params: Value) -> ParsedResponse {
        let mut request = ToolRequest::new(tool);
        request.params = params.as_object().cloned().unwrap_or_default();
        ParsedResponse::Call(request)
    }

    #[test]
    fn null_tool_is_finish() {
        assert_eq!(parse(r#"{"tool": null}"#), ParsedResponse::Finish);
        assert_eq!(parse(r#"{"tool": "null"}"#), ParsedResponse::Finish);
        assert_eq!(parse(r#"{"tool": ""}"#), ParsedResponse::Finish);
        assert_eq!(parse(r#"{"tool": null, "params": {"x": 1}}"#), ParsedResponse::Finish);
    }

    #[test]
    fn bare_json_call() {
        let parsed = parse(r#"{"tool": "read_file", "params": {"path": "a.txt"}, "filter": ["content"]}"#);
        let ParsedResponse::Call(request) = parsed else {
            panic!("expected a call");
        };
        assert_eq!(request.tool, "read_file");
        assert_eq!(request.params["path"], "a.txt");
        assert_eq!(request.filter, vec!["content"]);
    }

    #[test]
    fn prose_and_fence_match_bare_json() {
        let bare = r#"{"tool": "read_file", "params": {"path": "a.txt"}}"#;
        let wrapped = "sure, here:\n```json\n{\"tool\": \"read_file\", \"params\": {\"path\": \"a.txt\"}}\n```";
        assert_eq!(parse(wrapped), parse(bare));
        assert_eq!(parse(wrapped), call("read_file", json!({"path": "a.txt"})));
    }

    #[test]
    fn plain_fence_without_language() {
        let text = "```\n{\"tool\": \"get_current_time\"}\n```";
        assert_eq!(parse(text), call("get_current_time", json!({})));
    }

    #[test]
    fn reasoning_trace_is_ignored() {
        let text = "<think>\nI should use {\"tool\": \"web_search\"} maybe\n</think>\n{\"tool\": \"calculate\", \"params\": {\"expression\": \"2+2\"}}";
        assert_eq!(parse(text), call("calculate", json!({"expression": "2+2"})));
    }

    #[test]
    fn unterminated_trace_is_kept() {
        let text = "<think>never closed {\"tool\": \"calculate\"}";
        assert_eq!(strip_reasoning(text), text);
        // The balanced-brace fallback still finds the call
        assert_eq!(parse(text), call("calculate", json!({})));
    }

    #[test]
    fn stripping_is_idempotent() {
        let samples = [
            "<think>a</think>b",
            "<thi<think>x</think>nk>y</think>z",
            "<think>one</think> mid <thinking>two</thinking> end",
            "no traces at all",
            "<think>unterminated",
        ];
        for sample in samples {
            let once = strip_reasoning(sample);
            assert_eq!(strip_reasoning(&once), once, "not idempotent for {sample:?}");
        }
        assert_eq!(strip_reasoning("<thi<think>x</think>nk>y</think>z"), "z");
    }

    #[test]
    fn strip_is_non_greedy() {
        assert_eq!(strip_reasoning("<think>a</think>keep<think>b</think>"), "keep");
    }

    #[test]
    fn balanced_extraction_handles_nesting() {
        let text = r#"Answer: {"tool": "x", "params": {"a": {"b": 1}}} trailing }"#;
        assert_eq!(
            extract_balanced(text, '{', '}'),
            Some(r#"{"tool": "x", "params": {"a": {"b": 1}}}"#)
        );
        assert_eq!(extract_balanced("no braces", '{', '}'), None);
        assert_eq!(extract_balanced("{ unbalanced", '{', '}'), None);
    }

    #[test]
    fn json_fragment_picks_first_opener() {
        assert_eq!(extract_json_fragment(r#"x [1, {"a": 2}] y"#), Some(r#"[1, {"a": 2}]"#));
        assert_eq!(extract_json_fragment(r#"x {"a": [1]} y"#), Some(r#"{"a": [1]}"#));
        assert_eq!(extract_json_fragment("nothing"), None);
    }

    #[test]
    fn missing_tool_key_is_unparseable() {
        assert_eq!(parse(r#"{"action": "read_file"}"#), ParsedResponse::Unparseable);
        assert_eq!(parse("I think we're done here."), ParsedResponse::Unparseable);
        assert_eq!(parse(""), ParsedResponse::Unparseable);
        assert_eq!(parse(r#"["tool", "calculate"]"#), ParsedResponse::Unparseable);
    }

    #[test]
    fn non_string_tool_is_unparseable() {
        assert_eq!(parse(r#"{"tool": 42}"#), ParsedResponse::Unparseable);
        assert_eq!(parse(r#"{"tool": ["calculate"]}"#), ParsedResponse::Unparseable);
    }

    #[test]
    fn lenient_params_and_filter() {
        let parsed = parse(r#"{"tool": "read_file", "params": "a.txt", "filter": "content"}"#);
        let ParsedResponse::Call(request) = parsed else {
            panic!("expected a call");
        };
        assert!(request.params.is_empty());
        assert_eq!(request.filter, vec!["content"]);
    }

    #[test]
    fn fallback_after_invalid_json_prefix() {
        let text = r#"Here you go {"tool": "list_directory", "params": {"path": "."}} hope that helps"#;
        assert_eq!(parse(text), call("list_directory", json!({"path": "."})));
    }

    #[test]
    fn unknown_tool_name_is_still_a_call() {
        // Validation against the registry happens at execution time
        assert_eq!(parse(r#"{"tool": "does_not_exist"}"#), call("does_not_exist", json!({})));
    }
}
