//! Response normalization
//!
//! Upstream models answer in many shapes: chat envelopes, JSON-encoded
//! strings, markdown fences, `{"code": ...}` objects, or any nesting of
//! these. Each pass below peels one layer and returns `None` when it does not
//! apply. Passes are pure and run in order until none applies, bounded by
//! [`MAX_ITERATIONS`].

use recplay_common::{AiRequestKind, AiResponse, AnalysisResult};
use serde_json::Value;

/// Upper bound on unwrapping rounds
pub const MAX_ITERATIONS: usize = 8;

type Pass = fn(&str) -> Option<String>;

const COMMON_PASSES: &[Pass] = &[extract_fence, unwrap_json_string, unwrap_envelope];

/// Normalize a raw upstream body for the given request kind
pub fn normalize(kind: AiRequestKind, body: &str) -> AiResponse {
    let text = unwrap_text(kind, body);
    match kind {
        AiRequestKind::Generate => AiResponse::Generate {
            code: finish_code(&text),
        },
        AiRequestKind::Analyze => AiResponse::Analyze(parse_analysis(&text)),
    }
}

/// Apply passes until a fixed point or the iteration cap
pub fn unwrap_text(kind: AiRequestKind, body: &str) -> String {
    let mut current = body.trim().to_string();

    for _ in 0..MAX_ITERATIONS {
        let next = COMMON_PASSES
            .iter()
            .find_map(|pass| pass(&current))
            .or_else(|| match kind {
                AiRequestKind::Generate => extract_code_field(&current),
                AiRequestKind::Analyze => None,
            });

        match next {
            Some(next) if next != current => current = next,
            _ => break,
        }
    }

    current
}

/// Contents of the first fenced block, without the language tag.
///
/// Valid JSON is left to the JSON passes: inside an encoded envelope the
/// newlines that delimit the fence are still escaped.
fn extract_fence(text: &str) -> Option<String> {
    if serde_json::from_str::<Value>(text).is_ok() {
        return None;
    }
    let open = text.find("```")?;
    let after_open = &text[open + 3..];
    let close = after_open.find("```");
    let inner = match (after_open.find('\n'), close) {
        // Single-line fence: everything up to the closing marker is content
        (None, Some(close)) => &after_open[..close],
        (Some(nl), Some(close)) if close < nl => &after_open[..close],
        // Skip the info string (e.g. `json`, `javascript`)
        (Some(nl), _) => {
            let body = &after_open[nl + 1..];
            match body.find("```") {
                Some(close) => &body[..close],
                None => body,
            }
        }
        (None, None) => after_open,
    };
    Some(inner.trim().to_string())
}

/// `"\"...\""` → `...`
fn unwrap_json_string(text: &str) -> Option<String> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::String(s) => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Chat and completion envelopes
fn unwrap_envelope(text: &str) -> Option<String> {
    let value: Value = serde_json::from_str(text).ok()?;
    ["/choices/0/message/content", "/choices/0/text", "/response"]
        .iter()
        .find_map(|ptr| value.pointer(ptr))
        .and_then(as_text)
}

/// `{"code": "..."}` → `...`
fn extract_code_field(text: &str) -> Option<String> {
    let value: Value = serde_json::from_str(text).ok()?;
    value.get("code").and_then(as_text)
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Anything still structured after unwrapping is an unrecognized shape
fn finish_code(text: &str) -> String {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(_)) | Ok(Value::Array(_)) => String::new(),
        _ => text.trim().to_string(),
    }
}

fn parse_analysis(text: &str) -> AnalysisResult {
    let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(text) else {
        return AnalysisResult::default();
    };

    let list = |key: &str| {
        obj.get(key)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    };

    AnalysisResult {
        intent: obj
            .get("intent")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        steps: list("steps"),
        assertions: list("assertions"),
        confidence: obj
            .get("confidence")
            .and_then(|c| c.as_f64().or_else(|| c.as_str().and_then(|s| s.parse().ok())))
            .map(|c| c.clamp(0.0, 1.0))
            .unwrap_or(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(body: &str) -> String {
        match normalize(AiRequestKind::Generate, body) {
            AiResponse::Generate { code } => code,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_fenced_code_object() {
        let body = "```json\n{\"code\":\"await page.goto('x')\"}\n```";
        assert_eq!(code(body), "await page.goto('x')");
    }

    #[test]
    fn test_chat_envelope_with_fence() {
        let body = serde_json::json!({
            "choices": [{"message": {"role": "assistant",
                "content": "Here you go:\n```javascript\nawait page.click('#a');\n```\nDone."}}]
        })
        .to_string();
        assert_eq!(code(&body), "await page.click('#a');");
    }

    #[test]
    fn test_chat_envelope_with_bare_fence() {
        let body = serde_json::json!({
            "choices": [{"message": {"content": "```javascript\nawait page.goto('x');\n```"}}]
        })
        .to_string();
        assert_eq!(code(&body), "await page.goto('x');");
    }

    #[test]
    fn test_single_line_fence_keeps_content() {
        assert_eq!(code("```await page.click('#go');```"), "await page.click('#go');");
        assert_eq!(code("Try: ```await x```"), "await x");
    }

    #[test]
    fn test_completion_and_response_envelopes() {
        assert_eq!(code(r#"{"choices":[{"text":"await page.fill('#q', 'x');"}]}"#), "await page.fill('#q', 'x');");
        assert_eq!(code(r#"{"response":"\"await page.goto('y')\""}"#), "await page.goto('y')");
    }

    #[test]
    fn test_plain_code_is_unchanged() {
        let plain = "await page.goto('https://example.com');";
        assert_eq!(code(plain), plain);
        // Idempotent
        assert_eq!(code(&code(plain)), plain);
    }

    #[test]
    fn test_unrecognized_shapes_degrade_to_empty() {
        assert_eq!(code(r#"{"unexpected": true}"#), "");
        assert_eq!(code("[1, 2, 3]"), "");
        assert_eq!(code(""), "");
    }

    #[test]
    fn test_iteration_is_bounded() {
        // Deeply nested JSON strings stop unwrapping after the cap
        let mut body = "x".to_string();
        for _ in 0..(MAX_ITERATIONS + 4) {
            body = serde_json::to_string(&body).unwrap();
        }
        let out = unwrap_text(AiRequestKind::Generate, &body);
        assert_ne!(out, "x");
    }

    #[test]
    fn test_analysis_from_envelope() {
        let inner = r#"{"intent":"log in","steps":[{"action":"fill"}],"confidence":"0.75"}"#;
        let body = serde_json::json!({"choices": [{"message": {"content": format!("```json\n{}\n```", inner)}}]})
            .to_string();
        match normalize(AiRequestKind::Analyze, &body) {
            AiResponse::Analyze(a) => {
                assert_eq!(a.intent, "log in");
                assert_eq!(a.steps.len(), 1);
                assert!(a.assertions.is_empty());
                assert_eq!(a.confidence, 0.75);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_analysis_code_field_is_not_unwrapped() {
        match normalize(AiRequestKind::Analyze, r#"{"intent":"search","code":"x"}"#) {
            AiResponse::Analyze(a) => assert_eq!(a.intent, "search"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            normalize(AiRequestKind::Analyze, "not json"),
            AiResponse::Analyze(AnalysisResult::default())
        );
    }
}
