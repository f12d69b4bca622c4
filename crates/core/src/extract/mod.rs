//! Turning loosely structured stage output into typed records.
//!
//! Stage agents are asked for JSON but routinely return it wrapped in
//! Markdown fences, surrounded by prose, or slightly malformed. Extraction
//! tries progressively looser strategies and never fails: when nothing can
//! be recovered it returns an empty map and the typed views fall back to
//! safe defaults.

mod repair;

use serde_json::{Map, Value};
use vf_protocol::assessment_models::{Action, RiskLevel, Urgency};

/// Upper bound, in characters, of output quoted in extraction warnings.
const PREVIEW_CHARS: usize = 100;

/// Decision note used when the stage does not provide one.
pub const DEFAULT_NOTE: &str = "No specific note provided.";

/// Extract a JSON object from a stage result.
///
/// Objects are returned unchanged, so `extract` is idempotent on its own
/// output. Strings go through [`extract_text`]. Anything else yields an
/// empty map.
pub fn extract(value: &Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.clone(),
        Value::String(text) => extract_text(text),
        other => {
            tracing::warn!(
                "Stage output is not an object: {}",
                preview(&other.to_string())
            );
            Map::new()
        }
    }
}

/// Extract a JSON object from raw stage text.
///
/// Strategies, first success wins:
/// 1. strip a Markdown code fence
/// 2. strict parse
/// 3. tolerant repair parse
/// 4. the span from the first `{` to the last `}`, strict then repaired
/// 5. an empty map
pub fn extract_text(raw: &str) -> Map<String, Value> {
    let body = strip_fence(raw).trim();

    if body.is_empty() {
        tracing::warn!("Stage output is empty: {:?}", preview(raw));
        return Map::new();
    }

    if let Some(map) = parse_object(body) {
        return map;
    }

    for candidate in [body, raw] {
        if let Some(span) = brace_span(candidate) {
            if let Some(map) = parse_object(span) {
                return map;
            }
        }
    }

    tracing::warn!(
        "Failed to extract structured data from stage output: {}",
        preview(raw)
    );
    Map::new()
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
        return Some(map);
    }

    match repair::parse(text) {
        Some(Value::Object(map)) => {
            tracing::debug!("Recovered stage output with tolerant parse");
            Some(map)
        }
        _ => None,
    }
}

/// Content of the first fenced block, preferring a `json` fence.
///
/// An unclosed fence extends to the end of the text.
fn strip_fence(text: &str) -> &str {
    let start = match text.find("```json") {
        Some(pos) => pos,
        None => match text.find("```") {
            Some(pos) => pos,
            None => return text,
        },
    };

    // Skip the fence marker and its language tag
    let after_marker = &text[start + 3..];
    let content = match after_marker.find('\n') {
        Some(newline) => &after_marker[newline + 1..],
        None => after_marker.trim_start_matches(|c: char| c.is_alphanumeric()),
    };

    match content.find("```") {
        Some(end) => &content[..end],
        None => content,
    }
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// First `PREVIEW_CHARS` characters of `text`, marked when truncated.
pub fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Coerce a score to 0..=100.
///
/// Integers, floats and numeric strings are accepted and clamped;
/// anything else is 0.
pub fn coerce_score(value: Option<&Value>) -> u8 {
    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match number {
        Some(n) if n.is_finite() => n.trunc().clamp(0.0, 100.0) as u8,
        _ => 0,
    }
}

fn text_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

/// Typed view of the risk assessment stage output.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskView {
    pub risk_level: RiskLevel,
    pub risk_score: u8,
    /// The full extracted object, kept as the assessment's reasoning.
    pub justification: Value,
    pub requires_immediate_action: bool,
}

impl RiskView {
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let risk_level = text_field(map, "risk_level")
            .map(RiskLevel::parse)
            .unwrap_or(RiskLevel::Unknown);

        let requires_immediate_action = match map.get("requires_immediate_action") {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        };

        Self {
            risk_level,
            risk_score: coerce_score(map.get("risk_score")),
            justification: Value::Object(map.clone()),
            requires_immediate_action,
        }
    }
}

/// Typed view of the decision stage output.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionView {
    pub action: Action,
    pub urgency: Urgency,
    pub note: String,
}

impl DecisionView {
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let note = text_field(map, "doctor_note")
            .or_else(|| text_field(map, "note"))
            .map(str::trim)
            .filter(|note| !note.is_empty())
            .unwrap_or(DEFAULT_NOTE);

        Self {
            action: text_field(map, "action").map(Action::parse).unwrap_or(Action::Monitor),
            urgency: text_field(map, "urgency").map(Urgency::parse).unwrap_or(Urgency::Normal),
            note: note.to_string(),
        }
    }
}
