//! Protocol Frame Parser
//!
//! Each decoded line is expected to be one JSON object. Vendors disagree on
//! where reasoning text lives, so several field names are probed. A line that
//! fails to parse is logged and skipped; it never ends the stream.

use serde_json::Value;

/// Reasoning field names, probed inside `message` first and then at the top level
const REASONING_FIELDS: &[&str] = &["thinking", "reasoning", "reasoning_content"];

/// One parsed protocol frame
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    /// Reasoning text carried in an explicit field
    pub reasoning: Option<String>,
    /// Answer text (`message.content`)
    pub answer: Option<String>,
    /// In-band error reported by the server
    pub error: Option<String>,
    /// Whether this is the final frame
    pub done: bool,
}

impl Frame {
    /// Whether the frame carries any reasoning or answer text
    #[must_use]
    pub fn has_content(&self) -> bool {
        self.reasoning.as_deref().is_some_and(|r| !r.is_empty())
            || self.answer.as_deref().is_some_and(|a| !a.is_empty())
    }
}

/// Parse one line into a frame
///
/// Returns `None` for blank or malformed lines; malformed lines are logged at
/// `warn`. A well-formed object with no recognized fields yields an empty frame.
#[must_use]
pub fn parse_frame(line: &str) -> Option<Frame> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let data: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, line = %truncate_for_log(line), "Skipping malformed frame");
            return None;
        }
    };

    let Some(object) = data.as_object() else {
        tracing::warn!(line = %truncate_for_log(line), "Skipping non-object frame");
        return None;
    };

    let message = object.get("message");

    let reasoning = message
        .and_then(|m| first_string(m, REASONING_FIELDS))
        .or_else(|| first_string(&data, REASONING_FIELDS));

    let answer = message
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .or_else(|| object.get("response").and_then(Value::as_str))
        .map(String::from);

    let error = object.get("error").and_then(|e| match e {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    });

    let done = object.get("done").and_then(Value::as_bool).unwrap_or(false);

    Some(Frame {
        reasoning,
        answer,
        error,
        done,
    })
}

/// First non-empty string among `fields` of `value`
fn first_string(value: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|f| value.get(*f).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(String::from)
}

fn truncate_for_log(line: &str) -> String {
    const MAX: usize = 120;
    if line.chars().count() <= MAX {
        line.to_string()
    } else {
        let head: String = line.chars().take(MAX).collect();
        format!("{head}…")
    }
}
