//! Bot runtime traces and their plain-text rendering
//!
//! The runtime answers an interact call with a list of traces. Only the
//! user-facing kinds are modelled; everything else collapses into
//! [`Trace::Other`] so that a new kind has to be handled explicitly in
//! [`render`] before it can reach a user.

use serde::Deserialize;
use serde_json::Value;

/// A button offered by a choice trace
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Button {
    #[serde(default)]
    pub name: String,
}

/// One item of the runtime's reply
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawTrace")]
pub enum Trace {
    Text { message: String },
    Speak { message: String },
    Choice { buttons: Vec<Button> },
    Other { kind: String },
}

/// Wire shape: `{"type": "...", "payload": {...}}`
#[derive(Deserialize)]
struct RawTrace {
    #[serde(rename = "type", default)]
    kind: Option<Value>,
    #[serde(default)]
    payload: Value,
}

#[derive(Deserialize, Default)]
struct MessagePayload {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChoicePayload {
    #[serde(default)]
    buttons: Vec<Button>,
}

impl From<RawTrace> for Trace {
    fn from(raw: RawTrace) -> Self {
        // A null or non-string type is kept as an unprintable trace
        let kind = match raw.kind {
            Some(Value::String(kind)) => kind,
            _ => String::new(),
        };

        match kind.as_str() {
            "text" | "speak" => {
                let message = serde_json::from_value::<MessagePayload>(raw.payload)
                    .unwrap_or_default()
                    .message
                    .unwrap_or_default();
                if kind == "text" {
                    Trace::Text { message }
                } else {
                    Trace::Speak { message }
                }
            }
            "choice" => {
                let buttons = serde_json::from_value::<ChoicePayload>(raw.payload)
                    .unwrap_or_default()
                    .buttons;
                Trace::Choice { buttons }
            }
            _ => Trace::Other { kind },
        }
    }
}

/// Render traces into a single text blob
///
/// Blocks are separated by a blank line. The result may be empty; see
/// [`render_or_default`].
pub fn render(traces: &[Trace]) -> String {
    let mut blocks: Vec<String> = Vec::new();

    for trace in traces {
        match trace {
            Trace::Text { message } | Trace::Speak { message } => {
                if !message.trim().is_empty() {
                    blocks.push(message.clone());
                }
            }
            Trace::Choice { buttons } => {
                if !buttons.is_empty() {
                    let options = buttons
                        .iter()
                        .enumerate()
                        .map(|(i, button)| format!("{}) {}", i + 1, button.name))
                        .collect::<Vec<_>>()
                        .join("\n");
                    blocks.push(options);
                }
            }
            Trace::Other { .. } => {}
        }
    }

    blocks.join("\n\n")
}

/// Render traces, substituting `default` when nothing printable was produced
pub fn render_or_default(traces: &[Trace], default: &str) -> String {
    let text = render(traces);
    if text.is_empty() {
        default.to_string()
    } else {
        text
    }
}
