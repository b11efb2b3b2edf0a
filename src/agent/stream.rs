//! Parsing of the agent CLI's `stream-json` output.

use serde::Deserialize;
use serde_json::Value;

use crate::util::truncate_str;

/// Events from the agent CLI's stream-json output format
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "assistant")]
    Assistant {
        message: AssistantMessage,
        #[serde(default)]
        session_id: String,
    },

    #[serde(rename = "user")]
    User {},

    #[serde(rename = "result")]
    Result {
        #[serde(default)]
        subtype: String,
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        is_error: bool,
        #[serde(default)]
        session_id: Option<String>,
    },

    #[serde(rename = "system")]
    System {
        #[serde(default)]
        subtype: String,
    },
}

#[derive(Debug, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "tool_use")]
    ToolUse {
        name: String,
        input: Value,
        #[serde(default)]
        id: String,
    },

    #[serde(rename = "text")]
    Text { text: String },

    #[serde(other)]
    Other,
}

/// Final answer extracted from a finished stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutcome {
    pub result: String,
    pub is_error: bool,
    pub session_id: Option<String>,
}

/// Accumulates stream lines until the terminal `result` event arrives.
#[derive(Debug, Default)]
pub struct StreamCollector {
    text: String,
    session_id: Option<String>,
    outcome: Option<StreamOutcome>,
}

impl StreamCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        match serde_json::from_str::<StreamEvent>(line) {
            Ok(StreamEvent::Assistant {
                message,
                session_id,
            }) => {
                if !session_id.is_empty() {
                    self.session_id = Some(session_id);
                }
                for block in message.content {
                    match block {
                        ContentBlock::ToolUse { name, input, .. } => {
                            tracing::debug!(tool = %name, "{}", describe_tool_use(&name, &input));
                        }
                        ContentBlock::Text { text } => {
                            self.text.push_str(&text);
                            self.text.push('\n');
                        }
                        ContentBlock::Other => {}
                    }
                }
            }
            Ok(StreamEvent::Result {
                result,
                is_error,
                session_id,
                ..
            }) => {
                let session_id = session_id.or_else(|| self.session_id.clone());
                self.outcome = Some(StreamOutcome {
                    result: result.unwrap_or_default(),
                    is_error,
                    session_id,
                });
            }
            Ok(StreamEvent::User { .. }) | Ok(StreamEvent::System { .. }) => {}
            Err(_) => {
                // Not a stream event; keep it as plain text.
                self.text.push_str(line);
                self.text.push('\n');
            }
        }
    }

    /// The terminal result, if the stream produced one.
    pub fn finish(self) -> Option<StreamOutcome> {
        self.outcome
    }

    /// Everything printed before the result, for error reporting.
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Extract a human-readable description from a tool use event
pub fn describe_tool_use(name: &str, input: &Value) -> String {
    let field = |key: &str| input.get(key).and_then(|v| v.as_str());
    let path = || {
        field("file_path")
            .map(shorten_path)
            .unwrap_or_else(|| "file".to_string())
    };
    match name {
        "Read" => format!("Reading: {}", path()),
        "Write" => format!("Creating: {}", path()),
        "Edit" => format!("Editing: {}", path()),
        "Bash" => {
            let cmd = field("command")
                .map(|s| truncate_str(s, 40))
                .unwrap_or_else(|| "command".to_string());
            format!("Running: {}", cmd)
        }
        "Glob" | "Grep" => {
            let pattern = field("pattern")
                .map(|s| truncate_str(s, 30))
                .unwrap_or_else(|| "*".to_string());
            format!("Searching: {}", pattern)
        }
        _ => name.to_string(),
    }
}

/// Shorten a file path to just the last 2 components
fn shorten_path(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() <= 2 {
        path.to_string()
    } else {
        parts[parts.len() - 2..].join("/")
    }
}
