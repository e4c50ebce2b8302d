//! Chat wire protocol definitions shared by the gateway and its clients.
//!
//! A chat turn is delivered as a server-sent event stream of typed frames:
//! - `text-delta`  — incremental assistant text, in generation order
//! - `tool-call`   — the model invoked a tool
//! - `tool-result` — the tool's (normalized) output
//! - `data-usage`  — one terminal usage frame with normalized token counts
//! - `error`       — terminal in-stream failure after headers committed
//! - `finish`      — clean end of turn

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

// ── Constants ────────────────────────────────────────────────────────────────

/// Maximum model/tool round-trips per user turn.
pub const MAX_STEPS_PER_TURN: usize = 5;
/// Character budget for generated conversation titles.
pub const TITLE_MAX_CHARS: usize = 50;
/// Words taken from the first user message when deriving a title.
pub const TITLE_MAX_WORDS: usize = 10;

// ── Error codes ──────────────────────────────────────────────────────────────

pub mod error_codes {
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const FORBIDDEN: &str = "FORBIDDEN";
    pub const MODEL_NOT_FOUND: &str = "MODEL_NOT_FOUND";
    pub const MODEL_DISABLED: &str = "MODEL_DISABLED";
    pub const INVALID_CREDENTIAL: &str = "INVALID_CREDENTIAL";
    pub const RATE_LIMITED: &str = "RATE_LIMITED";
    pub const UPSTREAM_ERROR: &str = "UPSTREAM_ERROR";
    pub const BILLING_REQUIRED: &str = "BILLING_REQUIRED";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
}

// ── Error shape ──────────────────────────────────────────────────────────────

/// Error payload returned on pre-stream rejections and carried by in-stream
/// `error` frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorShape {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorShape {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }
}

// ── Chat request ─────────────────────────────────────────────────────────────

/// Who can see a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

/// One part of a message body. Text is the common case; tool parts record
/// what the assistant did during an agentic turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum MessagePart {
    Text { text: String },
    ToolCall { tool_name: String, arguments: serde_json::Value },
    ToolResult { tool_name: String, output: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

/// Inbound message as sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMessage {
    pub id: uuid::Uuid,
    pub parts: Vec<MessagePart>,
    #[serde(default)]
    pub attachments: Vec<serde_json::Value>,
}

impl IncomingMessage {
    /// Concatenated text content of all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Conversation id; created on first use.
    pub id: uuid::Uuid,
    pub message: IncomingMessage,
    pub selected_model_id: String,
    #[serde(default)]
    pub visibility: Visibility,
    /// Caller-owned provider API key (BYOK).
    pub api_key: String,
    /// Optional GitHub token enabling the MCP tool bridge.
    #[serde(default)]
    pub github_token: Option<String>,
}

// ── Geographic request hints ─────────────────────────────────────────────────

/// Best-effort geographic signals extracted from the request, rendered into
/// the system prompt. Unknown fields render as literal `unknown` so the
/// prompt structure stays byte-stable for prompt caching.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestHints {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub city: Option<String>,
    pub country: Option<String>,
}

// ── Usage ────────────────────────────────────────────────────────────────────

/// Normalized token counts for one completed model invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

// ── Stream events ────────────────────────────────────────────────────────────

/// Typed frames emitted on the chat SSE stream, in generation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum StreamEvent {
    TextDelta { delta: String },
    ToolCall { tool_name: String, arguments: serde_json::Value },
    ToolResult { tool_name: String, output: String },
    DataUsage { usage: Usage },
    Error { error: ErrorShape },
    Finish,
}

impl StreamEvent {
    /// Render as one SSE frame (`data: <json>\n\n`).
    pub fn to_sse(&self) -> String {
        // StreamEvent serialization cannot fail: no maps with non-string
        // keys, no non-finite floats.
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".into());
        format!("data: {json}\n\n")
    }
}

// ── Client-safe model shape ──────────────────────────────────────────────────

/// Model descriptor as exposed by `GET /models/enabled` — no administrative
/// fields, no pricing internals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicModel {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub provider: String,
    pub context_window: u32,
    pub supports_vision: bool,
    pub supports_tools: bool,
    /// Names of enabled capabilities (e.g. `thinking`, `webSearch`).
    pub capabilities: Vec<String>,
}

// ── Agents ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Active,
    ComingSoon,
}

/// Administrator-managed agent configuration, read on every chat request.
/// An empty `enabled_tools` list means no tool restriction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDescriptor {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model_id: Option<String>,
    #[serde(default)]
    pub enabled_tools: Vec<String>,
    #[serde(default)]
    pub status: AgentStatus,
}

impl AgentDescriptor {
    pub fn unrestricted(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            system_prompt: None,
            default_model_id: None,
            enabled_tools: Vec::new(),
            status: AgentStatus::Active,
        }
    }
}

// ── Persisted message shape ──────────────────────────────────────────────────

/// A message as stored and as returned by history reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: uuid::Uuid,
    pub conversation_id: uuid::Uuid,
    pub role: Role,
    pub parts: Vec<MessagePart>,
    pub attachments: Vec<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_parses_camel_case() {
        let json = r#"{
            "id": "7b7a6d2a-2f43-4dd1-96d4-cf44a2d0a1f0",
            "message": {
                "id": "5cf7b8a3-51d2-4d7c-8f61-0a4c0c67e9aa",
                "parts": [{"type": "text", "text": "hello"}]
            },
            "selectedModelId": "claude-3-5-sonnet-20241022",
            "visibility": "private",
            "apiKey": "sk-ant-test"
        }"#;
        let req: ChatRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.selected_model_id, "claude-3-5-sonnet-20241022");
        assert_eq!(req.message.text(), "hello");
        assert!(req.github_token.is_none());
    }

    #[test]
    fn chat_request_rejects_missing_api_key() {
        let json = r#"{
            "id": "7b7a6d2a-2f43-4dd1-96d4-cf44a2d0a1f0",
            "message": {"id": "5cf7b8a3-51d2-4d7c-8f61-0a4c0c67e9aa", "parts": []},
            "selectedModelId": "gpt-4o"
        }"#;
        assert!(serde_json::from_str::<ChatRequest>(json).is_err());
    }

    #[test]
    fn stream_event_sse_framing() {
        let frame = StreamEvent::TextDelta {
            delta: "hi".into(),
        }
        .to_sse();
        assert!(frame.starts_with("data: "));
        assert!(frame.ends_with("\n\n"));
        assert!(frame.contains(r#""type":"text-delta""#));
    }

    #[test]
    fn finish_event_serializes_with_tag_only() {
        let json = serde_json::to_string(&StreamEvent::Finish).unwrap();
        assert_eq!(json, r#"{"type":"finish"}"#);
    }

    #[test]
    fn error_events_compare_by_shape() {
        let a = StreamEvent::Error {
            error: ErrorShape::new(error_codes::UPSTREAM_ERROR, "overloaded"),
        };
        let b = StreamEvent::Error {
            error: ErrorShape::new(error_codes::UPSTREAM_ERROR, "overloaded"),
        };
        assert_eq!(a, b);
        assert_ne!(a, StreamEvent::Finish);
    }

    #[test]
    fn usage_totals_are_derived() {
        let usage = Usage::new(120, 340);
        assert_eq!(usage.total_tokens, 460);
    }

    #[test]
    fn message_part_round_trips() {
        let part = MessagePart::ToolCall {
            tool_name: "getWeather".into(),
            arguments: serde_json::json!({"city": "Lisbon"}),
        };
        let json = serde_json::to_string(&part).unwrap();
        assert!(json.contains(r#""type":"tool-call""#));
        let back: MessagePart = serde_json::from_str(&json).unwrap();
        assert_eq!(part, back);
    }

    #[test]
    fn visibility_defaults_to_private() {
        assert_eq!(Visibility::default(), Visibility::Private);
    }
}
