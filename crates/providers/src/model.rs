//! The `LanguageModel` seam: one streaming turn against an upstream model.
//!
//! A handle is created per request from a caller-supplied credential and
//! discarded afterwards; nothing here is pooled across requests.

use {
    async_trait::async_trait,
    futures::stream::BoxStream,
    serde_json::Value,
    tandem_protocol::Usage,
};

use crate::Result;

/// Roles in the turn transcript sent upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

/// One piece of transcript content. Tool calls and results are carried so
/// multi-step turns can replay earlier steps to the provider.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnContent {
    Text(String),
    ToolCall {
        id: String,
        name: String,
        arguments: Value,
    },
    ToolResult {
        id: String,
        name: String,
        output: String,
    },
}

#[derive(Debug, Clone)]
pub struct TurnMessage {
    pub role: TurnRole,
    pub content: Vec<TurnContent>,
}

impl TurnMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: vec![TurnContent::Text(text.into())],
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: vec![TurnContent::Text(text.into())],
        }
    }
}

/// Declaration of a tool the model may invoke: name, description, and a
/// JSON-schema parameter object passed through to the provider.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Everything needed for one streaming model invocation.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub system: String,
    pub messages: Vec<TurnMessage>,
    pub tools: Vec<ToolSpec>,
    /// Provider-native tool entries, appended verbatim to the request's
    /// tool list after the function tools.
    pub native_tools: Vec<Value>,
    /// Provider-specific options (thinking budgets etc.), already shaped
    /// for the target provider by [`crate::options::build_provider_options`].
    pub options: Option<Value>,
    pub max_output_tokens: u32,
}

impl TurnRequest {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            messages: Vec::new(),
            tools: Vec::new(),
            native_tools: Vec::new(),
            options: None,
            max_output_tokens: 4096,
        }
    }
}

/// Incremental events produced by a streaming invocation, in generation
/// order.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    TextDelta(String),
    /// A complete tool invocation (providers buffer argument deltas and
    /// emit once the call is fully formed).
    ToolCall {
        id: String,
        name: String,
        arguments: Value,
    },
    /// Normalized token counts; emitted at most once, at the end.
    Usage(Usage),
    Done,
}

pub type EventStream = BoxStream<'static, Result<ProviderEvent>>;

/// A callable model handle. Stateless; safe to discard after one request.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Provider name, for logging and accounting.
    fn provider(&self) -> &'static str;

    /// Open a streaming invocation. Errors before the first byte surface
    /// here; mid-stream errors surface as `Err` items on the stream.
    async fn stream_turn(&self, request: TurnRequest) -> Result<EventStream>;
}
