//! Built-in chat tools, the tool policy overlay, and the provider-native
//! tool table.
//!
//! Tools implement [`ChatTool`] and are assembled into a per-request set by
//! the chat core; nothing here is a process-wide registry.

pub mod descriptor;
pub mod documents;
pub mod error;
pub mod native;
pub mod params;
pub mod weather;

pub use {
    descriptor::{ToolDescriptor, ToolPrompts, tool_permitted},
    documents::{
        CreateDocumentTool, Document, DocumentKind, DocumentStore, RequestSuggestionsTool,
        UpdateDocumentTool,
    },
    error::{Error, Result},
    native::{NativeTool, native_tools_for},
    weather::GetWeatherTool,
};

use {async_trait::async_trait, serde_json::Value, std::sync::Arc};

/// A locally executed tool the model can invoke during a turn.
#[async_trait]
pub trait ChatTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON schema for the tool's argument object.
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, params: Value) -> anyhow::Result<Value>;
}

static SHARED_CLIENT: std::sync::OnceLock<reqwest::Client> = std::sync::OnceLock::new();

/// Shared HTTP client for tools that don't need custom configuration.
/// Reuses one connection pool and TLS session cache across requests.
pub fn shared_http_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(reqwest::Client::new)
}

/// The compiled-in base tools for one request, filtered by the descriptor
/// overlay. Tools without a descriptor are included.
pub fn base_tools(
    store: Arc<dyn DocumentStore>,
    owner_id: &str,
    descriptors: &[ToolDescriptor],
) -> Vec<Arc<dyn ChatTool>> {
    let all: Vec<Arc<dyn ChatTool>> = vec![
        Arc::new(GetWeatherTool::new()),
        Arc::new(CreateDocumentTool::new(store.clone(), owner_id)),
        Arc::new(UpdateDocumentTool::new(store.clone())),
        Arc::new(RequestSuggestionsTool::new(store)),
    ];
    all.into_iter()
        .filter(|tool| tool_permitted(descriptors, tool.name()))
        .collect()
}
