//! GitHub MCP tool bridge.
//!
//! Loads the GitHub tool catalog over a stdio MCP connection and exposes
//! each foreign tool as a [`ChatTool`]. Live connections are cached per
//! credential prefix so repeated requests from the same caller reuse one
//! subprocess; dead connections are evicted and recreated transparently.

pub mod client;
pub mod error;
pub mod schema;

pub use {
    client::{ForeignTool, McpClient},
    error::{Error, Result},
    schema::convert_schema,
};

use {
    async_trait::async_trait,
    dashmap::DashMap,
    serde_json::{Value, json},
    std::sync::Arc,
    tandem_tools::ChatTool,
    tracing::info,
};

/// Connection cache key length; enough to separate callers without
/// holding whole credentials as map keys.
const CACHE_KEY_CHARS: usize = 10;

fn cache_key(token: &str) -> String {
    token.chars().take(CACHE_KEY_CHARS).collect()
}

/// A bridged GitHub tool backed by a shared MCP connection.
pub struct BridgeTool {
    client: Arc<McpClient>,
    name: String,
    description: String,
    parameters: Value,
}

#[async_trait]
impl ChatTool for BridgeTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.parameters.clone()
    }

    async fn execute(&self, params: Value) -> anyhow::Result<Value> {
        let text = self.client.call_tool(&self.name, params).await?;
        Ok(json!(text))
    }
}

/// Connection cache plus tool-loading entry point.
#[derive(Default)]
pub struct GithubBridge {
    connections: DashMap<String, Arc<McpClient>>,
}

impl GithubBridge {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lists the server's tools as executable [`ChatTool`]s. Reuses a
    /// cached live connection for the same credential prefix.
    pub async fn load_tools(&self, token: &str) -> Result<Vec<Arc<dyn ChatTool>>> {
        let client = self.connection(token).await?;
        let tools = client.list_tools().await?;
        info!(count = tools.len(), "loaded GitHub bridge tools");

        Ok(tools
            .into_iter()
            .map(|tool| {
                let parameters = tool
                    .input_schema
                    .as_ref()
                    .map_or_else(|| json!({"type": "object", "properties": {}}), convert_schema);
                Arc::new(BridgeTool {
                    client: client.clone(),
                    name: tool.name,
                    description: tool.description.unwrap_or_default(),
                    parameters,
                }) as Arc<dyn ChatTool>
            })
            .collect())
    }

    async fn connection(&self, token: &str) -> Result<Arc<McpClient>> {
        let key = cache_key(token);
        if let Some(cached) = self.connections.get(&key) {
            if cached.is_alive() {
                return Ok(cached.clone());
            }
            drop(cached);
            self.connections.remove(&key);
        }

        let client = Arc::new(McpClient::connect(token).await?);
        self.connections.insert(key, client.clone());
        Ok(client)
    }
}
