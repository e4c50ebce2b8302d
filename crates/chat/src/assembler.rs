//! Per-request tool assembly.
//!
//! Merges three independent sources (compiled-in base tools, GitHub bridge
//! tools, provider-native tools) into one named map and computes the active
//! subset for this agent/model combination. Assembly is a pure function of
//! its inputs; nothing is cached across requests.

use {
    async_trait::async_trait,
    serde_json::Value,
    std::{collections::BTreeMap, sync::Arc},
    tandem_models::ModelDescriptor,
    tandem_protocol::AgentDescriptor,
    tandem_providers::ToolSpec,
    tandem_tools::{ChatTool, NativeTool, ToolDescriptor, native_tools_for, tool_permitted},
    tracing::warn,
};

/// Bridge tool source. Failure degrades to an empty bridge map.
#[async_trait]
pub trait BridgeLoader: Send + Sync {
    async fn load_tools(&self, token: &str) -> anyhow::Result<Vec<Arc<dyn ChatTool>>>;
}

#[async_trait]
impl BridgeLoader for tandem_bridge::GithubBridge {
    async fn load_tools(&self, token: &str) -> anyhow::Result<Vec<Arc<dyn ChatTool>>> {
        Ok(tandem_bridge::GithubBridge::load_tools(self, token).await?)
    }
}

#[derive(Clone)]
pub enum ToolEntry {
    /// Executed in-process during the agentic loop.
    Local(Arc<dyn ChatTool>),
    /// Executed inside the provider; only its wire block is sent.
    Native(NativeTool),
}

/// Request-scoped result of assembly. `active` never contains a name
/// absent from `entries`.
#[derive(Default)]
pub struct ActiveToolSet {
    pub entries: BTreeMap<String, ToolEntry>,
    pub active: Vec<String>,
}

impl ActiveToolSet {
    pub fn local(&self, name: &str) -> Option<Arc<dyn ChatTool>> {
        match self.entries.get(name) {
            Some(ToolEntry::Local(tool)) => Some(tool.clone()),
            _ => None,
        }
    }

    /// Function-tool declarations for the active local tools, in active
    /// order.
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        self.active
            .iter()
            .filter_map(|name| self.local(name))
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }

    /// Wire blocks for the active provider-native tools.
    pub fn native_wire(&self) -> Vec<Value> {
        self.active
            .iter()
            .filter_map(|name| match self.entries.get(name) {
                Some(ToolEntry::Native(native)) => Some(native.wire.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Builds the merged tool map and the active name list.
///
/// Merge precedence on name collision: provider-native over bridge over
/// base. Provider-native names bypass the agent's allow-list; the final
/// list is filtered against the merged map so a dangling name can never
/// escape, whatever the configuration says.
pub async fn assemble(
    agent: &AgentDescriptor,
    descriptor: &ModelDescriptor,
    tool_configs: &[ToolDescriptor],
    base: Vec<Arc<dyn ChatTool>>,
    bridge: Option<(&dyn BridgeLoader, &str)>,
) -> ActiveToolSet {
    let mut entries: BTreeMap<String, ToolEntry> = BTreeMap::new();

    for tool in base {
        if tool_permitted(tool_configs, tool.name()) {
            entries.insert(tool.name().to_string(), ToolEntry::Local(tool));
        }
    }

    if descriptor.supports_tools
        && let Some((loader, token)) = bridge
    {
        match loader.load_tools(token).await {
            Ok(tools) => {
                for tool in tools {
                    if tool_permitted(tool_configs, tool.name()) {
                        entries.insert(tool.name().to_string(), ToolEntry::Local(tool));
                    }
                }
            },
            Err(err) => warn!(%err, "bridge tool load failed, continuing without it"),
        }
    }

    let natives = native_tools_for(descriptor.provider, &descriptor.capabilities);
    let mut native_names = Vec::new();
    for native in natives {
        if tool_permitted(tool_configs, native.name) {
            native_names.push(native.name.to_string());
            entries.insert(native.name.to_string(), ToolEntry::Native(native));
        }
    }

    let active = if !descriptor.supports_tools {
        Vec::new()
    } else if agent.enabled_tools.is_empty() {
        entries.keys().cloned().collect()
    } else {
        let mut names: Vec<String> = agent
            .enabled_tools
            .iter()
            .filter(|name| entries.contains_key(*name))
            .cloned()
            .collect();
        for name in native_names {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    };

    // The active list must never contain a name absent from the map.
    let active = active
        .into_iter()
        .filter(|name| entries.contains_key(name))
        .collect();

    ActiveToolSet { entries, active }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {
        super::*,
        serde_json::json,
        tandem_models::{Capabilities, Toggle, static_model},
    };

    struct FakeTool(&'static str);

    #[async_trait]
    impl ChatTool for FakeTool {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "fake"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, _params: Value) -> anyhow::Result<Value> {
            Ok(json!("ok"))
        }
    }

    struct FailingBridge;

    #[async_trait]
    impl BridgeLoader for FailingBridge {
        async fn load_tools(&self, _token: &str) -> anyhow::Result<Vec<Arc<dyn ChatTool>>> {
            anyhow::bail!("subprocess unavailable")
        }
    }

    struct FixedBridge(Vec<&'static str>);

    #[async_trait]
    impl BridgeLoader for FixedBridge {
        async fn load_tools(&self, _token: &str) -> anyhow::Result<Vec<Arc<dyn ChatTool>>> {
            Ok(self
                .0
                .iter()
                .map(|name| Arc::new(FakeTool(name)) as Arc<dyn ChatTool>)
                .collect())
        }
    }

    fn base() -> Vec<Arc<dyn ChatTool>> {
        vec![
            Arc::new(FakeTool("getWeather")),
            Arc::new(FakeTool("createDocument")),
        ]
    }

    fn model(id: &str) -> ModelDescriptor {
        static_model(id).unwrap()
    }

    #[tokio::test]
    async fn unrestricted_agent_activates_every_merged_key() {
        let set = assemble(
            &AgentDescriptor::unrestricted("default"),
            &model("claude-3-5-sonnet-20241022"),
            &[],
            base(),
            None,
        )
        .await;
        assert_eq!(set.active, vec!["createDocument", "getWeather"]);
        assert_eq!(set.tool_specs().len(), 2);
    }

    #[tokio::test]
    async fn globally_disabled_tool_beats_agent_enable() {
        // Scenario: agent allows exactly one tool and that tool is
        // globally disabled.
        let mut agent = AgentDescriptor::unrestricted("writer");
        agent.enabled_tools = vec!["createDocument".into()];
        let mut disabled = ToolDescriptor::enabled("createDocument");
        disabled.is_enabled = false;

        let set = assemble(
            &agent,
            &model("claude-3-5-sonnet-20241022"),
            &[disabled],
            base(),
            None,
        )
        .await;
        assert!(set.active.is_empty());
    }

    #[tokio::test]
    async fn bridge_failure_degrades_to_base_tools() {
        let set = assemble(
            &AgentDescriptor::unrestricted("default"),
            &model("claude-3-5-sonnet-20241022"),
            &[],
            base(),
            Some((&FailingBridge, "ghp_token")),
        )
        .await;
        assert_eq!(set.active.len(), 2);
    }

    #[tokio::test]
    async fn native_tools_bypass_agent_allow_list() {
        let mut agent = AgentDescriptor::unrestricted("narrow");
        agent.enabled_tools = vec!["getWeather".into()];
        let mut descriptor = model("gemini-2.0-flash-exp");
        descriptor.capabilities = Capabilities {
            web_search: Some(Toggle { enabled: true }),
            ..Capabilities::default()
        };

        let set = assemble(&agent, &descriptor, &[], base(), None).await;
        assert_eq!(set.active, vec!["getWeather", "google_search"]);
        assert_eq!(set.native_wire(), vec![json!({"googleSearch": {}})]);
    }

    #[tokio::test]
    async fn native_wins_name_collision_with_bridge() {
        let mut descriptor = model("claude-3-5-sonnet-20241022");
        descriptor.capabilities = Capabilities {
            web_search: Some(Toggle { enabled: true }),
            ..Capabilities::default()
        };
        let bridge = FixedBridge(vec!["web_search", "list_issues"]);

        let set = assemble(
            &AgentDescriptor::unrestricted("default"),
            &descriptor,
            &[],
            base(),
            Some((&bridge, "ghp_token")),
        )
        .await;
        assert!(matches!(set.entries.get("web_search"), Some(ToolEntry::Native(_))));
        assert!(set.local("list_issues").is_some());
    }

    #[tokio::test]
    async fn model_without_tool_support_gets_empty_active_list() {
        let set = assemble(
            &AgentDescriptor::unrestricted("default"),
            &model("o1-mini"),
            &[],
            base(),
            None,
        )
        .await;
        assert!(set.active.is_empty());
    }

    #[tokio::test]
    async fn dangling_agent_names_are_filtered() {
        let mut agent = AgentDescriptor::unrestricted("stale");
        agent.enabled_tools = vec!["getWeather".into(), "removedTool".into()];

        let set = assemble(
            &agent,
            &model("claude-3-5-sonnet-20241022"),
            &[],
            base(),
            None,
        )
        .await;
        assert_eq!(set.active, vec!["getWeather"]);
        for name in &set.active {
            assert!(set.entries.contains_key(name));
        }
    }
}
