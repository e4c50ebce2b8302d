//! Provider-native tool table.
//!
//! Native tools execute inside the provider, so each entry is only a name
//! plus the wire block appended verbatim to the provider request. Lookups
//! are keyed by `(provider, capability)`; unknown combinations are skipped
//! rather than treated as errors.

use {
    serde_json::{Value, json},
    tandem_models::{Capabilities, CapabilityKind, Provider},
};

/// A provider-executed tool enabled by a model capability.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeTool {
    pub name: &'static str,
    /// Provider-specific tool entry, sent as-is in the request tool list.
    pub wire: Value,
}

fn native_tool(provider: Provider, capability: CapabilityKind) -> Option<NativeTool> {
    use {CapabilityKind as C, Provider as P};
    let (name, wire) = match (provider, capability) {
        (P::Anthropic, C::CodeExecution) => (
            "code_execution",
            json!({"type": "code_execution_20250522", "name": "code_execution"}),
        ),
        (P::Anthropic, C::WebSearch) => (
            "web_search",
            json!({"type": "web_search_20250305", "name": "web_search", "max_uses": 5}),
        ),
        (P::Google, C::CodeExecution) => ("code_execution", json!({"codeExecution": {}})),
        (P::Google, C::WebSearch) => ("google_search", json!({"googleSearch": {}})),
        (P::Google, C::UrlContext) => ("url_context", json!({"urlContext": {}})),
        (P::Openai, C::CodeExecution) => ("code_interpreter", json!({"type": "code_interpreter"})),
        (P::Openai, C::WebSearch) => ("web_search", json!({"type": "web_search"})),
        (P::Openai, C::ImageGeneration) => ("image_generation", json!({"type": "image_generation"})),
        _ => return None,
    };
    Some(NativeTool { name, wire })
}

/// Native tools for every capability the descriptor enables, in a fixed
/// capability order so the result is deterministic.
pub fn native_tools_for(provider: Provider, capabilities: &Capabilities) -> Vec<NativeTool> {
    [
        CapabilityKind::CodeExecution,
        CapabilityKind::WebSearch,
        CapabilityKind::UrlContext,
        CapabilityKind::ImageGeneration,
    ]
    .into_iter()
    .filter(|kind| capabilities.is_enabled(*kind))
    .filter_map(|kind| native_tool(provider, kind))
    .collect()
}
