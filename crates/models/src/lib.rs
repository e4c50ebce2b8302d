//! Model descriptors and the resolution registry.
//!
//! A logical model id resolves to a [`ModelDescriptor`]: provider, concrete
//! upstream model id, context window, and capability flags. Administrators
//! can override the compiled catalog through a dynamic store; dynamic
//! entries win, and a dynamically disabled model is a hard rejection rather
//! than a fallback to the static table.

pub mod catalog;
pub mod registry;

use serde::{Deserialize, Serialize};

pub use {
    catalog::{DEFAULT_CHAT_MODEL, static_model, static_models},
    registry::{ModelConfigStore, ModelRegistry, ResolveError},
};

// ── Provider ─────────────────────────────────────────────────────────────────

/// Upstream LLM providers this gateway can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    Google,
    Openai,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Google => "google",
            Self::Openai => "openai",
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anthropic" => Ok(Self::Anthropic),
            "google" => Ok(Self::Google),
            "openai" => Ok(Self::Openai),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown provider: {0}")]
pub struct UnknownProvider(pub String);

// ── Capabilities ─────────────────────────────────────────────────────────────

/// A single optional model feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Toggle {
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingCapability {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_tokens: Option<u32>,
}

/// Sparse capability map. Absent entries mean "not supported / not
/// configured", which is distinct from an entry with `enabled: false`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Capabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_execution: Option<Toggle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_search: Option<Toggle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_inputs: Option<Toggle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_generation: Option<Toggle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_context: Option<Toggle>,
}

/// Capability kinds, used as table keys for provider-native tool
/// constructors and prompt fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    Thinking,
    CodeExecution,
    WebSearch,
    FileInputs,
    ImageGeneration,
    UrlContext,
}

impl Capabilities {
    pub fn is_enabled(&self, kind: CapabilityKind) -> bool {
        match kind {
            CapabilityKind::Thinking => self.thinking.is_some_and(|t| t.enabled),
            CapabilityKind::CodeExecution => self.code_execution.is_some_and(|t| t.enabled),
            CapabilityKind::WebSearch => self.web_search.is_some_and(|t| t.enabled),
            CapabilityKind::FileInputs => self.file_inputs.is_some_and(|t| t.enabled),
            CapabilityKind::ImageGeneration => self.image_generation.is_some_and(|t| t.enabled),
            CapabilityKind::UrlContext => self.url_context.is_some_and(|t| t.enabled),
        }
    }

    pub fn thinking_budget(&self) -> Option<u32> {
        self.thinking.filter(|t| t.enabled).and_then(|t| t.budget_tokens)
    }

    /// Enabled capability names in a fixed order (stable for clients and
    /// for deterministic prompt composition).
    pub fn enabled_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        for (kind, name) in [
            (CapabilityKind::Thinking, "thinking"),
            (CapabilityKind::CodeExecution, "codeExecution"),
            (CapabilityKind::WebSearch, "webSearch"),
            (CapabilityKind::FileInputs, "fileInputs"),
            (CapabilityKind::ImageGeneration, "imageGeneration"),
            (CapabilityKind::UrlContext, "urlContext"),
        ] {
            if self.is_enabled(kind) {
                names.push(name);
            }
        }
        names
    }
}

// ── Provider configuration and prompt overrides ──────────────────────────────

/// OpenAI reasoning effort for o-series models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Minimal,
    Low,
    Medium,
    High,
}

/// Provider-specific knobs carried on a descriptor and passed through to
/// the invocation options builder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,
    /// Opaque extra options merged into the provider request as-is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

/// Administrator-supplied prompt fragments overriding the compiled
/// defaults, keyed per capability plus an optional base addendum.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PromptOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_execution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_inputs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_generation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_context: Option<String>,
}

/// Per-million-token pricing used for cost estimation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

// ── Descriptor ───────────────────────────────────────────────────────────────

/// Everything the orchestration core needs to know about one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    /// Logical id clients select by.
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub provider: Provider,
    /// Upstream model id, opaque to the core and passed through verbatim.
    pub concrete_model_id: String,
    pub context_window: u32,
    pub supports_vision: bool,
    pub supports_tools: bool,
    #[serde(default)]
    pub capabilities: Capabilities,
    #[serde(default)]
    pub provider_config: ProviderConfig,
    #[serde(default)]
    pub prompt_overrides: PromptOverrides,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<Pricing>,
    pub is_enabled: bool,
}
