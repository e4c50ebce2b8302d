//! Compiled fallback model catalog.
//!
//! These descriptors are the floor: they keep the gateway usable with zero
//! administrative configuration. Dynamic descriptors from the config store
//! override entries here by id.

use crate::{ModelDescriptor, Provider};

pub const DEFAULT_CHAT_MODEL: &str = "claude-3-5-sonnet-20241022";

fn model(
    id: &str,
    name: &str,
    description: &str,
    provider: Provider,
    concrete_model_id: &str,
    context_window: u32,
    supports_vision: bool,
    supports_tools: bool,
) -> ModelDescriptor {
    ModelDescriptor {
        id: id.to_string(),
        name: name.to_string(),
        description: Some(description.to_string()),
        provider,
        concrete_model_id: concrete_model_id.to_string(),
        context_window,
        supports_vision,
        supports_tools,
        capabilities: Default::default(),
        provider_config: Default::default(),
        prompt_overrides: Default::default(),
        pricing: None,
        is_enabled: true,
    }
}

/// The full static catalog, grouped by provider.
pub fn static_models() -> Vec<ModelDescriptor> {
    use Provider::*;
    vec![
        // Anthropic
        model(
            "claude-3-5-sonnet-20241022",
            "Claude 3.5 Sonnet",
            "Most intelligent model with best reasoning, coding, and analysis capabilities",
            Anthropic,
            "claude-3-5-sonnet-20241022",
            200_000,
            true,
            true,
        ),
        model(
            "claude-3-5-haiku-20241022",
            "Claude 3.5 Haiku",
            "Fast and efficient model for everyday tasks",
            Anthropic,
            "claude-3-5-haiku-20241022",
            200_000,
            true,
            true,
        ),
        model(
            "claude-3-opus-20240229",
            "Claude 3 Opus",
            "Previous generation flagship model with powerful capabilities",
            Anthropic,
            "claude-3-opus-20240229",
            200_000,
            true,
            true,
        ),
        // Google
        model(
            "gemini-2.0-flash-exp",
            "Gemini 2.0 Flash",
            "Latest experimental Gemini model with multimodal capabilities",
            Google,
            "gemini-2.0-flash-exp",
            1_000_000,
            true,
            true,
        ),
        model(
            "gemini-1.5-pro",
            "Gemini 1.5 Pro",
            "Powerful model with long context window",
            Google,
            "gemini-1.5-pro-latest",
            2_000_000,
            true,
            true,
        ),
        model(
            "gemini-1.5-flash",
            "Gemini 1.5 Flash",
            "Fast and efficient model for quick responses",
            Google,
            "gemini-1.5-flash-latest",
            1_000_000,
            true,
            true,
        ),
        // OpenAI
        model(
            "gpt-4o",
            "GPT-4o",
            "Most capable GPT model with vision and tool use",
            Openai,
            "gpt-4o",
            128_000,
            true,
            true,
        ),
        model(
            "gpt-4o-mini",
            "GPT-4o Mini",
            "Affordable and efficient model for everyday tasks",
            Openai,
            "gpt-4o-mini",
            128_000,
            true,
            true,
        ),
        model(
            "o1-preview",
            "o1 Preview",
            "Advanced reasoning model (no tools or vision)",
            Openai,
            "o1-preview",
            128_000,
            false,
            false,
        ),
        model(
            "o1-mini",
            "o1 Mini",
            "Efficient reasoning model (no tools or vision)",
            Openai,
            "o1-mini",
            128_000,
            false,
            false,
        ),
    ]
}

/// Look up a static descriptor by logical id.
pub fn static_model(id: &str) -> Option<ModelDescriptor> {
    static_models().into_iter().find(|m| m.id == id)
}
