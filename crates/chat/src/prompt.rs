//! System prompt composition.
//!
//! Layers, each separated by a blank line and omitted when empty:
//! agent prompt → request-hints block → model base addendum → capability
//! fragments → per-active-tool fragments. The output is deterministic for
//! identical inputs; downstream prompt caching keys on content.

use {
    tandem_models::{CapabilityKind, ModelDescriptor},
    tandem_protocol::{AgentDescriptor, RequestHints},
    tandem_tools::ToolDescriptor,
};

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a friendly assistant! Keep your responses concise and helpful.";

const THINKING_PROMPT: &str = "\
## Extended Thinking

You have an internal thinking process for reasoning through complex \
problems before responding. Use it for multi-step logic, planning, and \
analysis; skip it for straightforward questions. Complete your reasoning \
before calling tools or answering.";

const CODE_EXECUTION_PROMPT: &str = "\
## Code Execution

You can generate and execute Python code to perform calculations and \
analysis. Code actually runs; prefer execution over manual math for \
complex operations, and show both the code and its output.";

const WEB_SEARCH_PROMPT: &str = "\
## Web Search

You have access to web search for current, real-time information. Search \
proactively when users ask about recent events or facts that need \
verification, and always attribute information to its sources.";

const FILE_INPUTS_PROMPT: &str = "\
## File Processing

You can analyze uploaded files, including images, PDFs, and other \
documents. Extract the relevant information, cite specific parts when \
answering questions, and keep file contents in mind for the rest of the \
conversation.";

const IMAGE_GENERATION_PROMPT: &str = "\
## Image Generation

You can generate images from textual descriptions. When a user asks for \
an image, produce it directly instead of describing what it would look \
like.";

const URL_CONTEXT_PROMPT: &str = "\
## URL Context Analysis

You can read and analyze content directly from URLs the user provides. \
Process every provided URL, extract the key information, and indicate \
which URL supplied which facts.";

fn unknown_or<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "unknown".to_string(), |v| v.to_string())
}

/// Geographic block, always present with a stable shape; absent values
/// render as the literal `unknown`.
fn hints_block(hints: &RequestHints) -> String {
    format!(
        "About the origin of user's request:\n- lat: {}\n- lon: {}\n- city: {}\n- country: {}",
        unknown_or(hints.latitude),
        unknown_or(hints.longitude),
        unknown_or(hints.city.clone()),
        unknown_or(hints.country.clone()),
    )
}

fn default_fragment(kind: CapabilityKind) -> &'static str {
    match kind {
        CapabilityKind::Thinking => THINKING_PROMPT,
        CapabilityKind::CodeExecution => CODE_EXECUTION_PROMPT,
        CapabilityKind::WebSearch => WEB_SEARCH_PROMPT,
        CapabilityKind::FileInputs => FILE_INPUTS_PROMPT,
        CapabilityKind::ImageGeneration => IMAGE_GENERATION_PROMPT,
        CapabilityKind::UrlContext => URL_CONTEXT_PROMPT,
    }
}

fn override_fragment(descriptor: &ModelDescriptor, kind: CapabilityKind) -> Option<&str> {
    let overrides = &descriptor.prompt_overrides;
    match kind {
        CapabilityKind::Thinking => overrides.thinking.as_deref(),
        CapabilityKind::CodeExecution => overrides.code_execution.as_deref(),
        CapabilityKind::WebSearch => overrides.web_search.as_deref(),
        CapabilityKind::FileInputs => overrides.file_inputs.as_deref(),
        CapabilityKind::ImageGeneration => overrides.image_generation.as_deref(),
        CapabilityKind::UrlContext => overrides.url_context.as_deref(),
    }
}

const CAPABILITY_ORDER: [CapabilityKind; 6] = [
    CapabilityKind::Thinking,
    CapabilityKind::CodeExecution,
    CapabilityKind::WebSearch,
    CapabilityKind::FileInputs,
    CapabilityKind::ImageGeneration,
    CapabilityKind::UrlContext,
];

/// Builds the complete system prompt for one request.
pub fn compose(
    agent: &AgentDescriptor,
    descriptor: &ModelDescriptor,
    hints: &RequestHints,
    tool_configs: &[ToolDescriptor],
    active_names: &[String],
    thinking_preference: bool,
) -> String {
    let mut layers: Vec<String> = Vec::new();

    layers.push(
        agent
            .system_prompt
            .clone()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
    );

    layers.push(hints_block(hints));

    if let Some(base) = descriptor
        .prompt_overrides
        .base
        .as_deref()
        .filter(|p| !p.trim().is_empty())
    {
        layers.push(base.to_string());
    }

    for kind in CAPABILITY_ORDER {
        if !descriptor.capabilities.is_enabled(kind) {
            continue;
        }
        // Both the capability flag and the user preference gate thinking.
        if kind == CapabilityKind::Thinking && !thinking_preference {
            continue;
        }
        let fragment = override_fragment(descriptor, kind).unwrap_or_else(|| default_fragment(kind));
        if !fragment.trim().is_empty() {
            layers.push(fragment.to_string());
        }
    }

    for name in active_names {
        let fragment = tool_configs
            .iter()
            .find(|config| &config.id == name)
            .and_then(|config| config.tool_prompts.as_ref())
            .and_then(tandem_tools::ToolPrompts::fragment);
        if let Some(fragment) = fragment {
            layers.push(fragment);
        }
    }

    layers.join("\n\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {
        super::*,
        tandem_models::{Capabilities, ThinkingCapability, static_model},
        tandem_tools::ToolPrompts,
    };

    fn model_with_thinking(enabled: bool) -> ModelDescriptor {
        let mut descriptor = static_model("claude-3-5-sonnet-20241022").unwrap();
        descriptor.capabilities = Capabilities {
            thinking: Some(ThinkingCapability {
                enabled,
                budget_tokens: None,
            }),
            ..Capabilities::default()
        };
        descriptor
    }

    #[test]
    fn composition_is_deterministic() {
        let agent = AgentDescriptor::unrestricted("default");
        let descriptor = model_with_thinking(true);
        let hints = RequestHints {
            city: Some("Lisbon".into()),
            ..RequestHints::default()
        };
        let active = vec!["getWeather".to_string()];

        let first = compose(&agent, &descriptor, &hints, &[], &active, true);
        let second = compose(&agent, &descriptor, &hints, &[], &active, true);
        assert_eq!(first, second);
    }

    #[test]
    fn hints_block_is_stable_with_unknown_values() {
        let prompt = compose(
            &AgentDescriptor::unrestricted("default"),
            &model_with_thinking(false),
            &RequestHints::default(),
            &[],
            &[],
            false,
        );
        assert!(prompt.contains("- lat: unknown"));
        assert!(prompt.contains("- country: unknown"));
        assert!(prompt.starts_with(DEFAULT_SYSTEM_PROMPT));
    }

    #[test]
    fn thinking_fragment_needs_capability_and_preference() {
        let agent = AgentDescriptor::unrestricted("default");
        let hints = RequestHints::default();

        let both = compose(&agent, &model_with_thinking(true), &hints, &[], &[], true);
        assert!(both.contains("Extended Thinking"));

        let no_pref = compose(&agent, &model_with_thinking(true), &hints, &[], &[], false);
        assert!(!no_pref.contains("Extended Thinking"));

        let no_cap = compose(&agent, &model_with_thinking(false), &hints, &[], &[], true);
        assert!(!no_cap.contains("Extended Thinking"));
    }

    #[test]
    fn capability_override_beats_default() {
        let mut descriptor = model_with_thinking(true);
        descriptor.prompt_overrides.thinking = Some("Custom reasoning guidance.".into());
        let prompt = compose(
            &AgentDescriptor::unrestricted("default"),
            &descriptor,
            &RequestHints::default(),
            &[],
            &[],
            true,
        );
        assert!(prompt.contains("Custom reasoning guidance."));
        assert!(!prompt.contains("Extended Thinking"));
    }

    #[test]
    fn active_tool_fragments_follow_capabilities() {
        let mut config = ToolDescriptor::enabled("getWeather");
        config.tool_prompts = Some(ToolPrompts {
            description: Some("Fetches current weather.".into()),
            usage_guidelines: Some("Call it with latitude and longitude.".into()),
            examples: None,
        });

        let prompt = compose(
            &AgentDescriptor::unrestricted("default"),
            &model_with_thinking(false),
            &RequestHints::default(),
            &[config],
            &["getWeather".to_string()],
            false,
        );
        assert!(prompt.ends_with("Fetches current weather.\nCall it with latitude and longitude."));
    }

    #[test]
    fn agent_prompt_replaces_default() {
        let mut agent = AgentDescriptor::unrestricted("pirate");
        agent.system_prompt = Some("Answer as a pirate.".into());
        let prompt = compose(
            &agent,
            &model_with_thinking(false),
            &RequestHints::default(),
            &[],
            &[],
            false,
        );
        assert!(prompt.starts_with("Answer as a pirate."));
        assert!(!prompt.contains(DEFAULT_SYSTEM_PROMPT));
    }
}
