//! Per-provider invocation options derived from a model descriptor.

use {
    serde_json::{Map, Value, json},
    tandem_models::{CapabilityKind, ModelDescriptor, Provider, ReasoningEffort},
};

const DEFAULT_THINKING_BUDGET: u32 = 10_000;

/// Builds the option object merged into the provider request body.
///
/// Thinking configuration is emitted only when the descriptor enables the
/// capability AND the caller asked for it; descriptor `extra` options are
/// always passed through and win on key conflicts.
pub fn build_provider_options(descriptor: &ModelDescriptor, thinking_requested: bool) -> Option<Value> {
    let mut options = Map::new();

    let thinking = thinking_requested && descriptor.capabilities.is_enabled(CapabilityKind::Thinking);
    let budget = descriptor
        .capabilities
        .thinking_budget()
        .unwrap_or(DEFAULT_THINKING_BUDGET);

    match descriptor.provider {
        Provider::Anthropic => {
            if thinking {
                options.insert(
                    "thinking".into(),
                    json!({"type": "enabled", "budget_tokens": budget}),
                );
            }
        },
        Provider::Google => {
            if thinking {
                options.insert(
                    "thinkingConfig".into(),
                    json!({"thinkingBudget": budget, "includeThoughts": true}),
                );
            }
        },
        Provider::Openai => {
            if let Some(effort) = descriptor.provider_config.reasoning_effort {
                options.insert("reasoning_effort".into(), json!(effort_str(effort)));
            }
        },
    }

    if let Some(Value::Object(extra)) = &descriptor.provider_config.extra {
        for (k, v) in extra {
            options.insert(k.clone(), v.clone());
        }
    }

    if options.is_empty() {
        None
    } else {
        Some(Value::Object(options))
    }
}

fn effort_str(effort: ReasoningEffort) -> &'static str {
    match effort {
        ReasoningEffort::Minimal => "minimal",
        ReasoningEffort::Low => "low",
        ReasoningEffort::Medium => "medium",
        ReasoningEffort::High => "high",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tandem_models::{Capabilities, ProviderConfig, ThinkingCapability, static_model};

    fn descriptor(provider: Provider) -> ModelDescriptor {
        let base = match provider {
            Provider::Anthropic => "claude-3-5-sonnet-20241022",
            Provider::Google => "gemini-2.0-flash-exp",
            Provider::Openai => "gpt-4o",
        };
        static_model(base).unwrap()
    }

    #[test]
    fn anthropic_thinking_uses_descriptor_budget() {
        let mut model = descriptor(Provider::Anthropic);
        model.capabilities = Capabilities {
            thinking: Some(ThinkingCapability {
                enabled: true,
                budget_tokens: Some(4096),
            }),
            ..Capabilities::default()
        };
        let options = build_provider_options(&model, true).unwrap();
        assert_eq!(options["thinking"]["budget_tokens"], 4096);
    }

    #[test]
    fn thinking_omitted_when_not_requested() {
        let mut model = descriptor(Provider::Anthropic);
        model.capabilities.thinking = Some(ThinkingCapability {
            enabled: true,
            budget_tokens: None,
        });
        assert!(build_provider_options(&model, false).is_none());
    }

    #[test]
    fn thinking_omitted_when_capability_disabled() {
        let mut model = descriptor(Provider::Google);
        model.capabilities.thinking = Some(ThinkingCapability {
            enabled: false,
            budget_tokens: Some(1024),
        });
        assert!(build_provider_options(&model, true).is_none());
    }

    #[test]
    fn google_thinking_falls_back_to_default_budget() {
        let mut model = descriptor(Provider::Google);
        model.capabilities.thinking = Some(ThinkingCapability {
            enabled: true,
            budget_tokens: None,
        });
        let options = build_provider_options(&model, true).unwrap();
        assert_eq!(
            options["thinkingConfig"]["thinkingBudget"],
            DEFAULT_THINKING_BUDGET
        );
        assert_eq!(options["thinkingConfig"]["includeThoughts"], true);
    }

    #[test]
    fn openai_reasoning_effort_carries_through() {
        let mut model = descriptor(Provider::Openai);
        model.provider_config = ProviderConfig {
            reasoning_effort: Some(ReasoningEffort::High),
            extra: None,
        };
        let options = build_provider_options(&model, true).unwrap();
        assert_eq!(options["reasoning_effort"], "high");
    }

    #[test]
    fn extra_options_win_on_conflict() {
        let mut model = descriptor(Provider::Openai);
        model.provider_config = ProviderConfig {
            reasoning_effort: Some(ReasoningEffort::Low),
            extra: Some(serde_json::json!({"reasoning_effort": "medium", "seed": 7})),
        };
        let options = build_provider_options(&model, false).unwrap();
        assert_eq!(options["reasoning_effort"], "medium");
        assert_eq!(options["seed"], 7);
    }
}
