//! Streaming language-model clients for the supported providers.
//!
//! Each provider implements [`LanguageModel`] over its native streaming
//! API; [`create_model`] is the single construction point and performs
//! structural credential checks before any network call.

pub mod anthropic;
pub mod error;
pub mod google;
pub mod model;
pub mod openai;
pub mod options;
pub mod sse;

pub use {
    anthropic::AnthropicModel,
    error::{Error, Result},
    google::GoogleModel,
    model::{
        EventStream, LanguageModel, ProviderEvent, ToolSpec, TurnContent, TurnMessage, TurnRequest,
        TurnRole,
    },
    openai::OpenAiModel,
    options::build_provider_options,
};

use tandem_models::Provider;

/// Outcome of a structural credential check. No network traffic is
/// involved, so a valid result only means the key LOOKS plausible.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialCheck {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl CredentialCheck {
    fn valid() -> Self {
        Self {
            is_valid: true,
            error_message: None,
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error_message: Some(message.into()),
        }
    }
}

/// Checks that a key matches the provider's well-known shape.
pub fn validate_credential(provider: Provider, api_key: &str) -> CredentialCheck {
    let api_key = api_key.trim();
    if api_key.is_empty() {
        return CredentialCheck::invalid("API key must not be empty");
    }
    match provider {
        Provider::Anthropic => {
            if api_key.starts_with("sk-ant-") {
                CredentialCheck::valid()
            } else {
                CredentialCheck::invalid("Anthropic API keys should start with 'sk-ant-'")
            }
        },
        Provider::Openai => {
            if api_key.starts_with("sk-") {
                CredentialCheck::valid()
            } else {
                CredentialCheck::invalid("OpenAI API keys should start with 'sk-'")
            }
        },
        Provider::Google => {
            if api_key.starts_with("AIza") || api_key.len() > 30 {
                CredentialCheck::valid()
            } else {
                CredentialCheck::invalid("Google API keys should start with 'AIza'")
            }
        },
    }
}

/// Constructs the streaming client for a provider and concrete model id.
///
/// Fails fast on structurally invalid credentials so the caller can reject
/// a request before opening a stream to the user.
pub fn create_model(
    provider: Provider,
    api_key: &str,
    concrete_model_id: &str,
) -> Result<Box<dyn LanguageModel>> {
    let check = validate_credential(provider, api_key);
    if !check.is_valid {
        return Err(Error::message(
            check
                .error_message
                .unwrap_or_else(|| "invalid API key".to_string()),
        ));
    }

    let client = reqwest::Client::new();
    let api_key = api_key.trim();
    Ok(match provider {
        Provider::Anthropic => Box::new(AnthropicModel::new(client, api_key, concrete_model_id)),
        Provider::Google => Box::new(GoogleModel::new(client, api_key, concrete_model_id)),
        Provider::Openai => Box::new(OpenAiModel::new(client, api_key, concrete_model_id)),
    })
}
