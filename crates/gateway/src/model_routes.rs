//! Public model availability and credential validation.

use {
    axum::{
        Json,
        extract::State,
        http::header,
        response::{IntoResponse, Response},
    },
    serde::Deserialize,
    tandem_models::ModelDescriptor,
    tandem_protocol::PublicModel,
    tandem_providers::{CredentialCheck, validate_credential},
};

use crate::state::AppState;

fn public_model(descriptor: &ModelDescriptor) -> PublicModel {
    PublicModel {
        id: descriptor.id.clone(),
        name: descriptor.name.clone(),
        description: descriptor.description.clone(),
        provider: descriptor.provider.as_str().to_string(),
        context_window: descriptor.context_window,
        supports_vision: descriptor.supports_vision,
        supports_tools: descriptor.supports_tools,
        capabilities: descriptor
            .capabilities
            .enabled_names()
            .into_iter()
            .map(str::to_string)
            .collect(),
    }
}

/// `GET /models/enabled` — the current selectable models in client-safe
/// shape. Served with `no-store` so administrative toggles apply on the
/// next page load.
pub async fn enabled_models(State(state): State<AppState>) -> Response {
    let models: Vec<PublicModel> = state
        .registry()
        .enabled_models()
        .await
        .iter()
        .map(public_model)
        .collect();

    ([(header::CACHE_CONTROL, "no-store")], Json(models)).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub provider: String,
    pub api_key: String,
}

/// `POST /credentials/validate` — structural key check only; never calls
/// the upstream provider.
pub async fn validate(Json(request): Json<ValidateRequest>) -> Json<CredentialCheck> {
    let check = match request.provider.parse() {
        Ok(provider) => validate_credential(provider, &request.api_key),
        Err(_) => CredentialCheck {
            is_valid: false,
            error_message: Some(format!("unknown provider: {}", request.provider)),
        },
    };
    Json(check)
}
