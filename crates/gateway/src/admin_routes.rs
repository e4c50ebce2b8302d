//! Administrative configuration: models, agents, tools.
//!
//! Every mutation records an audit row with before/after state. Model
//! mutations also drop the registry snapshot so the change applies
//! without waiting out the cache TTL.

use {
    axum::{
        Json,
        extract::{Path, Query, State},
    },
    serde::Deserialize,
    serde_json::Value,
    tandem_models::ModelDescriptor,
    tandem_protocol::AgentDescriptor,
    tandem_storage::AuditEntry,
    tandem_tools::ToolDescriptor,
};

use crate::{
    auth::UserIdentity,
    error::{ApiError, Result},
    state::AppState,
};

fn check_id_matches(path_id: &str, body_id: &str) -> Result<()> {
    if path_id == body_id {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!(
            "body id '{body_id}' does not match path id '{path_id}'"
        )))
    }
}

async fn audit(
    state: &AppState,
    identity: &UserIdentity,
    action: &str,
    resource_type: &str,
    resource_id: &str,
    before: Option<&Value>,
    after: Option<&Value>,
) -> Result<()> {
    state
        .storage()
        .record_audit(
            &identity.user_id,
            action,
            resource_type,
            resource_id,
            before,
            after,
        )
        .await?;
    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleBody {
    pub is_enabled: bool,
}

// ── Models ───────────────────────────────────────────────────────────────────

pub async fn list_models(
    State(state): State<AppState>,
    identity: UserIdentity,
) -> Result<Json<Vec<ModelDescriptor>>> {
    identity.require_admin()?;
    Ok(Json(state.storage().list_model_configs().await?))
}

pub async fn update_model(
    State(state): State<AppState>,
    identity: UserIdentity,
    Path(id): Path<String>,
    Json(descriptor): Json<ModelDescriptor>,
) -> Result<Json<ModelDescriptor>> {
    identity.require_admin()?;
    check_id_matches(&id, &descriptor.id)?;

    let before = state
        .storage()
        .get_model_config(&id)
        .await?
        .map(|m| serde_json::to_value(&m).unwrap_or(Value::Null));
    let after = serde_json::to_value(&descriptor).unwrap_or(Value::Null);

    state.storage().upsert_model_config(&descriptor).await?;
    audit(
        &state,
        &identity,
        "update",
        "model",
        &id,
        before.as_ref(),
        Some(&after),
    )
    .await?;
    state.registry().invalidate().await;

    Ok(Json(descriptor))
}

pub async fn toggle_model(
    State(state): State<AppState>,
    identity: UserIdentity,
    Path(id): Path<String>,
    Json(body): Json<ToggleBody>,
) -> Result<Json<ModelDescriptor>> {
    identity.require_admin()?;

    let Some(mut descriptor) = state.storage().get_model_config(&id).await? else {
        return Err(ApiError::not_found(format!("no model config for '{id}'")));
    };
    let before = serde_json::to_value(&descriptor).unwrap_or(Value::Null);
    descriptor.is_enabled = body.is_enabled;
    let after = serde_json::to_value(&descriptor).unwrap_or(Value::Null);

    state.storage().upsert_model_config(&descriptor).await?;
    audit(
        &state,
        &identity,
        "toggle",
        "model",
        &id,
        Some(&before),
        Some(&after),
    )
    .await?;
    state.registry().invalidate().await;

    Ok(Json(descriptor))
}

// ── Agents ───────────────────────────────────────────────────────────────────

pub async fn list_agents(
    State(state): State<AppState>,
    identity: UserIdentity,
) -> Result<Json<Vec<AgentDescriptor>>> {
    identity.require_admin()?;
    Ok(Json(state.storage().list_agent_configs().await?))
}

pub async fn update_agent(
    State(state): State<AppState>,
    identity: UserIdentity,
    Path(id): Path<String>,
    Json(descriptor): Json<AgentDescriptor>,
) -> Result<Json<AgentDescriptor>> {
    identity.require_admin()?;
    check_id_matches(&id, &descriptor.id)?;

    let before = state
        .storage()
        .get_agent_config(&id)
        .await?
        .map(|a| serde_json::to_value(&a).unwrap_or(Value::Null));
    let after = serde_json::to_value(&descriptor).unwrap_or(Value::Null);

    state.storage().upsert_agent_config(&descriptor).await?;
    audit(
        &state,
        &identity,
        "update",
        "agent",
        &id,
        before.as_ref(),
        Some(&after),
    )
    .await?;

    Ok(Json(descriptor))
}

// ── Tools ────────────────────────────────────────────────────────────────────

pub async fn list_tools(
    State(state): State<AppState>,
    identity: UserIdentity,
) -> Result<Json<Vec<ToolDescriptor>>> {
    identity.require_admin()?;
    Ok(Json(state.storage().list_tool_configs().await?))
}

pub async fn update_tool(
    State(state): State<AppState>,
    identity: UserIdentity,
    Path(id): Path<String>,
    Json(descriptor): Json<ToolDescriptor>,
) -> Result<Json<ToolDescriptor>> {
    identity.require_admin()?;
    check_id_matches(&id, &descriptor.id)?;

    let before = state
        .storage()
        .get_tool_config(&id)
        .await?
        .map(|t| serde_json::to_value(&t).unwrap_or(Value::Null));
    let after = serde_json::to_value(&descriptor).unwrap_or(Value::Null);

    state.storage().upsert_tool_config(&descriptor).await?;
    audit(
        &state,
        &identity,
        "update",
        "tool",
        &id,
        before.as_ref(),
        Some(&after),
    )
    .await?;

    Ok(Json(descriptor))
}

pub async fn toggle_tool(
    State(state): State<AppState>,
    identity: UserIdentity,
    Path(id): Path<String>,
    Json(body): Json<ToggleBody>,
) -> Result<Json<ToolDescriptor>> {
    identity.require_admin()?;

    let mut descriptor = state
        .storage()
        .get_tool_config(&id)
        .await?
        .unwrap_or_else(|| ToolDescriptor::enabled(&id));
    let before = serde_json::to_value(&descriptor).unwrap_or(Value::Null);
    descriptor.is_enabled = body.is_enabled;
    let after = serde_json::to_value(&descriptor).unwrap_or(Value::Null);

    state.storage().upsert_tool_config(&descriptor).await?;
    audit(
        &state,
        &identity,
        "toggle",
        "tool",
        &id,
        Some(&before),
        Some(&after),
    )
    .await?;

    Ok(Json(descriptor))
}

// ── Audit log ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AuditQuery {
    #[serde(default = "default_audit_limit")]
    pub limit: i64,
}

fn default_audit_limit() -> i64 {
    50
}

pub async fn recent_audit(
    State(state): State<AppState>,
    identity: UserIdentity,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditEntry>>> {
    identity.require_admin()?;
    Ok(Json(state.storage().recent_audit(query.limit).await?))
}
