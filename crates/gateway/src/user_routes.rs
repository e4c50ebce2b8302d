//! Per-user preferences and usage reporting.

use {
    axum::{Json, extract::State},
    serde_json::{Value, json},
    tandem_storage::UserPreferences,
};

use crate::{auth::UserIdentity, error::Result, state::AppState};

pub async fn get_preferences(
    State(state): State<AppState>,
    identity: UserIdentity,
) -> Result<Json<UserPreferences>> {
    Ok(Json(
        state.storage().get_preferences(&identity.user_id).await?,
    ))
}

pub async fn put_preferences(
    State(state): State<AppState>,
    identity: UserIdentity,
    Json(preferences): Json<UserPreferences>,
) -> Result<Json<UserPreferences>> {
    state
        .storage()
        .put_preferences(&identity.user_id, preferences)
        .await?;
    Ok(Json(preferences))
}

/// `GET /usage` — the caller's lifetime totals plus per-model and
/// per-tool breakdowns.
pub async fn usage_summary(
    State(state): State<AppState>,
    identity: UserIdentity,
) -> Result<Json<Value>> {
    let storage = state.storage();
    let totals = storage.usage_totals(&identity.user_id, None).await?;
    let by_model = storage.usage_by_model(&identity.user_id).await?;
    let by_tool = storage.usage_by_tool(&identity.user_id).await?;

    Ok(Json(json!({
        "totals": totals,
        "byModel": by_model,
        "byTool": by_tool,
    })))
}
