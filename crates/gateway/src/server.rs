//! Router construction and server startup.

use {
    axum::{
        Json, Router,
        routing::{get, patch, post},
    },
    serde_json::json,
    tokio::net::TcpListener,
    tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
    },
    tracing::info,
};

use crate::{admin_routes, chat_routes, model_routes, state::AppState, user_routes};

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Build the gateway router (shared between production startup and tests).
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route(
            "/chat",
            post(chat_routes::post_chat).delete(chat_routes::delete_chat),
        )
        .route("/models/enabled", get(model_routes::enabled_models))
        .route("/credentials/validate", post(model_routes::validate))
        .route("/admin/models", get(admin_routes::list_models))
        .route("/admin/models/{id}", patch(admin_routes::update_model))
        .route(
            "/admin/models/{id}/toggle",
            patch(admin_routes::toggle_model),
        )
        .route("/admin/agents", get(admin_routes::list_agents))
        .route("/admin/agents/{id}", patch(admin_routes::update_agent))
        .route("/admin/tools", get(admin_routes::list_tools))
        .route("/admin/tools/{id}", patch(admin_routes::update_tool))
        .route("/admin/tools/{id}/toggle", patch(admin_routes::toggle_tool))
        .route("/admin/audit", get(admin_routes::recent_audit))
        .route(
            "/user/preferences",
            get(user_routes::get_preferences).put(user_routes::put_preferences),
        )
        .route("/usage", get(user_routes::usage_summary))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn start(bind: &str, port: u16, state: AppState) -> anyhow::Result<()> {
    let app = build_app(state);
    let listener = TcpListener::bind((bind, port)).await?;
    info!("gateway listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
