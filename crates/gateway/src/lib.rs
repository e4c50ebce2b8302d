//! HTTP surface for the chat service: the streaming chat endpoint, model
//! availability, credential validation, administrative configuration,
//! and per-user preferences/usage.

pub mod admin_routes;
pub mod auth;
pub mod chat_routes;
pub mod error;
pub mod model_routes;
pub mod server;
pub mod state;
pub mod user_routes;

pub use {
    auth::UserIdentity,
    error::ApiError,
    server::{build_app, start},
    state::AppState,
};
