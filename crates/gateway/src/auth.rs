//! Authentication boundary.
//!
//! Session management lives outside this service; what arrives here is a
//! bearer token that IS the caller's stable user id (issued by the outer
//! auth layer). Tokens listed in the admin set additionally carry the
//! admin role.

use {
    axum::{extract::FromRequestParts, http::header, http::request::Parts},
    crate::{error::ApiError, state::AppState},
};

#[derive(Debug, Clone)]
pub struct UserIdentity {
    pub user_id: String,
    pub is_admin: bool,
}

impl UserIdentity {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(ApiError::forbidden("admin role required"))
        }
    }
}

impl FromRequestParts<AppState> for UserIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|header| header.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty());

        let Some(token) = token else {
            return Err(ApiError::unauthorized());
        };

        Ok(Self {
            user_id: token.to_string(),
            is_admin: state.admin_tokens.contains(token),
        })
    }
}
