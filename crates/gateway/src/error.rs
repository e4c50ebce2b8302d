use {
    axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    tandem_chat::ChatError,
    tandem_protocol::{ErrorShape, error_codes},
};

/// HTTP-facing error: a status code plus the protocol error shape as the
/// JSON body. Everything a handler can fail with converts into this.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub shape: ErrorShape,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            shape: ErrorShape::new(code, message),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_codes::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            error_codes::UNAUTHORIZED,
            "authentication required",
        )
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, error_codes::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error_codes::BAD_REQUEST, message)
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        let status = match &err {
            ChatError::BadRequest(_) | ChatError::InvalidCredential(_) => StatusCode::BAD_REQUEST,
            ChatError::Unauthorized => StatusCode::UNAUTHORIZED,
            ChatError::Forbidden | ChatError::ModelDisabled(_) => StatusCode::FORBIDDEN,
            ChatError::ModelNotFound(_) => StatusCode::NOT_FOUND,
            ChatError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ChatError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            shape: err.shape(),
        }
    }
}

impl From<tandem_storage::Error> for ApiError {
    fn from(err: tandem_storage::Error) -> Self {
        tracing::error!(%err, "storage failure");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::STORAGE_ERROR,
            "internal storage error",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.shape)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
