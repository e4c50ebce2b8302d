use tandem_protocol::{ErrorShape, error_codes};

/// Pre-stream rejection taxonomy. Everything here is reported before any
/// streaming byte is sent; mid-stream failures become in-stream error
/// events instead.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("{0}")]
    BadRequest(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("not the owner of this conversation")]
    Forbidden,

    #[error("unknown model: {0}")]
    ModelNotFound(String),

    #[error("model '{0}' is disabled by the administrator")]
    ModelDisabled(String),

    #[error("{0}")]
    InvalidCredential(String),

    #[error("message limit reached, try again later")]
    RateLimited,

    #[error(transparent)]
    Storage(#[from] tandem_storage::Error),
}

impl ChatError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => error_codes::BAD_REQUEST,
            Self::Unauthorized => error_codes::UNAUTHORIZED,
            Self::Forbidden => error_codes::FORBIDDEN,
            Self::ModelNotFound(_) => error_codes::MODEL_NOT_FOUND,
            Self::ModelDisabled(_) => error_codes::MODEL_DISABLED,
            Self::InvalidCredential(_) => error_codes::INVALID_CREDENTIAL,
            Self::RateLimited => error_codes::RATE_LIMITED,
            Self::Storage(_) => error_codes::STORAGE_ERROR,
        }
    }

    pub fn shape(&self) -> ErrorShape {
        ErrorShape::new(self.code(), self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_the_taxonomy() {
        assert_eq!(ChatError::Forbidden.code(), error_codes::FORBIDDEN);
        assert_eq!(
            ChatError::ModelDisabled("x".into()).code(),
            error_codes::MODEL_DISABLED
        );
        assert_eq!(ChatError::RateLimited.code(), error_codes::RATE_LIMITED);
    }
}
