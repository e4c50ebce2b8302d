#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{message}")]
    Message { message: String },
    #[error("upstream {provider} error (status {status}): {body}")]
    Upstream {
        provider: &'static str,
        status: u16,
        body: String,
    },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    /// Whether this is the upstream "billing/credit card required" failure,
    /// which clients surface with its own error code.
    #[must_use]
    pub fn is_billing_required(&self) -> bool {
        match self {
            Self::Upstream { body, .. } => {
                body.contains("credit card") || body.contains("billing")
            },
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn billing_detection_matches_upstream_body() {
        let err = Error::Upstream {
            provider: "openai",
            status: 402,
            body: "a valid credit card on file is required to service requests".into(),
        };
        assert!(err.is_billing_required());
    }

    #[test]
    fn plain_upstream_error_is_not_billing() {
        let err = Error::Upstream {
            provider: "anthropic",
            status: 529,
            body: "overloaded".into(),
        };
        assert!(!err.is_billing_required());
    }
}
