use thiserror::Error;

use crate::models::FieldErrors;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("missing credentials: username and password are required")]
    InvalidCredentials,

    #[error("session token is invalid or expired")]
    TokenInvalid,

    #[error("session storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("{detail}")]
    Network { status: Option<u16>, detail: String },

    #[error("{0}")]
    Validation(FieldErrors),

    #[error("another post change is still in flight")]
    Busy,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    pub fn network(status: Option<u16>, detail: impl Into<String>) -> Self {
        ClientError::Network {
            status,
            detail: detail.into(),
        }
    }

    /// HTTP status of a rejected request, if the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Network { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::StorageUnavailable(err.to_string())
    }
}

// Transport-level failures carry no backend detail; keep reqwest's text.
impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Network {
            status: err.status().map(|s| s.as_u16()),
            detail: err.to_string(),
        }
    }
}
