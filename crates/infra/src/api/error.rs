use serde::Deserialize;
use thiserror::Error;

pub const FALLBACK_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

/// Error payload the backend attaches to non-2xx responses. Either field may
/// be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn message(message: &str) -> Self {
        Self {
            message: Some(message.to_string()),
            error: None,
        }
    }

    pub fn error(error: &str) -> Self {
        Self {
            message: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("request failed with status {status}")]
    Status { status: u16, body: ErrorBody },
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Client(String),
}

impl ApiError {
    /// Text shown to the user: server `message`, then server `error`, then
    /// the client-side description, then a fixed fallback.
    pub fn user_message(&self) -> String {
        if let ApiError::Status { body, .. } = self {
            if let Some(message) = non_blank(body.message.as_deref()) {
                return message.to_string();
            }
            if let Some(error) = non_blank(body.error.as_deref()) {
                return error.to_string();
            }
        }
        let generic = self.to_string();
        match non_blank(Some(&generic)) {
            Some(generic) => generic.to_string(),
            None => FALLBACK_ERROR_MESSAGE.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ApiError::NotFound(_) | ApiError::Status { status: 404, .. }
        )
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
