//! Error types for the job controller client

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the job controller
#[derive(Debug, Error)]
pub enum ClientError {
    /// The controller could not be reached or the transfer broke off
    #[error("job controller request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Non-2xx answer; `message` is the response body
    #[error("job controller answered {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("unreadable job controller response: {0}")]
    ParseError(String),

    /// The controller does not know the task id
    #[error("unknown task {0}")]
    NotFound(String),
}

impl ClientError {
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::ApiError { status: 404, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found() {
        assert!(ClientError::api_error(404, "gone").is_not_found());
        assert!(ClientError::NotFound("t-1".into()).is_not_found());
        assert!(!ClientError::api_error(503, "busy").is_not_found());
        assert!(!ClientError::ParseError("x".into()).is_not_found());
    }
}
