// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for pictag

use thiserror::Error;

/// Result type alias for pictag operations
pub type Result<T> = std::result::Result<T, PictagError>;

/// pictag error types
#[derive(Error, Debug)]
pub enum PictagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("API returned status {status}: {body}")]
    ApiStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Tagging log error: {0}")]
    Log(#[from] csv::Error),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Unusable model response: {0}")]
    ModelResponse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PictagError {
    /// Whether a remote call that failed this way may succeed if repeated.
    pub fn is_transient(&self) -> bool {
        match self {
            PictagError::Api(e) => e.is_timeout() || e.is_connect(),
            PictagError::ApiStatus { status, .. } => {
                *status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_rate_limit_and_server_errors_are_transient() {
        let limited = PictagError::ApiStatus {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: String::new(),
        };
        let unavailable = PictagError::ApiStatus {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: String::new(),
        };
        assert!(limited.is_transient());
        assert!(unavailable.is_transient());
    }

    #[test]
    fn test_client_errors_are_not_transient() {
        let unauthorized = PictagError::ApiStatus {
            status: StatusCode::UNAUTHORIZED,
            body: "bad key".to_string(),
        };
        assert!(!unauthorized.is_transient());
        assert!(!PictagError::ModelResponse("missing filename".to_string()).is_transient());
    }
}
