//! Error types for quickgpt.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::config::ProviderKind;

/// Result type alias for quickgpt operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for quickgpt.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Missing {var} in environment")]
    MissingApiKey { var: &'static str },

    /// Non-success status from the provider.
    #[error("{provider} {status}: {message}")]
    Upstream {
        provider: ProviderKind,
        status: u16,
        message: String,
        raw_body: String,
    },

    #[error("{provider}: empty response")]
    EmptyResponse { provider: ProviderKind },

    #[error("{provider}: malformed response: {reason}")]
    MalformedResponse {
        provider: ProviderKind,
        reason: String,
    },

    #[error("Failed to reach {provider}: {source}")]
    Transport {
        provider: ProviderKind,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider}: no reply within {secs}s")]
    Timeout { provider: ProviderKind, secs: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status reported to the browser.
    ///
    /// Upstream statuses are propagated as-is; everything else is a 500.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "error": "Backend error",
            "details": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_display_matches_provider_format() {
        let err = Error::Upstream {
            provider: ProviderKind::Groq,
            status: 429,
            message: "rate limited".to_string(),
            raw_body: r#"{"error":{"message":"rate limited"}}"#.to_string(),
        };
        assert_eq!(err.to_string(), "Groq 429: rate limited");
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_non_upstream_errors_are_500() {
        let cases = [
            Error::MissingApiKey {
                var: "GROQ_API_KEY",
            },
            Error::EmptyResponse {
                provider: ProviderKind::Groq,
            },
            Error::Timeout {
                provider: ProviderKind::HuggingFace,
                secs: 5,
            },
            Error::Internal("boom".to_string()),
        ];
        for err in cases {
            assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR, "{}", err);
        }
    }

    #[test]
    fn test_out_of_range_upstream_status_falls_back_to_500() {
        let err = Error::Upstream {
            provider: ProviderKind::Groq,
            status: 1000,
            message: "weird".to_string(),
            raw_body: String::new(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_into_response_body_shape() {
        let response = Error::MissingApiKey {
            var: "GROQ_API_KEY",
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"], "Backend error");
        assert_eq!(json["details"], "Missing GROQ_API_KEY in environment");
    }
}
