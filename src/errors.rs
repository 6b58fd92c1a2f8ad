use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Startup configuration problems. Always fatal: the server never binds.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required but not set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("failed to read private key at {path}: {source}")]
    PrivateKeyUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("private key at {path} is not a valid RSA PEM key: {source}")]
    PrivateKeyInvalid {
        path: String,
        #[source]
        source: jsonwebtoken::errors::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// The identity provider rejected or could not process a token exchange.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("failed to sign app assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("token exchange request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("token exchange rejected with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("token exchange returned an unreadable body: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("upstream exchange error: {0}")]
    UpstreamExchange(#[from] ExchangeError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match &self {
            AppError::Validation(reason) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "validation_failed",
                reason.clone(),
            ),
            AppError::UpstreamExchange(e) => {
                tracing::error!("Token exchange failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "upstream_error",
                    "token_exchange_failed",
                    format!("failed to generate installation token: {}", e),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}
