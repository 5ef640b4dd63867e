//! Error types for the gateway, and the mapping from a failure to the
//! envelope clients receive.

use crate::translate::types::ErrorEnvelope;
use axum::http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Backend returned status {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl GatewayError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: msg.into(),
        }
    }

    pub fn upstream(status: u16, msg: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: msg.into(),
        }
    }

    /// Downstream status: the backend's own status for non-2xx replies,
    /// 400 for bodies we could not read, 500 for everything else.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            Self::Upstream { status: 429, .. } => "rate_limit_error",
            Self::Upstream { status, .. } if (400..500).contains(status) => {
                "invalid_request_error"
            }
            Self::InvalidRequest { .. } => "invalid_request_error",
            Self::Http(e) if e.is_timeout() => "timeout_error",
            _ => "api_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Upstream { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Turn any failure into the status and envelope sent downstream.
///
/// `model_attempted` is the model name as the client sent it, before
/// resolution. Never fails.
pub fn map_error(err: &GatewayError, model_attempted: Option<&str>) -> (StatusCode, ErrorEnvelope) {
    let status = err.status_code();
    let mut envelope = ErrorEnvelope::new(err.error_type(), err.client_message(), status.as_u16());
    if let Some(model) = model_attempted {
        envelope = envelope.with_model(model);
    }
    (status, envelope)
}

pub type Result<T> = std::result::Result<T, GatewayError>;
