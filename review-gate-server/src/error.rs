use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::net::IpAddr;
use thiserror::Error;

/// Failure talking to the GitHub API.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest_middleware::Error),

    #[error("GitHub API error: {status} - {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode GitHub response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for HostError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(reqwest_middleware::Error::Reqwest(e))
    }
}

/// Errors surfaced while handling a webhook delivery.
///
/// Only the inbound rejections reach the webhook sender; `HostUnavailable`
/// is logged by the dispatcher and never turned into a response.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("webhook signature mismatch")]
    SignatureMismatch,

    #[error("missing X-GitHub-Event header")]
    MissingEventType,

    #[error("source address {0} is not allow-listed")]
    SourceNotAllowed(IpAddr),

    #[error("malformed webhook payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("GitHub unavailable: {0}")]
    HostUnavailable(#[from] HostError),
}

impl GateError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::SignatureMismatch | Self::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            Self::MissingEventType | Self::HostUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::SourceNotAllowed(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}
