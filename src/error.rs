use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Failure talking to one of the upstream APIs (Nimba or monday.com).
#[derive(Debug, Clone, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("upstream request failed: {0}")]
    Transport(String),
    #[error("upstream reported errors: {0}")]
    Reported(serde_json::Value),
    #[error("upstream response invalid: {0}")]
    InvalidResponse(String),
    #[error("upstream client unavailable: {0}")]
    Setup(String),
}

impl UpstreamError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return UpstreamError::Transport(format!("request timed out: {err}"));
        }
        UpstreamError::Transport(err.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("invalid monday signature")]
    Auth,
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

pub type RelayResult<T> = Result<T, RelayError>;

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::Auth => StatusCode::UNAUTHORIZED,
            RelayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
