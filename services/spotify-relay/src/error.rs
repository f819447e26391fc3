//! Per-request error responses
//!
//! Failures inside a handler become JSON bodies of the form
//! `{"error": "...", "details": ...}`. Authorization-flow failures are not
//! represented here; `/callback` reports those by redirect.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    /// Credential guard could not validate the access token for a reason
    /// other than expiry
    #[error("Failed to authenticate with Spotify")]
    UpstreamAuth,

    /// No access token has ever been issued
    #[error("Not authorized with Spotify, visit /login")]
    NotAuthorized,

    /// A resource call failed; `details` carries the upstream body when the
    /// route exposes it
    #[error("{message}")]
    Upstream {
        status: StatusCode,
        message: &'static str,
        details: Option<Value>,
    },
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::UpstreamAuth => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::NotAuthorized => StatusCode::UNAUTHORIZED,
            RelayError::Upstream { status, .. } => *status,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let mut body = json!({ "error": self.to_string() });
        if let RelayError::Upstream {
            details: Some(details),
            ..
        } = &self
        {
            body["details"] = details.clone();
        }
        (self.status(), Json(body)).into_response()
    }
}
