//! Credential guard middleware
//!
//! Runs `Session::guard()` before every protected route. Expired tokens are
//! refreshed in place; a probe that fails for any other reason ends the
//! request with a generic 500. The resulting `GuardOutcome` is left in the
//! request extensions so handlers do not refresh a second time.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, error, instrument};

use crate::AppState;
use crate::error::RelayError;
use crate::metrics;

#[instrument(
    skip_all,
    fields(
        request_id = %format!("req_{}", uuid::Uuid::new_v4().as_simple()),
        method = %request.method(),
        path = %request.uri().path(),
    )
)]
pub async fn credential_guard(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match state.session.guard().await {
        Ok(outcome) => {
            debug!(outcome = outcome.as_str(), "credential guard passed");
            metrics::record_guard_outcome(outcome.as_str());
            request.extensions_mut().insert(outcome);
            next.run(request).await
        }
        Err(e) => {
            error!(error = %e, "credential guard failed");
            metrics::record_guard_outcome("failed");
            RelayError::UpstreamAuth.into_response()
        }
    }
}
