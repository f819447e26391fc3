//! Authorization endpoints: `/login` and `/callback`
//!
//! The anti-forgery state travels in the `spotify_auth_state` cookie. `/login`
//! issues it; `/callback` compares it with the `state` query parameter and,
//! once they match, hands back a `VerifiedState` that clears the cookie on
//! whatever response the exchange produces.

use axum::extract::{Query, State};
use axum::http::header::{COOKIE, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use serde::Deserialize;
use spotify_auth::{CredentialPair, Error, STATE_COOKIE, generate_state};
use tracing::{info, warn};

use crate::AppState;
use crate::metrics;

/// State cookies outlive an abandoned login by at most this long.
const STATE_COOKIE_MAX_AGE_SECS: u64 = 600;

const STATE_MISMATCH_REDIRECT: &str = "/#error=state_mismatch";
const INVALID_TOKEN_REDIRECT: &str = "/#error=invalid_token";

/// GET /login: Issue a state cookie and redirect to Spotify's consent page.
pub async fn login(State(state): State<AppState>) -> Response {
    let auth_state = generate_state();
    let authorization_url = state.session.authorization_url(&auth_state);
    info!("redirecting to Spotify authorization");

    (
        StatusCode::FOUND,
        [
            (LOCATION, authorization_url),
            (SET_COOKIE, issue_state_cookie(&auth_state)),
        ],
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    /// Set by Spotify when the user declines access
    error: Option<String>,
}

/// GET /callback: Verify state, exchange the code, hand tokens to the front end.
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Response {
    let verified = match PendingAuthorization::from_headers(&headers).verify(params.state.as_deref())
    {
        Ok(verified) => verified,
        Err(e) => {
            warn!(error = %e, "rejecting authorization callback");
            metrics::record_authorization("state_mismatch");
            return redirect(STATE_MISMATCH_REDIRECT);
        }
    };

    let response = complete_authorization(&state, params).await;
    verified.release(response)
}

async fn complete_authorization(state: &AppState, params: CallbackParams) -> Response {
    let result = match (params.error, params.code) {
        (Some(reason), _) => Err(Error::TokenExchange(format!(
            "authorization declined: {reason}"
        ))),
        (None, None) => Err(Error::TokenExchange("callback carried no code".into())),
        (None, Some(code)) => state.session.complete_authorization(&code).await,
    };

    match result {
        Ok(pair) => {
            metrics::record_authorization("success");
            redirect(landing_url(&state.frontend_url, &pair).as_str())
        }
        Err(e) => {
            warn!(error = %e, "authorization code exchange failed");
            metrics::record_authorization("exchange_failed");
            redirect(INVALID_TOKEN_REDIRECT)
        }
    }
}

/// Front-end landing URL with both tokens appended as query parameters.
fn landing_url(frontend_url: &url::Url, pair: &CredentialPair) -> url::Url {
    let mut url = frontend_url.clone();
    url.query_pairs_mut()
        .append_pair("access_token", &pair.access_token)
        .append_pair("refresh_token", &pair.refresh_token);
    url
}

fn redirect(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

fn issue_state_cookie(auth_state: &str) -> String {
    format!(
        "{STATE_COOKIE}={auth_state}; Path=/; Max-Age={STATE_COOKIE_MAX_AGE_SECS}; HttpOnly; SameSite=Lax"
    )
}

fn clear_state_cookie() -> String {
    format!("{STATE_COOKIE}=; Path=/; Max-Age=0")
}

/// The state cookie as received on the callback, not yet checked.
struct PendingAuthorization {
    stored: Option<String>,
}

impl PendingAuthorization {
    fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            stored: read_cookie(headers, STATE_COOKIE),
        }
    }

    /// Exact comparison against the returned `state`. A missing value on
    /// either side is a mismatch.
    fn verify(self, returned: Option<&str>) -> spotify_auth::Result<VerifiedState> {
        match (self.stored.as_deref(), returned) {
            (Some(stored), Some(returned)) if stored == returned => Ok(VerifiedState { _private: () }),
            _ => Err(Error::StateMismatch),
        }
    }
}

/// A state cookie that matched its callback. Releasing it attaches the
/// clearing `Set-Cookie` so the state cannot be replayed.
#[must_use = "a verified state must be released onto the callback response"]
struct VerifiedState {
    _private: (),
}

impl VerifiedState {
    fn release(self, response: Response) -> Response {
        (AppendHeaders([(SET_COOKIE, clear_state_cookie())]), response).into_response()
    }
}

/// Value of the named cookie from any `Cookie` header on the request.
fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}
