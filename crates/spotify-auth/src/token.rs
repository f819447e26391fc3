//! Token endpoint and profile probe
//!
//! Two grant types POST to `{accounts_url}/api/token`, both authenticated
//! with the client's Basic credentials:
//! 1. `authorization_code` after the user returns from `/authorize`
//! 2. `refresh_token` when the access token has expired
//!
//! The profile probe (`GET /v1/me`) is the cheapest authenticated call the
//! Web API offers and is used only to test whether the access token still works.

use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::OAuthConfig;
use crate::error::{Error, Result};

/// Response from the token endpoint for both exchange and refresh.
///
/// Refresh responses omit `refresh_token` unless Spotify rotates it.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Seconds until the access token expires; informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Exchange an authorization code for an access/refresh pair.
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &OAuthConfig,
    code: &str,
) -> Result<TokenResponse> {
    post_token_form(
        client,
        config,
        &[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &config.redirect_uri),
        ],
    )
    .await
    .map_err(Error::TokenExchange)
}

/// Obtain a new access token from a refresh token.
pub async fn refresh_token(
    client: &reqwest::Client,
    config: &OAuthConfig,
    refresh: &str,
) -> Result<TokenResponse> {
    post_token_form(
        client,
        config,
        &[("grant_type", "refresh_token"), ("refresh_token", refresh)],
    )
    .await
    .map_err(Error::RefreshFailed)
}

/// Probe `GET /v1/me` with the given access token and report the status.
///
/// Only transport failures are errors; every HTTP status is returned to the
/// caller, which decides what a 401 or a 5xx means.
pub async fn probe_profile(
    client: &reqwest::Client,
    config: &OAuthConfig,
    access: &str,
) -> Result<StatusCode> {
    let response = client
        .get(config.api_endpoint("me"))
        .bearer_auth(access)
        .send()
        .await
        .map_err(|e| Error::Http(format!("profile probe request failed: {e}")))?;
    let status = response.status();
    debug!(%status, "profile probe completed");
    Ok(status)
}

/// POST a grant to the token endpoint. Errors are returned as plain messages
/// so each grant type can wrap them in its own variant.
async fn post_token_form(
    client: &reqwest::Client,
    config: &OAuthConfig,
    form: &[(&str, &str)],
) -> std::result::Result<TokenResponse, String> {
    let response = client
        .post(config.token_endpoint())
        .header(AUTHORIZATION, config.basic_authorization())
        .form(form)
        .send()
        .await
        .map_err(|e| format!("token endpoint request failed: {e}"))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(format!("token endpoint returned {status}: {body}"));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| format!("invalid token response: {e}"))
}
