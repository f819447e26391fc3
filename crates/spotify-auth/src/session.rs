//! The relay's OAuth session
//!
//! A `Session` owns the HTTP client, the client registration and the
//! credential store. Handlers receive it through application state instead of
//! touching process-wide token variables.
//!
//! Lifecycle:
//! - no credential → `complete_authorization()` → valid
//! - valid → (probe or call returns 401) → refresh → valid
//! - expired with no refresh token → degraded; requests keep flowing and fail
//!   downstream until the user logs in again

use std::future::Future;

use reqwest::StatusCode;
use tracing::{debug, info, warn};

use crate::config::OAuthConfig;
use crate::credentials::{CredentialPair, CredentialStore};
use crate::error::{Error, Result};
use crate::state::build_authorization_url;
use crate::token;

/// What the credential guard concluded before letting a request through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Probe accepted the current access token
    Valid,
    /// Access token was rejected and successfully refreshed
    Refreshed,
    /// Access token was rejected and could not be refreshed
    Degraded,
}

impl GuardOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardOutcome::Valid => "valid",
            GuardOutcome::Refreshed => "refreshed",
            GuardOutcome::Degraded => "degraded",
        }
    }

    /// Whether the guard already went to the token endpoint (or found
    /// nothing to refresh with) for this request.
    pub fn attempted_refresh(&self) -> bool {
        matches!(self, GuardOutcome::Refreshed | GuardOutcome::Degraded)
    }
}

pub struct Session {
    http: reqwest::Client,
    config: OAuthConfig,
    store: CredentialStore,
}

impl Session {
    pub fn new(http: reqwest::Client, config: OAuthConfig) -> Self {
        Self {
            http,
            config,
            store: CredentialStore::new(),
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.store
    }

    pub fn authorization_url(&self, state: &str) -> String {
        build_authorization_url(&self.config, state)
    }

    /// Exchange the callback's code and store the issued pair, replacing any
    /// previous one.
    pub async fn complete_authorization(&self, code: &str) -> Result<CredentialPair> {
        let response = token::exchange_code(&self.http, &self.config, code).await?;
        if response.access_token.is_empty() {
            return Err(Error::TokenExchange(
                "token endpoint returned an empty access token".into(),
            ));
        }
        let pair = CredentialPair::new(
            response.access_token,
            response.refresh_token.unwrap_or_default(),
        );
        self.store.set(pair.clone()).await;
        info!(has_refresh = pair.has_refresh(), "authorization completed");
        Ok(pair)
    }

    /// Refresh the access token using the held refresh token.
    pub async fn refresh(&self) -> Result<()> {
        let refresh = self.store.refresh_token().await.ok_or(Error::NoRefreshToken)?;
        let response = token::refresh_token(&self.http, &self.config, &refresh).await?;
        if response.access_token.is_empty() {
            return Err(Error::RefreshFailed(
                "token endpoint returned an empty access token".into(),
            ));
        }
        let rotated = response.refresh_token.is_some();
        self.store
            .update_access(response.access_token, response.refresh_token)
            .await;
        info!(rotated, "access token refreshed");
        Ok(())
    }

    /// Check the access token before a protected request.
    ///
    /// A 401 from the probe (or no access token at all) triggers one refresh
    /// attempt whose failure is logged and swallowed. Any other probe failure
    /// is `UpstreamAuth` and should fail the inbound request.
    pub async fn guard(&self) -> Result<GuardOutcome> {
        let access = self.store.access_token().await;
        if access.is_empty() {
            debug!("no access token held, skipping probe");
        } else {
            let status = token::probe_profile(&self.http, &self.config, &access)
                .await
                .map_err(|e| Error::UpstreamAuth(e.to_string()))?;
            if status.is_success() {
                return Ok(GuardOutcome::Valid);
            }
            if status != StatusCode::UNAUTHORIZED {
                return Err(Error::UpstreamAuth(format!(
                    "profile probe returned {status}"
                )));
            }
            info!("access token expired, refreshing");
        }
        Ok(self.refresh_or_degrade().await)
    }

    /// Run an upstream call with the current access token, refreshing and
    /// retrying exactly once if it comes back 401.
    ///
    /// If the refresh does not succeed the original 401 response is returned
    /// as is. With no access token at all and nothing to refresh from, no
    /// call is made and `NotAuthorized` is returned.
    pub async fn with_authenticated_call<F, Fut>(&self, call: F) -> Result<reqwest::Response>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = reqwest::Result<reqwest::Response>>,
    {
        self.authenticated_call(true, call).await
    }

    /// Same as `with_authenticated_call` for a request that already passed
    /// `guard()`. When the guard attempted a refresh, a 401 is returned
    /// without a second trip to the token endpoint.
    pub async fn with_guarded_call<F, Fut>(
        &self,
        outcome: GuardOutcome,
        call: F,
    ) -> Result<reqwest::Response>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = reqwest::Result<reqwest::Response>>,
    {
        self.authenticated_call(!outcome.attempted_refresh(), call).await
    }

    async fn authenticated_call<F, Fut>(
        &self,
        may_refresh: bool,
        call: F,
    ) -> Result<reqwest::Response>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = reqwest::Result<reqwest::Response>>,
    {
        let access = self.store.access_token().await;
        let rejected = if access.is_empty() {
            None
        } else {
            let response = call(access).await.map_err(upstream_call_error)?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }
            Some(response)
        };

        if !may_refresh {
            debug!("refresh already attempted for this request, not retrying");
            return rejected.ok_or(Error::NotAuthorized);
        }
        if rejected.is_some() {
            info!("upstream rejected access token, refreshing before retry");
        }

        match self.refresh_or_degrade().await {
            GuardOutcome::Refreshed => {
                let access = self.store.access_token().await;
                if access.is_empty() {
                    return rejected.ok_or(Error::NotAuthorized);
                }
                call(access).await.map_err(upstream_call_error)
            }
            _ => rejected.ok_or(Error::NotAuthorized),
        }
    }

    async fn refresh_or_degrade(&self) -> GuardOutcome {
        match self.refresh().await {
            Ok(()) => GuardOutcome::Refreshed,
            Err(Error::NoRefreshToken) => {
                warn!("no refresh token available, continuing without a valid access token");
                GuardOutcome::Degraded
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed, continuing with stale access token");
                GuardOutcome::Degraded
            }
        }
    }
}

fn upstream_call_error(e: reqwest::Error) -> Error {
    Error::Http(format!("upstream request failed: {e}"))
}
