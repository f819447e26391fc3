//! In-memory credential storage
//!
//! Holds the single live access/refresh pair for the relay. Nothing is
//! persisted: a restart means the user goes through `/login` again. Each write
//! happens under one lock, so readers never see a half-updated pair.

use std::fmt;

use tokio::sync::Mutex;
use tracing::debug;

/// The current access and refresh tokens. An empty string means "not held".
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    pub fn has_access(&self) -> bool {
        !self.access_token.is_empty()
    }

    pub fn has_refresh(&self) -> bool {
        !self.refresh_token.is_empty()
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(token: &str) -> &'static str {
            if token.is_empty() { "<none>" } else { "[REDACTED]" }
        }
        f.debug_struct("CredentialPair")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .finish()
    }
}

/// Shared holder of the live credential pair.
#[derive(Debug, Default)]
pub struct CredentialStore {
    state: Mutex<CredentialPair>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone of the current pair.
    pub async fn get(&self) -> CredentialPair {
        self.state.lock().await.clone()
    }

    /// Replace the pair wholesale (initial grant).
    pub async fn set(&self, pair: CredentialPair) {
        let mut state = self.state.lock().await;
        *state = pair;
        debug!("stored new credential pair");
    }

    /// Record a refreshed access token. The refresh token is only replaced
    /// when the authorization server rotated it.
    pub async fn update_access(&self, access_token: String, rotated_refresh: Option<String>) {
        let mut state = self.state.lock().await;
        state.access_token = access_token;
        if let Some(refresh) = rotated_refresh.filter(|r| !r.is_empty()) {
            state.refresh_token = refresh;
            debug!("refresh token rotated");
        }
        debug!("updated access token");
    }

    pub async fn access_token(&self) -> String {
        self.state.lock().await.access_token.clone()
    }

    /// The refresh token, if one is held.
    pub async fn refresh_token(&self) -> Option<String> {
        let state = self.state.lock().await;
        state
            .has_refresh()
            .then(|| state.refresh_token.clone())
    }

    /// Whether an access token is currently held (valid or not).
    pub async fn is_authorized(&self) -> bool {
        self.state.lock().await.has_access()
    }
}
