//! Client registration and endpoint layout for the OAuth session

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::Secret;

use crate::constants::{DEFAULT_ACCOUNTS_URL, DEFAULT_API_URL};

/// Registered application identity plus the base URLs it talks to.
///
/// The base URLs default to the public Spotify hosts and are overridable so
/// tests (and staging setups) can point the session at a local server.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub redirect_uri: String,
    pub accounts_url: String,
    pub api_url: String,
}

impl OAuthConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: Secret<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            redirect_uri: redirect_uri.into(),
            accounts_url: DEFAULT_ACCOUNTS_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    pub fn with_accounts_url(mut self, url: impl Into<String>) -> Self {
        self.accounts_url = url.into();
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn authorize_endpoint(&self) -> String {
        format!("{}/authorize", self.accounts_url.trim_end_matches('/'))
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}/api/token", self.accounts_url.trim_end_matches('/'))
    }

    /// Web API endpoint for a path relative to `/v1`, e.g. `me/playlists`.
    pub fn api_endpoint(&self, path: &str) -> String {
        format!(
            "{}/v1/{}",
            self.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// `Authorization` header value for the token endpoint:
    /// `Basic base64(client_id:client_secret)`.
    pub fn basic_authorization(&self) -> String {
        let raw = format!("{}:{}", self.client_id, self.client_secret.expose());
        format!("Basic {}", STANDARD.encode(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OAuthConfig {
        OAuthConfig::new(
            "client-abc",
            Secret::new("shh".to_string()),
            "http://localhost:3000/callback",
        )
    }

    #[test]
    fn defaults_point_at_spotify() {
        let config = config();
        assert_eq!(
            config.authorize_endpoint(),
            "https://accounts.spotify.com/authorize"
        );
        assert_eq!(
            config.token_endpoint(),
            "https://accounts.spotify.com/api/token"
        );
        assert_eq!(config.api_endpoint("me"), "https://api.spotify.com/v1/me");
    }

    #[test]
    fn overridden_urls_tolerate_trailing_slash() {
        let config = config()
            .with_accounts_url("http://127.0.0.1:9000/")
            .with_api_url("http://127.0.0.1:9001/");
        assert_eq!(config.token_endpoint(), "http://127.0.0.1:9000/api/token");
        assert_eq!(
            config.api_endpoint("/me/tracks"),
            "http://127.0.0.1:9001/v1/me/tracks"
        );
    }

    #[test]
    fn basic_authorization_encodes_id_and_secret() {
        // base64("client-abc:shh")
        assert_eq!(
            config().basic_authorization(),
            "Basic Y2xpZW50LWFiYzpzaGg="
        );
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let debug = format!("{:?}", config());
        assert!(!debug.contains("shh"), "got: {debug}");
    }
}
