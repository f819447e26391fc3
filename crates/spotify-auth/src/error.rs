//! Error types for Spotify OAuth operations

/// Errors from the authorization handshake and credential maintenance.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("state mismatch on authorization callback")]
    StateMismatch,

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("no refresh token available")]
    NoRefreshToken,

    #[error("upstream authentication failed: {0}")]
    UpstreamAuth(String),

    #[error("not authorized with Spotify")]
    NotAuthorized,
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
