//! Spotify OAuth constants
//!
//! Endpoint defaults and the fixed scope list requested by the relay. The
//! client id and secret are deployment configuration, not constants.

/// Accounts service hosting `/authorize` and `/api/token`
pub const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.spotify.com";

/// Web API base; resource paths are appended under `/v1`
pub const DEFAULT_API_URL: &str = "https://api.spotify.com";

/// Scopes requested on every authorization attempt.
/// Covers the liked-songs library, the profile probe, and playlist read/write
/// for public, private and collaborative playlists.
pub const SCOPES: &str = "user-library-read user-read-private user-read-email playlist-modify-public playlist-read-private playlist-read-collaborative playlist-modify-private";

/// Cookie carrying the anti-forgery state across the authorization redirect
pub const STATE_COOKIE: &str = "spotify_auth_state";

/// Length of the generated state token
pub const STATE_LENGTH: usize = 16;
