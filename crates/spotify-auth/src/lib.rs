//! Spotify OAuth session management
//!
//! Owns the authorization-code handshake, the in-memory credential pair, and
//! the probe-then-refresh logic that keeps the access token usable. The relay
//! binary holds one [`Session`] and calls into it from its handlers.
//!
//! Credential flow:
//! 1. `/login` calls `state::generate_state()` + `Session::authorization_url()`
//! 2. User authorizes on accounts.spotify.com and is redirected back
//! 3. `/callback` calls `Session::complete_authorization()` with the code
//! 4. `CredentialStore::set()` holds the issued pair
//! 5. Every protected request runs `Session::guard()` first
//! 6. Resource calls go through `Session::with_authenticated_call()`

pub mod config;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod session;
pub mod state;
pub mod token;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::OAuthConfig;
pub use constants::*;
pub use credentials::{CredentialPair, CredentialStore};
pub use error::{Error, Result};
pub use session::{GuardOutcome, Session};
pub use state::{build_authorization_url, generate_state};
pub use token::{TokenResponse, exchange_code, probe_profile, refresh_token};
