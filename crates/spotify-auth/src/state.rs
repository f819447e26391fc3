//! Anti-forgery state and the authorization redirect URL
//!
//! The state token binds the callback to the `/login` request that started
//! the flow. It only needs to be unpredictable to a third party; it is never
//! used as key material.

use rand::RngExt;

use crate::config::OAuthConfig;
use crate::constants::{SCOPES, STATE_LENGTH};

const STATE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a fresh state token of `STATE_LENGTH` alphanumeric characters.
pub fn generate_state() -> String {
    let mut rng = rand::rng();
    (0..STATE_LENGTH)
        .map(|_| STATE_ALPHABET[rng.random_range(0..STATE_ALPHABET.len())] as char)
        .collect()
}

/// Build the `/authorize` URL the browser is redirected to.
pub fn build_authorization_url(config: &OAuthConfig, state: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("response_type", "code")
        .append_pair("client_id", &config.client_id)
        .append_pair("scope", SCOPES)
        .append_pair("redirect_uri", &config.redirect_uri)
        .append_pair("state", state)
        .finish();
    format!("{}?{query}", config.authorize_endpoint())
}
