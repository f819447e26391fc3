//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults. The client secret
//! is loaded from SPOTIFY_CLIENT_SECRET or client_secret_file, never from the
//! TOML directly, so it cannot leak through a checked-in config.

use common::Secret;
use serde::Deserialize;
use spotify_auth::{DEFAULT_ACCOUNTS_URL, DEFAULT_API_URL, OAuthConfig};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "spotify-relay.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub spotify: SpotifyConfig,
}

/// Inbound HTTP settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Front-end landing page that receives the tokens after login
    pub frontend_url: String,
    /// Browser origin allowed to call the relay with credentials
    pub cors_origin: String,
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            frontend_url: "http://localhost:3001/test".to_string(),
            cors_origin: "http://localhost:3001".to_string(),
            max_connections: 1000,
        }
    }
}

/// Spotify application registration
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file containing the client secret (alternative to SPOTIFY_CLIENT_SECRET)
    pub client_secret_file: Option<PathBuf>,
    pub redirect_uri: String,
    pub accounts_url: String,
    pub api_url: String,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            client_secret_file: None,
            redirect_uri: String::new(),
            accounts_url: DEFAULT_ACCOUNTS_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file, overlay environment
    /// variables, then validate.
    ///
    /// Environment overrides:
    /// - SPOTIFY_CLIENT_ID, REDIRECT_URI, PORT
    /// - SPOTIFY_CLIENT_SECRET (else `client_secret_file`)
    pub fn load(path: Option<&Path>) -> common::Result<Self> {
        let contents = match path {
            Some(path) => std::fs::read_to_string(path)?,
            None => String::new(),
        };
        let mut config: Config = toml::from_str(&contents)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> common::Result<()> {
        if let Ok(id) = std::env::var("SPOTIFY_CLIENT_ID") {
            self.spotify.client_id = id;
        }
        if let Ok(uri) = std::env::var("REDIRECT_URI") {
            self.spotify.redirect_uri = uri;
        }
        if let Ok(port) = std::env::var("PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .map_err(|e| common::Error::Config(format!("invalid PORT {port:?}: {e}")))?;
            self.server.listen_addr.set_port(port);
        }

        // Secret resolution: env var takes precedence over file
        if let Ok(secret) = std::env::var("SPOTIFY_CLIENT_SECRET") {
            self.spotify.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = self.spotify.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            self.spotify.client_secret = Some(Secret::new(secret.trim().to_owned()));
        }
        Ok(())
    }

    /// Presence checks for the registration values, scheme checks for URLs.
    fn validate(&self) -> common::Result<()> {
        if self.spotify.client_id.trim().is_empty() {
            return Err(common::Error::Missing("SPOTIFY_CLIENT_ID"));
        }
        if self
            .spotify
            .client_secret
            .as_ref()
            .is_none_or(|secret| secret.is_blank())
        {
            return Err(common::Error::Missing("SPOTIFY_CLIENT_SECRET"));
        }
        if self.spotify.redirect_uri.trim().is_empty() {
            return Err(common::Error::Missing("REDIRECT_URI"));
        }

        for (name, value) in [
            ("spotify.accounts_url", &self.spotify.accounts_url),
            ("spotify.api_url", &self.spotify.api_url),
            ("server.frontend_url", &self.server.frontend_url),
        ] {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{name} must start with http:// or https://, got: {value}"
                )));
            }
            if let Err(e) = url::Url::parse(value) {
                return Err(common::Error::Config(format!("{name} is not a valid URL: {e}")));
            }
        }

        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// OAuth client settings for the session.
    pub fn oauth(&self) -> common::Result<OAuthConfig> {
        let secret = self
            .spotify
            .client_secret
            .clone()
            .ok_or(common::Error::Missing("SPOTIFY_CLIENT_SECRET"))?;
        Ok(OAuthConfig::new(
            self.spotify.client_id.clone(),
            secret,
            self.spotify.redirect_uri.clone(),
        )
        .with_accounts_url(self.spotify.accounts_url.clone())
        .with_api_url(self.spotify.api_url.clone()))
    }

    /// Resolve the config file from CLI arg, CONFIG_PATH env var, or the
    /// default file name if it exists. `None` means environment-only config.
    pub fn resolve_path(cli_path: Option<&str>) -> Option<PathBuf> {
        if let Some(p) = cli_path {
            return Some(PathBuf::from(p));
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return Some(PathBuf::from(p));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "SPOTIFY_CLIENT_ID",
        "SPOTIFY_CLIENT_SECRET",
        "REDIRECT_URI",
        "PORT",
        "CONFIG_PATH",
    ];

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    /// SAFETY: Callers must hold ENV_MUTEX.
    unsafe fn clear_env() {
        for key in ENV_KEYS {
            unsafe { std::env::remove_var(key) };
        }
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("spotify-relay.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn valid_toml() -> &'static str {
        r#"
[server]
listen_addr = "127.0.0.1:8080"
frontend_url = "http://localhost:3001/test"

[spotify]
client_id = "client-from-file"
redirect_uri = "http://localhost:8080/callback"
"#
    }

    #[test]
    fn test_load_valid_config_with_env_secret() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        unsafe { set_env("SPOTIFY_CLIENT_SECRET", "secret-from-env") };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, valid_toml());

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.spotify.client_id, "client-from-file");
        assert_eq!(
            config.spotify.client_secret.as_ref().unwrap().expose(),
            "secret-from-env"
        );
        assert_eq!(config.server.listen_addr.port(), 8080);
        assert_eq!(config.server.cors_origin, "http://localhost:3001");
        assert_eq!(config.server.max_connections, 1000);
        assert_eq!(config.spotify.accounts_url, DEFAULT_ACCOUNTS_URL);
        assert_eq!(config.spotify.api_url, DEFAULT_API_URL);

        unsafe { clear_env() };
    }

    #[test]
    fn test_env_only_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        unsafe {
            set_env("SPOTIFY_CLIENT_ID", "env-client");
            set_env("SPOTIFY_CLIENT_SECRET", "env-secret");
            set_env("REDIRECT_URI", "http://localhost:3000/callback");
            set_env("PORT", "4000");
        }

        let config = Config::load(None).unwrap();
        assert_eq!(config.spotify.client_id, "env-client");
        assert_eq!(config.spotify.redirect_uri, "http://localhost:3000/callback");
        assert_eq!(config.server.listen_addr.port(), 4000);

        let oauth = config.oauth().unwrap();
        assert_eq!(oauth.client_id, "env-client");
        assert_eq!(oauth.token_endpoint(), "https://accounts.spotify.com/api/token");

        unsafe { clear_env() };
    }

    #[test]
    fn test_env_overrides_file_values() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        unsafe {
            set_env("SPOTIFY_CLIENT_ID", "client-from-env");
            set_env("SPOTIFY_CLIENT_SECRET", "s");
        }
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, valid_toml());

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.spotify.client_id, "client-from-env");

        unsafe { clear_env() };
    }

    #[test]
    fn test_secret_from_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        let dir = tempfile::tempdir().unwrap();
        let secret_path = dir.path().join("client_secret");
        std::fs::write(&secret_path, "secret-from-file\n").unwrap();
        let path = write_config(
            &dir,
            &format!(
                r#"
[spotify]
client_id = "c"
redirect_uri = "http://localhost:3000/callback"
client_secret_file = "{}"
"#,
                secret_path.display()
            ),
        );

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(
            config.spotify.client_secret.as_ref().unwrap().expose(),
            "secret-from-file"
        );
    }

    #[test]
    fn test_secret_env_overrides_nonexistent_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        unsafe { set_env("SPOTIFY_CLIENT_SECRET", "env-wins") };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[spotify]
client_id = "c"
redirect_uri = "http://localhost:3000/callback"
client_secret_file = "/nonexistent/path/client_secret"
"#,
        );

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(
            config.spotify.client_secret.as_ref().unwrap().expose(),
            "env-wins"
        );

        unsafe { clear_env() };
    }

    #[test]
    fn test_missing_secret_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, valid_toml());

        let err = Config::load(Some(&path)).unwrap_err();
        assert!(
            matches!(err, common::Error::Missing("SPOTIFY_CLIENT_SECRET")),
            "got: {err}"
        );
    }

    #[test]
    fn test_blank_secret_file_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        let dir = tempfile::tempdir().unwrap();
        let secret_path = dir.path().join("client_secret");
        std::fs::write(&secret_path, "  \n  ").unwrap();
        let path = write_config(
            &dir,
            &format!(
                r#"
[spotify]
client_id = "c"
redirect_uri = "http://localhost:3000/callback"
client_secret_file = "{}"
"#,
                secret_path.display()
            ),
        );

        assert!(matches!(
            Config::load(Some(&path)),
            Err(common::Error::Missing("SPOTIFY_CLIENT_SECRET"))
        ));
    }

    #[test]
    fn test_missing_client_id_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        unsafe {
            set_env("SPOTIFY_CLIENT_SECRET", "s");
            set_env("REDIRECT_URI", "http://localhost:3000/callback");
        }

        assert!(matches!(
            Config::load(None),
            Err(common::Error::Missing("SPOTIFY_CLIENT_ID"))
        ));

        unsafe { clear_env() };
    }

    #[test]
    fn test_missing_redirect_uri_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        unsafe {
            set_env("SPOTIFY_CLIENT_ID", "c");
            set_env("SPOTIFY_CLIENT_SECRET", "s");
        }

        assert!(matches!(
            Config::load(None),
            Err(common::Error::Missing("REDIRECT_URI"))
        ));

        unsafe { clear_env() };
    }

    #[test]
    fn test_invalid_api_url_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        unsafe { set_env("SPOTIFY_CLIENT_SECRET", "s") };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[spotify]
client_id = "c"
redirect_uri = "http://localhost:3000/callback"
api_url = "api.spotify.com"
"#,
        );

        let err = Config::load(Some(&path)).unwrap_err().to_string();
        assert!(
            err.contains("spotify.api_url must start with http"),
            "error message should explain the issue, got: {err}"
        );

        unsafe { clear_env() };
    }

    #[test]
    fn test_invalid_port_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        unsafe {
            set_env("SPOTIFY_CLIENT_ID", "c");
            set_env("SPOTIFY_CLIENT_SECRET", "s");
            set_env("REDIRECT_URI", "http://localhost:3000/callback");
            set_env("PORT", "not-a-port");
        }

        assert!(matches!(Config::load(None), Err(common::Error::Config(_))));

        unsafe { clear_env() };
    }

    #[test]
    fn test_zero_max_connections_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        unsafe { set_env("SPOTIFY_CLIENT_SECRET", "s") };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[server]
max_connections = 0

[spotify]
client_id = "c"
redirect_uri = "http://localhost:3000/callback"
"#,
        );

        assert!(Config::load(Some(&path)).is_err());

        unsafe { clear_env() };
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Some(Path::new("/nonexistent/path/config.toml")));
        assert!(matches!(result, Err(common::Error::Io(_))));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");
        assert!(matches!(
            Config::load(Some(&path)),
            Err(common::Error::Toml(_))
        ));
    }

    #[test]
    fn test_resolve_path_cli_overrides_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/should-lose.toml") };
        let path = Config::resolve_path(Some("/cli/wins.toml"));
        assert_eq!(
            path,
            Some(PathBuf::from("/cli/wins.toml")),
            "CLI arg must take precedence over CONFIG_PATH env var"
        );
        unsafe { clear_env() };
    }

    #[test]
    fn test_resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        let path = Config::resolve_path(None);
        assert_eq!(path, Some(PathBuf::from("/env/path.toml")));
        unsafe { clear_env() };
    }
}
