//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The three secrets (GitHub client id, client secret, upload API key)
//! are loaded from env vars only, never from the TOML, to avoid leaking
//! them through config files. A missing secret does not fail startup:
//! the handlers that need it answer 500 until it is provided.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub github: GithubConfig,
    pub upload: UploadConfig,
}

/// Listener and outbound-call settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// GitHub provider settings. The endpoint URLs default to the public
/// GitHub endpoints and are overridable for tests and GitHub Enterprise.
#[derive(Debug, Deserialize)]
pub struct GithubConfig {
    /// Organization whose members may upload
    pub org: String,
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// From GITHUB_CLIENT_ID
    #[serde(skip)]
    pub client_id: Option<String>,
    /// From GITHUB_CLIENT_SECRET
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
}

/// Downstream storage API settings
#[derive(Debug, Deserialize)]
pub struct UploadConfig {
    pub url: String,
    /// From UPLOAD_API_KEY
    #[serde(skip)]
    pub api_key: Option<Secret<String>>,
}

fn default_timeout() -> u64 {
    10
}

fn default_max_connections() -> usize {
    1000
}

fn default_authorize_url() -> String {
    github_auth::AUTHORIZE_ENDPOINT.to_string()
}

fn default_token_url() -> String {
    github_auth::TOKEN_ENDPOINT.to_string()
}

fn default_api_base() -> String {
    github_auth::API_BASE.to_string()
}

fn require_http_url(name: &str, value: &str) -> common::Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(common::Error::Config(format!(
            "{name} must start with http:// or https://, got: {value}"
        )))
    }
}

/// Read an env var, treating unset and whitespace-only as absent.
fn env_secret(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from a TOML file, then overlay env-var secrets.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        require_http_url("github.authorize_url", &config.github.authorize_url)?;
        require_http_url("github.token_url", &config.github.token_url)?;
        require_http_url("github.api_base", &config.github.api_base)?;
        require_http_url("upload.url", &config.upload.url)?;

        if config.github.org.is_empty() {
            return Err(common::Error::Config("github.org must not be empty".into()));
        }
        if config.server.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        config.github.client_id = env_secret("GITHUB_CLIENT_ID");
        config.github.client_secret = env_secret("GITHUB_CLIENT_SECRET").map(Secret::new);
        config.upload.api_key = env_secret("UPLOAD_API_KEY").map(Secret::new);

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("cms-auth-gateway.toml")
    }
}
