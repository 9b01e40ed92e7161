//! Server configuration.
//!
//! Configuration loads from an optional TOML file plus environment
//! variables with the `GATEHOUSE__` prefix (e.g. `GATEHOUSE__LISTEN_ADDR`,
//! `GATEHOUSE__ADMIN__PASSWORD` — `__` separates nesting levels). The token
//! signing secret and listen address are explicit configuration; nothing is
//! compiled in.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

/// Errors produced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file or environment sources could not be read.
    #[error("failed to load configuration: {0}")]
    Load(String),
    /// The merged sources did not deserialize into a valid [`Config`].
    #[error("invalid configuration: {0}")]
    Parse(String),
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address to listen on for HTTP.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Path of the SQLite database file. When unset the server runs on the
    /// in-memory backend and loses all data on shutdown.
    #[serde(default)]
    pub data_path: Option<PathBuf>,

    /// Secret used to sign and verify bearer tokens. Required.
    pub token_secret: String,

    /// Bearer token validity in seconds.
    #[serde(default = "default_token_validity_secs")]
    pub token_validity_secs: u64,

    /// Admin account seeded at startup.
    #[serde(default)]
    pub admin: AdminConfig,
}

/// Seed credentials for the administrator account.
///
/// The seed only applies when the username is not yet registered; it never
/// overwrites an existing account.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    /// Admin username.
    #[serde(default = "default_admin_username")]
    pub username: String,
    /// Admin password (hashed before storage).
    #[serde(default = "default_admin_password")]
    pub password: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self { username: default_admin_username(), password: default_admin_password() }
    }
}

fn default_listen_addr() -> SocketAddr {
    ([127, 0, 0, 1], 3000).into()
}

fn default_token_validity_secs() -> u64 {
    3600 // 1 hour
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_admin_password() -> String {
    "Admin@000".to_string()
}

impl Config {
    /// Load configuration from an optional file plus environment variables.
    ///
    /// Environment variables use the `GATEHOUSE__` prefix with `__` as the
    /// nesting separator (e.g. `GATEHOUSE__ADMIN__USERNAME`).
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let builder = config::Config::builder();

        let builder = if let Some(path) = path {
            builder.add_source(config::File::with_name(path))
        } else {
            builder
                .add_source(config::File::with_name("gatehouse").required(false))
                .add_source(config::File::with_name("/etc/gatehouse/config").required(false))
        };

        let builder = builder.add_source(
            config::Environment::with_prefix("GATEHOUSE").separator("__").try_parsing(true),
        );

        let config = builder.build().map_err(|e| ConfigError::Load(e.to_string()))?;

        config.try_deserialize().map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Create a configuration for testing.
    #[allow(clippy::unwrap_used)]
    pub fn for_test() -> Self {
        Self {
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            data_path: None,
            token_secret: "test-secret-not-for-production".to_string(),
            token_validity_secs: 3600,
            admin: AdminConfig::default(),
        }
    }
}
