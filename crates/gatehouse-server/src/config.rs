use gatehouse_auth::AuthConfig;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Authentication and session configuration
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum AppConfigError {
    #[error("config build error: {0}")]
    Build(#[from] ::config::ConfigError),

    #[error("{0}")]
    Invalid(String),

    #[error("auth: {0}")]
    Auth(#[from] gatehouse_auth::ConfigError),
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), AppConfigError> {
        if self.server.port == 0 {
            return Err(AppConfigError::Invalid("server.port must be > 0".into()));
        }
        if self.server.request_timeout_ms == 0 {
            return Err(AppConfigError::Invalid(
                "server.request_timeout_ms must be > 0".into(),
            ));
        }
        if self.server.body_limit_bytes == 0 {
            return Err(AppConfigError::Invalid(
                "server.body_limit_bytes must be > 0".into(),
            ));
        }
        self.addr()?;

        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(AppConfigError::Invalid(format!(
                "logging.level must be one of {valid_levels:?}"
            )));
        }

        if self.storage.backend == StorageBackend::Postgres {
            let url = self.storage.postgres.url.as_deref().unwrap_or("");
            if url.is_empty() {
                return Err(AppConfigError::Invalid(
                    "storage.backend=postgres requires storage.postgres.url".into(),
                ));
            }
            if self.storage.postgres.pool_size == 0 {
                return Err(AppConfigError::Invalid(
                    "storage.postgres.pool_size must be > 0".into(),
                ));
            }
        }

        self.auth.validate()?;
        Ok(())
    }

    pub fn addr(&self) -> Result<SocketAddr, AppConfigError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| AppConfigError::Invalid(format!("server.host/port: {e}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout_ms() -> u64 {
    30_000
}
fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_ms: default_request_timeout_ms(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub postgres: PostgresStorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresStorageConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_pool_size() -> u32 {
    10
}
fn default_connect_timeout_secs() -> u64 {
    5
}

impl Default for PostgresStorageConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: default_pool_size(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::{AppConfig, AppConfigError};
    use config::{Config, Environment, File, FileFormat, Map};
    use std::path::PathBuf;

    /// Environment variable prefix, e.g. `GATEHOUSE__SERVER__PORT=9090`.
    pub const ENV_PREFIX: &str = "GATEHOUSE";

    fn env_source(vars: Option<Map<String, String>>) -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .source(vars)
    }

    /// Loads the optional TOML file at `path` (default `gatehouse.toml`),
    /// overlays `GATEHOUSE__*` variables and validates the result.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, AppConfigError> {
        let pathbuf = PathBuf::from(path.unwrap_or("gatehouse.toml"));
        let mut builder = Config::builder();
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        build(builder.add_source(env_source(None)))
    }

    /// Same as [`load_config`] over an inline TOML document and an explicit
    /// variable map instead of the process environment.
    pub fn load_config_from(
        toml: &str,
        vars: Map<String, String>,
    ) -> Result<AppConfig, AppConfigError> {
        let builder = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .add_source(env_source(Some(vars)));
        build(builder)
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<AppConfig, AppConfigError> {
        let merged: AppConfig = builder.build()?.try_deserialize()?;
        merged.validate()?;
        Ok(merged)
    }
}
