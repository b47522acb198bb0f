//! Storj Worker Configuration
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then environment variables (including a `.env` file in the working
//! directory). The environment names match the ones the service has always
//! been deployed with (`STORJ_S3_*`, `BACKEND_TOKEN`, `PORT`).

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use crate::error::{Error, Result};

pub const ENV_ACCESS_KEY: &str = "STORJ_S3_ACCESS_KEY";
pub const ENV_SECRET_KEY: &str = "STORJ_S3_SECRET_KEY";
pub const ENV_ENDPOINT: &str = "STORJ_S3_ENDPOINT";
pub const ENV_BUCKET: &str = "STORJ_S3_BUCKET";
pub const ENV_REGION: &str = "STORJ_S3_REGION";
pub const ENV_BACKEND: &str = "STORJ_BACKEND";
pub const ENV_TOKEN: &str = "BACKEND_TOKEN";
pub const ENV_PORT: &str = "PORT";

/// Main Storj Worker configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Object storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which note store backs the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// S3-compatible gateway (Storj)
    S3,
    /// In-process map, contents are lost on restart
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s3" => Ok(StorageBackend::S3),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(Error::Config(format!("unknown storage backend '{}'", other))),
        }
    }
}

/// Object storage configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    /// S3-compatible gateway URL
    #[serde(default)]
    pub endpoint: String,

    /// Region name sent in request signatures
    #[serde(default = "default_region")]
    pub region: String,

    /// Target bucket
    #[serde(default)]
    pub bucket: String,

    #[serde(default)]
    pub access_key: String,

    #[serde(default)]
    pub secret_key: String,

    /// Use path-style addressing (`endpoint/bucket/key`)
    #[serde(default = "default_true")]
    pub path_style: bool,
}

/// API configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// HTTP API bind address
    #[serde(default = "default_api_address")]
    pub bind_address: String,

    /// Shared bearer token; `None` disables authentication
    #[serde(default)]
    pub token: Option<String>,

    /// Enable CORS
    #[serde(default)]
    pub cors_enabled: bool,

    /// Largest accepted request body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_backend() -> StorageBackend {
    StorageBackend::S3
}

fn default_region() -> String {
    "us1".to_string()
}

fn default_true() -> bool {
    true
}

fn default_api_address() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            endpoint: String::new(),
            region: default_region(),
            bucket: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
            path_style: true,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_api_address(),
            token: None,
            cors_enabled: false,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Secrets stay out of Debug output so configs can be logged.
impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("backend", &self.backend)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key", &redact(&self.access_key))
            .field("secret_key", &redact(&self.secret_key))
            .field("path_style", &self.path_style)
            .finish()
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_address", &self.bind_address)
            .field("token", &self.token.as_deref().map(redact))
            .field("cors_enabled", &self.cors_enabled)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

/// Mask a secret, keeping only whether it is set
pub fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl WorkerConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string (no validation)
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: WorkerConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Build the effective configuration for a process.
    ///
    /// The file is optional; a missing file means defaults. The `.env` file is
    /// read first so real environment variables keep precedence over it.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Ok(env_path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {:?}", env_path);
        }

        let mut config = match path {
            Some(p) if p.exists() => Self::from_file(p)?,
            Some(p) => {
                tracing::debug!("No config file at {:?}, using defaults", p);
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env_with(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// Empty values count as unset, matching how the variables behave in a
    /// `.env` file with a blank right-hand side.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_BACKEND) {
            self.storage.backend = v.parse()?;
        }
        if let Some(v) = get(ENV_ACCESS_KEY) {
            self.storage.access_key = v;
        }
        if let Some(v) = get(ENV_SECRET_KEY) {
            self.storage.secret_key = v;
        }
        if let Some(v) = get(ENV_ENDPOINT) {
            self.storage.endpoint = v;
        }
        if let Some(v) = get(ENV_BUCKET) {
            self.storage.bucket = v;
        }
        if let Some(v) = get(ENV_REGION) {
            self.storage.region = v;
        }
        if let Some(v) = get(ENV_TOKEN) {
            self.api.token = Some(v);
        }
        if let Some(v) = get(ENV_PORT) {
            let port: u16 = v
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{} must be a port number, got '{}'", ENV_PORT, v)))?;
            self.set_port(port);
        }

        Ok(())
    }

    /// Replace the port of the API bind address, keeping the host
    pub fn set_port(&mut self, port: u16) {
        let host = match self.api.bind_address.rsplit_once(':') {
            Some((host, _)) if !host.is_empty() => host.to_string(),
            _ => "0.0.0.0".to_string(),
        };
        self.api.bind_address = format!("{}:{}", host, port);
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.storage.backend == StorageBackend::S3 {
            let required = [
                (ENV_ENDPOINT, &self.storage.endpoint),
                (ENV_BUCKET, &self.storage.bucket),
                (ENV_ACCESS_KEY, &self.storage.access_key),
                (ENV_SECRET_KEY, &self.storage.secret_key),
            ];
            let missing: Vec<&str> = required
                .iter()
                .filter(|(_, value)| value.is_empty())
                .map(|(name, _)| *name)
                .collect();
            if !missing.is_empty() {
                return Err(Error::Config(format!(
                    "s3 backend requires {}",
                    missing.join(", ")
                )));
            }

            if !(self.storage.endpoint.starts_with("http://")
                || self.storage.endpoint.starts_with("https://"))
            {
                return Err(Error::Config(format!(
                    "storage.endpoint must be an http(s) URL, got '{}'",
                    self.storage.endpoint
                )));
            }
        }

        self.bind_address()?;

        if self.api.max_body_bytes == 0 {
            return Err(Error::Config("api.max_body_bytes must be greater than 0".into()));
        }

        Ok(())
    }

    /// Parsed API bind address
    pub fn bind_address(&self) -> Result<SocketAddr> {
        self.api.bind_address.parse().map_err(|_| {
            Error::Config(format!(
                "api.bind_address '{}' is not a valid socket address",
                self.api.bind_address
            ))
        })
    }

    /// Token required on authenticated endpoints, if any
    pub fn token(&self) -> Option<&str> {
        self.api.token.as_deref().filter(|t| !t.is_empty())
    }
}
