//! Configuration System
//!
//! Layered configuration: built-in defaults, the global file, workspace files and
//! `QUERYLAB_*` environment variables, deserialized into [`QueryLabConfig`].

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::session::{HeaderOverrides, DEFAULT_COOKIE_TTL_DAYS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod facade;
mod merge;
mod sources;

pub use facade::{ConfigLoader, ENV_PREFIX};
pub use sources::global_file::global_config_path;

pub const DEFAULT_ENDPOINT_URL: &str = "http://localhost:4000/graphql";
pub const DEFAULT_SHARE_BASE_URL: &str = "http://localhost:4000/graphiql";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryLabConfig {
    #[serde(default)]
    pub endpoint: EndpointConfig,

    #[serde(default)]
    pub snapshot: SnapshotConfig,

    #[serde(default)]
    pub mobile: MobileConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// GraphQL endpoint the workbench talks to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_endpoint_url")]
    pub url: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Upper bound for a single reply; event streams are bounded only until their headers arrive
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_endpoint_url() -> String {
    DEFAULT_ENDPOINT_URL.to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: default_endpoint_url(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Share URL settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Origin and path of the workbench page; share URLs append `?snapshot=<id>`
    #[serde(default = "default_share_base_url")]
    pub share_base_url: String,
}

fn default_share_base_url() -> String {
    DEFAULT_SHARE_BASE_URL.to_string()
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            share_base_url: default_share_base_url(),
        }
    }
}

/// Mobile identity settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobileConfig {
    /// Lifetime of cookies reissued when leaving mobile identity
    #[serde(default = "default_cookie_ttl")]
    pub cookie_ttl_days: i64,

    /// Headers pre-filled on `mobile activate`; command-line headers win
    #[serde(default)]
    pub default_headers: HeaderOverrides,
}

fn default_cookie_ttl() -> i64 {
    DEFAULT_COOKIE_TTL_DAYS
}

impl Default for MobileConfig {
    fn default() -> Self {
        Self {
            cookie_ttl_days: default_cookie_ttl(),
            default_headers: HeaderOverrides::new(),
        }
    }
}

/// Where workbench state is persisted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Overrides the XDG data directory
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Endpoint(String),
    Snapshot(String),
    Mobile(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Endpoint(msg) => write!(f, "Endpoint: {}", msg),
            ValidationError::Snapshot(msg) => write!(f, "Snapshot: {}", msg),
            ValidationError::Mobile(msg) => write!(f, "Mobile: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

fn is_http_url(text: &str) -> bool {
    reqwest::Url::parse(text)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

impl QueryLabConfig {
    /// Validate the entire configuration, collecting every problem.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if !is_http_url(&self.endpoint.url) {
            errors.push(ValidationError::Endpoint(format!(
                "url '{}' is not an http(s) URL",
                self.endpoint.url
            )));
        }
        if self.endpoint.request_timeout_secs == 0 {
            errors.push(ValidationError::Endpoint(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        if !is_http_url(&self.snapshot.share_base_url) {
            errors.push(ValidationError::Snapshot(format!(
                "share_base_url '{}' is not an http(s) URL",
                self.snapshot.share_base_url
            )));
        }
        if self.mobile.cookie_ttl_days <= 0 {
            errors.push(ValidationError::Mobile(
                "cookie_ttl_days must be positive".to_string(),
            ));
        }
        for name in self.mobile.default_headers.keys() {
            if name.trim().is_empty() {
                errors.push(ValidationError::Mobile(
                    "default_headers contains an empty header name".to_string(),
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Load and validate, turning every failure into an [`ApiError`].
    pub fn load_validated(
        workspace_root: &Path,
        explicit_file: Option<&Path>,
    ) -> Result<Self, ApiError> {
        let config = match explicit_file {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(workspace_root)?,
        };
        config.validate().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                messages.join("\n")
            ))
        })?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ApiError> {
        toml::to_string_pretty(self)
            .map_err(|e| ApiError::ConfigError(format!("Failed to serialize configuration: {}", e)))
    }

    /// Write this configuration to `config/config.toml` under the workspace. An existing
    /// file is only replaced with `force`.
    pub fn write_workspace_file(&self, workspace_root: &Path, force: bool) -> Result<PathBuf, ApiError> {
        let path = workspace_root.join("config").join("config.toml");
        if path.exists() && !force {
            return Err(ApiError::ConfigError(format!(
                "{} already exists (use --force to overwrite)",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, self.to_toml()?)?;
        Ok(path)
    }
}
