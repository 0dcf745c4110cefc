//! Single entry point for loading configuration.

use super::merge::merge_policy;
use super::sources::{global_file, workspace_file};
use super::QueryLabConfig;
use config::{ConfigError, Environment, File};
use std::path::Path;
use tracing::debug;

/// Prefix of environment overrides, e.g. `QUERYLAB_ENDPOINT__URL`
pub const ENV_PREFIX: &str = "QUERYLAB";

/// Loads [`QueryLabConfig`] from layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, then the global file, then workspace files, then environment variables.
    pub fn load(workspace_root: &Path) -> Result<QueryLabConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let config = builder.add_source(environment()).build()?;

        let loaded: QueryLabConfig = config.try_deserialize()?;
        debug!(endpoint = %loaded.endpoint.url, "configuration loaded");
        Ok(loaded)
    }

    /// Defaults overlaid with one explicit file (and environment variables).
    pub fn load_from_file(path: &Path) -> Result<QueryLabConfig, ConfigError> {
        merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .add_source(environment())
            .build()?
            .try_deserialize()
    }

    /// Built-in defaults only.
    pub fn default() -> QueryLabConfig {
        QueryLabConfig::default()
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
