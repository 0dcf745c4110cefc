//! Merge rules: defaults and override order.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with the built-in defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("endpoint.url", crate::config::DEFAULT_ENDPOINT_URL)?
        .set_default("endpoint.connect_timeout_secs", 10)?
        .set_default("endpoint.request_timeout_secs", 120)?
        .set_default("snapshot.share_base_url", crate::config::DEFAULT_SHARE_BASE_URL)?
        .set_default("mobile.cookie_ttl_days", 10)
}
