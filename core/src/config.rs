//! Client configuration.
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `TILLBOOK_*` environment variables.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;
use crate::normalize::DEFAULT_COLLECTION_KEYS;
use crate::pagination::DEFAULT_PER_PAGE;

pub const DEFAULT_CONFIG_PATH: &str = "config/tillbook.toml";
pub const ENV_PREFIX: &str = "TILLBOOK";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_prefix: String,
    pub tenant_slug: Option<String>,
    pub timeout_secs: u64,
    pub default_per_page: u64,
    pub collection_keys: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            api_prefix: "/api/v1".to_string(),
            tenant_slug: None,
            timeout_secs: 30,
            default_per_page: DEFAULT_PER_PAGE,
            collection_keys: DEFAULT_COLLECTION_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl ClientConfig {
    /// Load from `path` (or the default path) and the environment. A missing
    /// file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("collection_keys"),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
