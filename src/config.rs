// src/config.rs
//! Meta-configuration: where the configuration document lives and how to poll it.
//!
//! ```toml
//! uri = "http://127.0.0.1:2379"
//! key = "app.yaml"
//! api = "v3"
//! media-type = "application/yaml"   # optional, overrides the key suffix
//! optional = false
//!
//! [polling]
//! interval-secs = 10
//!
//! [client]
//! connect-timeout-ms = 2000
//! request-timeout-ms = 5000
//! ```

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::ClientOptions;
use crate::endpoint::{EndpointDescriptor, EtcdApi};
use crate::error::ClientError;

pub const ENV_PATH: &str = "ETCD_SOURCE_CONFIG";
pub const ENV_URI: &str = "ETCD_SOURCE_URI";
pub const ENV_KEY: &str = "ETCD_SOURCE_KEY";
pub const ENV_API: &str = "ETCD_SOURCE_API";

const DEFAULT_TOML: &str = "config/etcd_source.toml";
const DEFAULT_JSON: &str = "config/etcd_source.json";

fn default_interval_secs() -> u64 {
    10
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PollingSettings {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl PollingSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceConfig {
    pub uri: String,
    pub key: String,
    #[serde(default)]
    pub api: EtcdApi,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub polling: PollingSettings,
    #[serde(default)]
    pub client: ClientOptions,
}

impl SourceConfig {
    pub fn new(uri: impl Into<String>, key: impl Into<String>, api: EtcdApi) -> Self {
        Self {
            uri: uri.into(),
            key: key.into(),
            api,
            media_type: None,
            optional: false,
            polling: PollingSettings::default(),
            client: ClientOptions::default(),
        }
    }

    pub fn endpoint(&self) -> Result<EndpointDescriptor, ClientError> {
        EndpointDescriptor::parse(&self.uri, self.key.trim(), self.api)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: SourceConfig = toml::from_str(s).context("parsing source config as toml")?;
        cfg.validated()
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: SourceConfig =
            serde_json::from_str(s).context("parsing source config as json")?;
        cfg.validated()
    }

    /// Load from an explicit path. Format follows the extension, then content.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading source config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_config(&content, ext.as_str())
            .with_context(|| format!("invalid source config {}", path.display()))
    }

    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $ETCD_SOURCE_CONFIG
    /// 2) config/etcd_source.toml
    /// 3) config/etcd_source.json
    /// 4) nothing on disk: built purely from $ETCD_SOURCE_URI / $ETCD_SOURCE_KEY
    pub fn load_default() -> Result<Self> {
        let base = if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_PATH} points to non-existent path"));
            }
            Some(Self::load_from(&pb)?)
        } else if Path::new(DEFAULT_TOML).exists() {
            Some(Self::load_from(Path::new(DEFAULT_TOML))?)
        } else if Path::new(DEFAULT_JSON).exists() {
            Some(Self::load_from(Path::new(DEFAULT_JSON))?)
        } else {
            None
        };

        let cfg = match base {
            Some(cfg) => cfg,
            None => {
                let uri = std::env::var(ENV_URI)
                    .map_err(|_| anyhow!("no source config found and {ENV_URI} is unset"))?;
                let key = std::env::var(ENV_KEY)
                    .map_err(|_| anyhow!("no source config found and {ENV_KEY} is unset"))?;
                Self::new(uri, key, EtcdApi::default())
            }
        };
        cfg.with_env_overrides()?.validated()
    }

    fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(uri) = std::env::var(ENV_URI) {
            self.uri = uri;
        }
        if let Ok(key) = std::env::var(ENV_KEY) {
            self.key = key;
        }
        if let Ok(api) = std::env::var(ENV_API) {
            self.api = api.parse().map_err(|e: String| anyhow!(e))?;
        }
        Ok(self)
    }

    fn validated(self) -> Result<Self> {
        if self.key.trim().is_empty() {
            bail!("source config: key must not be empty");
        }
        let endpoint = self.endpoint()?;
        if endpoint.uri().cannot_be_a_base() {
            bail!("source config: uri '{}' cannot carry a path", self.uri);
        }
        if self.polling.interval_secs == 0 {
            bail!("source config: polling interval must be at least 1s");
        }
        Ok(self)
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<SourceConfig> {
    match hint_ext {
        "toml" => SourceConfig::from_toml_str(s),
        "json" => SourceConfig::from_json_str(s),
        _ if s.trim_start().starts_with('{') => SourceConfig::from_json_str(s),
        _ => SourceConfig::from_toml_str(s),
    }
}
