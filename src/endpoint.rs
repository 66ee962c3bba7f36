// src/endpoint.rs
use std::fmt;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::client::{ClientOptions, DynRemoteClient};
use crate::error::ClientError;

/// Which etcd API the endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EtcdApi {
    /// Legacy keys API (`/v2/keys/...`).
    #[serde(alias = "V2")]
    V2,
    /// gRPC JSON gateway (`/v3/kv/range`).
    #[default]
    #[serde(alias = "V3")]
    V3,
}

impl EtcdApi {
    /// Client factory: one connected client per source, created at construction.
    pub fn create_client(
        self,
        uri: &Url,
        opts: &ClientOptions,
    ) -> Result<DynRemoteClient, ClientError> {
        match self {
            EtcdApi::V2 => Ok(Box::new(crate::client::v2::EtcdV2Client::new(
                uri.clone(),
                opts,
            )?)),
            EtcdApi::V3 => Ok(Box::new(crate::client::v3::EtcdV3Client::new(
                uri.clone(),
                opts,
            )?)),
        }
    }
}

impl fmt::Display for EtcdApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EtcdApi::V2 => f.write_str("v2"),
            EtcdApi::V3 => f.write_str("v3"),
        }
    }
}

impl std::str::FromStr for EtcdApi {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v2" => Ok(EtcdApi::V2),
            "v3" => Ok(EtcdApi::V3),
            other => Err(format!("unsupported etcd api '{other}'")),
        }
    }
}

/// Remote location of a configuration document: store uri, key, api variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointDescriptor {
    uri: Url,
    key: String,
    api: EtcdApi,
}

impl EndpointDescriptor {
    pub fn new(uri: Url, key: impl Into<String>, api: EtcdApi) -> Self {
        Self {
            uri,
            key: key.into(),
            api,
        }
    }

    /// Parses `uri` first; fails with `InvalidEndpoint` on garbage.
    pub fn parse(uri: &str, key: impl Into<String>, api: EtcdApi) -> Result<Self, ClientError> {
        let uri = Url::parse(uri.trim())
            .map_err(|e| ClientError::InvalidEndpoint(format!("{uri}: {e}")))?;
        Ok(Self::new(uri, key, api))
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn api(&self) -> EtcdApi {
        self.api
    }

    /// `uri#key`. Used as the identity of a source.
    ///
    /// The uri part is the parsed [`Url`], not the configured text: for http(s)
    /// an empty path renders as `/`, so `http://127.0.0.1:2379` with key
    /// `app.yaml` gives `http://127.0.0.1:2379/#app.yaml`. Two spellings of the
    /// same endpoint therefore share one identifier.
    pub fn identifier(&self) -> String {
        format!("{}#{}", self.uri, self.key)
    }

    /// Content type guessed from the key suffix ("app.json" -> application/json).
    pub fn media_type_hint(&self) -> Option<&'static str> {
        detect_media_type(&self.key)
    }
}

impl fmt::Display for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{} ({})", self.uri, self.key, self.api)
    }
}

/// Map a file-like name to a media type by its extension.
/// Only the last path segment counts, so "conf.d/app" has no suffix.
pub fn detect_media_type(name: &str) -> Option<&'static str> {
    let last = name.rsplit('/').next().unwrap_or_default();
    let (_, ext) = last.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "json" => Some("application/json"),
        "yaml" | "yml" => Some("application/yaml"),
        "properties" => Some("text/x-java-properties"),
        "toml" => Some("application/toml"),
        "conf" | "hocon" => Some("application/hocon"),
        _ => None,
    }
}
