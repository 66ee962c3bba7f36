// src/client/mod.rs
pub mod memory;
pub mod v2;
pub mod v3;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::content::Stamp;
use crate::error::ClientError;

pub use memory::MemoryClient;
pub use v2::EtcdV2Client;
pub use v3::EtcdV3Client;

/// What a config source needs from a key-value store.
///
/// Implementations must be safe to call concurrently; the source shares one
/// client across every caller and never locks around it.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Current value of `key`. `Ok(None)` when the store answered but has no value.
    async fn get(&self, key: &str) -> Result<Option<String>, ClientError>;

    /// Modification revision of `key`.
    async fn revision(&self, key: &str) -> Result<Stamp, ClientError>;

    /// Short name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type DynRemoteClient = Box<dyn RemoteClient>;

#[async_trait]
impl<T: RemoteClient + ?Sized> RemoteClient for Box<T> {
    async fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        (**self).get(key).await
    }

    async fn revision(&self, key: &str) -> Result<Stamp, ClientError> {
        (**self).revision(key).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

fn default_connect_timeout_ms() -> u64 {
    2_000
}
fn default_request_timeout_ms() -> u64 {
    5_000
}

/// Timeouts for the HTTP clients. Keeps revision probes bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClientOptions {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ClientOptions {
    pub(crate) fn http_client(&self) -> Result<reqwest::Client, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("etcd-config-source/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .timeout(Duration::from_millis(self.request_timeout_ms))
            .build()?;
        Ok(http)
    }
}

/// Read a non-success response into a `Status` error.
pub(crate) async fn status_error(resp: reqwest::Response) -> ClientError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    ClientError::Status {
        status,
        body: body.trim().chars().take(512).collect(),
    }
}
