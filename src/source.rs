// src/source.rs
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use reqwest::Url;
use tracing::{debug, trace};

use crate::client::{ClientOptions, DynRemoteClient, RemoteClient};
use crate::config::SourceConfig;
use crate::content::{ContentEnvelope, Stamp};
use crate::endpoint::{EndpointDescriptor, EtcdApi};
use crate::error::{ClientError, SourceError};

/// One-time metrics registration (so series show up in exporters).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "config_source_loads_total",
            "Successful configuration document loads."
        );
        describe_counter!(
            "config_source_load_errors_total",
            "Failed loads, labelled by kind (fetch|missing)."
        );
        describe_counter!(
            "config_source_stamp_failures_total",
            "Revision probes that failed and were reported as unknown."
        );
        describe_histogram!("config_source_load_ms", "Load latency in milliseconds.");
    });
}

/// Loads a configuration document from a remote key and reports its revision.
///
/// Holds no mutable state besides the client, so `&self` calls may run
/// concurrently (share it through `Arc`). The client is owned exclusively and
/// released when the source is dropped.
pub struct RemoteConfigSource {
    endpoint: EndpointDescriptor,
    media_type: Option<String>,
    optional: bool,
    client: DynRemoteClient,
}

impl RemoteConfigSource {
    /// Wrap an already connected client.
    pub fn new(endpoint: EndpointDescriptor, client: impl RemoteClient + 'static) -> Self {
        Self::with_client(endpoint, Box::new(client))
    }

    fn with_client(endpoint: EndpointDescriptor, client: DynRemoteClient) -> Self {
        ensure_metrics_described();
        debug!(
            target: "config_source",
            uid = %endpoint.identifier(),
            client = client.name(),
            "remote config source created"
        );
        Self {
            endpoint,
            media_type: None,
            optional: false,
            client,
        }
    }

    /// Connect to etcd at `uri` with the given api and default timeouts.
    pub fn create(uri: Url, key: impl Into<String>, api: EtcdApi) -> Result<Self, ClientError> {
        let endpoint = EndpointDescriptor::new(uri, key, api);
        let client = api.create_client(endpoint.uri(), &ClientOptions::default())?;
        Ok(Self::with_client(endpoint, client))
    }

    /// Build from a meta-configuration block.
    pub fn from_config(cfg: &SourceConfig) -> Result<Self, ClientError> {
        let endpoint = cfg.endpoint()?;
        let client = endpoint.api().create_client(endpoint.uri(), &cfg.client)?;
        let mut source = Self::with_client(endpoint, client).with_optional(cfg.optional);
        if let Some(mt) = cfg.media_type.as_deref().filter(|s| !s.trim().is_empty()) {
            source = source.with_media_type(mt.trim());
        }
        Ok(source)
    }

    /// Explicit media type; wins over the key-suffix hint.
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// Mark the source as optional: a missing key is expected, not an incident.
    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn endpoint(&self) -> &EndpointDescriptor {
        &self.endpoint
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Identity of this source, stable for its whole lifetime.
    /// Same form as [`EndpointDescriptor::identifier`] (normalised uri).
    pub fn uid(&self) -> String {
        self.endpoint.identifier()
    }

    /// Configured media type, else the one implied by the key suffix.
    pub fn media_type(&self) -> Option<String> {
        self.media_type
            .clone()
            .or_else(|| self.endpoint.media_type_hint().map(str::to_string))
    }

    /// Revision of the remote document, or `None` when it cannot be determined.
    /// Never fails: a spurious reload is cheaper than a broken polling loop.
    pub async fn current_stamp(&self) -> Option<Stamp> {
        match self.client.revision(self.endpoint.key()).await {
            Ok(stamp) => Some(stamp),
            Err(e) => {
                trace!(
                    target: "config_source",
                    key = self.endpoint.key(),
                    error = %e,
                    "revision probe failed"
                );
                counter!("config_source_stamp_failures_total").increment(1);
                None
            }
        }
    }

    /// Fetch the document. Every call goes to the store; nothing is cached.
    pub async fn load(&self) -> Result<ContentEnvelope, SourceError> {
        let t0 = Instant::now();
        let result = self.fetch().await;
        histogram!("config_source_load_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        match &result {
            Ok(env) => {
                counter!("config_source_loads_total").increment(1);
                debug!(
                    target: "config_source",
                    key = self.endpoint.key(),
                    stamp = ?env.stamp(),
                    media_type = ?env.media_type(),
                    bytes = env.len(),
                    "loaded"
                );
            }
            Err(e) => {
                counter!("config_source_load_errors_total", "kind" => e.kind()).increment(1);
            }
        }
        result
    }

    async fn fetch(&self) -> Result<ContentEnvelope, SourceError> {
        let key = self.endpoint.key();
        let data = match self.client.get(key).await {
            Ok(Some(data)) => data,
            Ok(None) => {
                return Err(SourceError::KeyMissing {
                    key: key.to_string(),
                })
            }
            Err(e) => {
                trace!(target: "config_source", key, error = %e, "get operation failed");
                return Err(SourceError::Fetch {
                    key: key.to_string(),
                    source: e,
                });
            }
        };

        let mut env = ContentEnvelope::new(data);
        if let Some(mt) = self.media_type() {
            env = env.with_media_type(mt);
        }
        if let Some(stamp) = self.current_stamp().await {
            env = env.with_stamp(stamp);
        }
        Ok(env)
    }
}

impl std::fmt::Debug for RemoteConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfigSource")
            .field("endpoint", &self.endpoint)
            .field("media_type", &self.media_type)
            .field("optional", &self.optional)
            .field("client", &self.client.name())
            .finish()
    }
}

impl Drop for RemoteConfigSource {
    fn drop(&mut self) {
        debug!(
            target: "config_source",
            uid = %self.endpoint.identifier(),
            client = self.client.name(),
            "releasing remote client"
        );
    }
}
