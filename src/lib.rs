// src/lib.rs
//! Remote configuration source backed by an etcd key.
//!
//! A [`RemoteConfigSource`] fetches one configuration document from a key,
//! reports the document's revision as a [`Stamp`] and hands the raw bytes plus
//! an optional media type to whatever parses configuration. A [`ChangePoller`]
//! re-polls the stamp on a schedule and reloads only when it moved.
//!
//! ```ignore
//! let source = RemoteConfigSource::create(
//!     "http://127.0.0.1:2379".parse()?,
//!     "app.yaml",
//!     EtcdApi::V3,
//! )?;
//! let env = source.load().await?;
//! assert_eq!(env.media_type(), Some("application/yaml"));
//! ```

pub mod client;
pub mod config;
pub mod content;
pub mod endpoint;
pub mod error;
pub mod poll;
pub mod source;

// ---- Re-exports for stable public API ----
pub use crate::client::{ClientOptions, MemoryClient, RemoteClient};
pub use crate::config::SourceConfig;
pub use crate::content::{ContentEnvelope, Stamp};
pub use crate::endpoint::{EndpointDescriptor, EtcdApi};
pub use crate::error::{ClientError, SourceError};
pub use crate::poll::ChangePoller;
pub use crate::source::RemoteConfigSource;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// Build the source described by `cfg`, load it once, and start polling.
///
/// Returns the first document, the receiver for later ones, and the poller
/// task. The initial load failing is returned as an error unless the source
/// is optional, in which case polling starts anyway.
pub async fn watch(
    cfg: &SourceConfig,
) -> anyhow::Result<(
    Option<ContentEnvelope>,
    mpsc::Receiver<ContentEnvelope>,
    JoinHandle<()>,
)> {
    let source = Arc::new(RemoteConfigSource::from_config(cfg)?);
    let mut poller = ChangePoller::new(source.clone());

    let first = match poller.poll_once().await {
        Ok(env) => env,
        Err(e @ SourceError::KeyMissing { .. }) if source.is_optional() => {
            info!(uid = %source.uid(), "optional source not present yet: {e}");
            None
        }
        Err(e) => return Err(e.into()),
    };

    let (tx, rx) = mpsc::channel(8);
    let handle = poller.spawn(cfg.polling.interval(), tx);
    Ok((first, rx, handle))
}
