//! etcd-config-watch: load a configuration document from etcd and log every change.
//!
//! Usage:
//!   etcd-config-watch [path/to/etcd_source.toml]
//!
//! Without a path the config is looked up via $ETCD_SOURCE_CONFIG, then
//! config/etcd_source.toml, then config/etcd_source.json, and
//! $ETCD_SOURCE_URI / $ETCD_SOURCE_KEY / $ETCD_SOURCE_API override it.
//! An explicit path is used as-is.
//!
//! LOG_FORMAT=json switches to JSON log lines; RUST_LOG tunes the filter.

use std::path::PathBuf;

use anyhow::{Context, Result};
use etcd_config_source::{ContentEnvelope, SourceConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("etcd_config_source=info,config_poll=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn log_envelope(env: &ContentEnvelope) {
    tracing::info!(
        stamp = ?env.stamp(),
        media_type = env.media_type().unwrap_or("(default)"),
        bytes = env.len(),
        "configuration document"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => SourceConfig::load_from(&path)?,
        None => SourceConfig::load_default()?,
    };
    tracing::info!(
        uri = %cfg.uri,
        key = %cfg.key,
        api = %cfg.api,
        interval_secs = cfg.polling.interval_secs,
        "starting config watch"
    );

    let (first, mut rx, handle) = etcd_config_source::watch(&cfg)
        .await
        .context("initial load")?;
    if let Some(env) = &first {
        log_envelope(env);
    }

    loop {
        tokio::select! {
            next = rx.recv() => match next {
                Some(env) => log_envelope(&env),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
        }
    }

    handle.abort();
    Ok(())
}
