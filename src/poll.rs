// src/poll.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::content::{ContentEnvelope, Stamp};
use crate::error::SourceError;
use crate::source::RemoteConfigSource;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "config_poll_reloads_total",
            "Reloads triggered by a changed or unknown stamp."
        );
        describe_counter!(
            "config_poll_failures_total",
            "Reloads that failed; retried on the next tick."
        );
        describe_gauge!(
            "config_poll_last_reload_ts",
            "Unix ts of the last delivered reload."
        );
    });
}

/// Decide whether a fresh `load()` is worth it.
///
/// `last` is `None` before the first successful load. An unknown current stamp
/// always reloads, so does any change including unknown -> known.
pub fn needs_reload(last: Option<Option<Stamp>>, current: Option<Stamp>) -> bool {
    match (last, current) {
        (None, _) => true,
        (Some(_), None) => true,
        (Some(prev), Some(cur)) => prev != Some(cur),
    }
}

/// Re-polls a source on a schedule and publishes every new document.
pub struct ChangePoller {
    source: Arc<RemoteConfigSource>,
    last_seen: Option<Option<Stamp>>,
    last_reload_at: Option<DateTime<Utc>>,
}

impl ChangePoller {
    pub fn new(source: Arc<RemoteConfigSource>) -> Self {
        ensure_metrics_described();
        Self {
            source,
            last_seen: None,
            last_reload_at: None,
        }
    }

    pub fn source(&self) -> &Arc<RemoteConfigSource> {
        &self.source
    }

    /// Stamp read right before the last reload (`None` if unknown or nothing
    /// loaded yet). Can trail the stamp of the delivered envelope when the key
    /// was written during that reload.
    pub fn last_stamp(&self) -> Option<Stamp> {
        self.last_seen.flatten()
    }

    pub fn last_reload_at(&self) -> Option<DateTime<Utc>> {
        self.last_reload_at
    }

    /// One polling step: probe, and reload if needed.
    /// `Ok(None)` means nothing changed. A failed load leaves the last-seen
    /// stamp alone, so the next tick tries again.
    ///
    /// The stamp kept for the next comparison is the one read before the
    /// reload (or the envelope's, if lower). `load()` reads the value before
    /// the revision, so a write racing the reload can label old bytes with the
    /// new stamp; keeping the older stamp makes the next poll pick that write up.
    pub async fn poll_once(&mut self) -> Result<Option<ContentEnvelope>, SourceError> {
        let current = self.source.current_stamp().await;
        if !needs_reload(self.last_seen, current) {
            tracing::trace!(target: "config_poll", stamp = ?current, "no change");
            return Ok(None);
        }

        let env = self.source.load().await?;
        self.last_seen = Some(match (current, env.stamp()) {
            (Some(before), Some(loaded)) => Some(before.min(loaded)),
            (before, _) => before,
        });
        self.last_reload_at = Some(Utc::now());
        counter!("config_poll_reloads_total").increment(1);
        Ok(Some(env))
    }

    /// Spawn the polling loop. It ends when the receiving side of `tx` is dropped.
    ///
    /// The first poll runs one `interval` after spawning; call [`poll_once`]
    /// beforehand for an immediate load.
    ///
    /// [`poll_once`]: ChangePoller::poll_once
    pub fn spawn(mut self, interval: Duration, tx: mpsc::Sender<ContentEnvelope>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let uid = self.source.uid();

            loop {
                ticker.tick().await;
                if tx.is_closed() {
                    break;
                }

                match self.poll_once().await {
                    Ok(Some(env)) => {
                        tracing::info!(
                            target: "config_poll",
                            uid = %uid,
                            stamp = ?env.stamp(),
                            bytes = env.len(),
                            "configuration reloaded"
                        );
                        gauge!("config_poll_last_reload_ts").set(Utc::now().timestamp() as f64);
                        if tx.send(env).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e @ SourceError::KeyMissing { .. }) if self.source.is_optional() => {
                        tracing::debug!(target: "config_poll", uid = %uid, "{e}");
                    }
                    Err(e) => {
                        counter!("config_poll_failures_total", "kind" => e.kind()).increment(1);
                        tracing::warn!(target: "config_poll", uid = %uid, error = ?e, "reload failed: {e}");
                    }
                }
            }
            tracing::debug!(target: "config_poll", uid = %uid, "receiver gone, poller stopped");
        })
    }
}
