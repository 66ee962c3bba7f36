// tests/change_poller.rs
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use etcd_config_source::{
    ChangePoller, ClientError, EndpointDescriptor, EtcdApi, MemoryClient, RemoteClient,
    RemoteConfigSource, SourceError, Stamp,
};
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Writes `next` to the store right after its first read, i.e. between the
/// value fetch and the revision lookup of a `load()`.
struct WriteAfterRead {
    store: MemoryClient,
    next: &'static str,
    armed: Arc<AtomicBool>,
}

#[async_trait]
impl RemoteClient for WriteAfterRead {
    async fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        let value = self.store.get(key).await?;
        if self.armed.swap(false, Ordering::SeqCst) {
            self.store.put(key, self.next);
        }
        Ok(value)
    }

    async fn revision(&self, key: &str) -> Result<Stamp, ClientError> {
        self.store.revision(key).await
    }

    fn name(&self) -> &'static str {
        "write-after-read"
    }
}

/// Always serves the same value and never knows its revision.
struct Unstamped {
    gets: Arc<AtomicUsize>,
}

#[async_trait]
impl RemoteClient for Unstamped {
    async fn get(&self, _key: &str) -> Result<Option<String>, ClientError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Ok(Some("a: 1".into()))
    }

    async fn revision(&self, _key: &str) -> Result<Stamp, ClientError> {
        Err(ClientError::Unavailable("no revision".into()))
    }

    fn name(&self) -> &'static str {
        "unstamped"
    }
}

fn source(store: &MemoryClient, key: &str) -> Arc<RemoteConfigSource> {
    let ep = EndpointDescriptor::parse("store://host:2379", key, EtcdApi::V3).unwrap();
    Arc::new(RemoteConfigSource::new(ep, store.clone()))
}

#[tokio::test]
async fn reloads_only_when_stamp_moves() {
    let store = MemoryClient::new();
    store.put("app.yaml", "v: 1");
    let mut poller = ChangePoller::new(source(&store, "app.yaml"));

    let first = poller.poll_once().await.unwrap().expect("initial load");
    assert_eq!(first.stamp(), Some(Stamp::new(1)));
    assert!(poller.last_reload_at().is_some());

    assert!(poller.poll_once().await.unwrap().is_none());
    assert!(poller.poll_once().await.unwrap().is_none());

    store.put("app.yaml", "v: 2");
    let second = poller.poll_once().await.unwrap().expect("changed");
    assert_eq!(second.as_str(), "v: 2");
    assert_eq!(poller.last_stamp(), Some(Stamp::new(2)));
}

#[tokio::test]
async fn failed_reload_is_retried_next_poll() {
    let store = MemoryClient::new();
    let mut poller = ChangePoller::new(source(&store, "app.yaml"));

    let err = poller.poll_once().await.unwrap_err();
    assert!(matches!(err, SourceError::KeyMissing { .. }));
    assert_eq!(poller.last_stamp(), None);

    store.put("app.yaml", "v: 1");
    assert!(poller.poll_once().await.unwrap().is_some());
}

#[tokio::test]
async fn unknown_stamp_reloads_every_poll() {
    let store = MemoryClient::new();
    store.put("app.yaml", "v: 1");
    let mut poller = ChangePoller::new(source(&store, "app.yaml"));
    poller.poll_once().await.unwrap();

    // partition: probe turns unknown, reload is attempted and fails
    store.set_unreachable(true);
    assert!(matches!(
        poller.poll_once().await,
        Err(SourceError::Fetch { .. })
    ));
    store.set_unreachable(false);

    // same stamp as before the partition: nothing to do
    assert!(poller.poll_once().await.unwrap().is_none());
}

#[tokio::test]
async fn spawned_poller_publishes_changes() {
    let store = MemoryClient::new();
    store.put("app.json", r#"{"v":1}"#);
    let poller = ChangePoller::new(source(&store, "app.json"));

    let (tx, mut rx) = mpsc::channel(4);
    let handle = poller.spawn(Duration::from_millis(20), tx);

    let first = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("first tick, one interval in")
        .expect("envelope");
    assert_eq!(first.stamp(), Some(Stamp::new(1)));

    store.put("app.json", r#"{"v":2}"#);
    let second = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("change tick")
        .expect("envelope");
    assert_eq!(second.as_str(), r#"{"v":2}"#);
    assert_eq!(second.stamp(), Some(Stamp::new(2)));

    drop(rx);
    timeout(Duration::from_secs(2), handle)
        .await
        .expect("poller stops once the receiver is gone")
        .unwrap();
}

#[tokio::test]
async fn write_during_reload_is_picked_up_next_poll() {
    let store = MemoryClient::new();
    store.put("app.yaml", "v: 1");
    let armed = Arc::new(AtomicBool::new(false));
    let racing = WriteAfterRead {
        store: store.clone(),
        next: "v: 3",
        armed: armed.clone(),
    };
    let ep = EndpointDescriptor::parse("store://host:2379", "app.yaml", EtcdApi::V3).unwrap();
    let mut poller = ChangePoller::new(Arc::new(RemoteConfigSource::new(ep, racing)));
    poller.poll_once().await.unwrap().expect("initial load");

    store.put("app.yaml", "v: 2");
    armed.store(true, Ordering::SeqCst);
    let raced = poller.poll_once().await.unwrap().expect("changed");
    // old bytes, new stamp
    assert_eq!(raced.as_str(), "v: 2");
    assert_eq!(raced.stamp(), Some(Stamp::new(3)));
    assert_eq!(poller.last_stamp(), Some(Stamp::new(2)));

    let latest = poller.poll_once().await.unwrap().expect("write seen");
    assert_eq!(latest.as_str(), "v: 3");
    assert_eq!(latest.stamp(), Some(Stamp::new(3)));
    assert!(poller.poll_once().await.unwrap().is_none());
}

#[tokio::test]
async fn spawn_after_initial_poll_does_not_repeat_it() {
    let gets = Arc::new(AtomicUsize::new(0));
    let ep = EndpointDescriptor::parse("store://host:2379", "app.yaml", EtcdApi::V3).unwrap();
    let src = RemoteConfigSource::new(ep, Unstamped { gets: gets.clone() });
    let mut poller = ChangePoller::new(Arc::new(src));
    poller.poll_once().await.unwrap().expect("initial load");

    let (tx, mut rx) = mpsc::channel(4);
    let handle = poller.spawn(Duration::from_secs(60), tx);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(rx.try_recv().is_err());
    assert_eq!(gets.load(Ordering::SeqCst), 1);
    handle.abort();
}
