//! Common test utilities.
//!
//! A tiny fake etcd speaking the v2 keys API and the v3 JSON gateway, served
//! by axum on an ephemeral port. Import with `mod common;` in test files.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::{json, Value};

/// Key that makes both APIs answer 500.
pub const BOOM_KEY: &str = "boom";

#[derive(Default)]
struct Inner {
    revision: i64,
    entries: HashMap<String, (String, i64)>,
    dirs: HashSet<String>,
}

#[derive(Clone, Default)]
pub struct FakeEtcd {
    inner: Arc<Mutex<Inner>>,
}

impl FakeEtcd {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: &str, value: &str) -> i64 {
        let mut g = self.inner.lock().unwrap();
        g.revision += 1;
        let rev = g.revision;
        g.entries.insert(key.to_string(), (value.to_string(), rev));
        rev
    }

    pub fn mkdir(&self, key: &str) {
        self.inner.lock().unwrap().dirs.insert(key.to_string());
    }

    fn lookup(&self, key: &str) -> (i64, Option<(String, i64)>, bool) {
        let g = self.inner.lock().unwrap();
        (
            g.revision,
            g.entries.get(key).cloned(),
            g.dirs.contains(key),
        )
    }
}

async fn v2_get(State(etcd): State<FakeEtcd>, Path(key): Path<String>) -> (StatusCode, Json<Value>) {
    if key == BOOM_KEY {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "raft internal error" })),
        );
    }
    let (index, entry, dir) = etcd.lookup(&key);
    if dir {
        return (
            StatusCode::OK,
            Json(json!({
                "action": "get",
                "node": { "key": format!("/{key}"), "dir": true, "modifiedIndex": 3, "createdIndex": 3 }
            })),
        );
    }
    match entry {
        Some((value, rev)) => (
            StatusCode::OK,
            Json(json!({
                "action": "get",
                "node": { "key": format!("/{key}"), "value": value, "modifiedIndex": rev, "createdIndex": rev }
            })),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "errorCode": 100, "message": "Key not found", "cause": format!("/{key}"), "index": index })),
        ),
    }
}

async fn v3_range(State(etcd): State<FakeEtcd>, Json(req): Json<Value>) -> (StatusCode, Json<Value>) {
    let raw = req["key"].as_str().unwrap_or_default();
    let key = String::from_utf8(STANDARD.decode(raw).unwrap_or_default()).unwrap_or_default();
    if key == BOOM_KEY {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "etcdserver: request timed out", "code": 14 })),
        );
    }
    let (revision, entry, _) = etcd.lookup(&key);
    let header = json!({ "cluster_id": "14841639068965178418", "member_id": "10276657743932975437", "revision": revision.to_string(), "raft_term": "2" });
    let body = match entry {
        // int64 fields as strings, like the real gateway
        Some((value, rev)) => json!({
            "header": header,
            "kvs": [{
                "key": STANDARD.encode(key.as_bytes()),
                "create_revision": rev.to_string(),
                "mod_revision": rev.to_string(),
                "version": "1",
                "value": STANDARD.encode(value.as_bytes()),
            }],
            "count": "1",
        }),
        None => json!({ "header": header }),
    };
    (StatusCode::OK, Json(body))
}

pub fn router(etcd: FakeEtcd) -> Router {
    Router::new()
        .route("/v2/keys/{*key}", get(v2_get))
        .route("/v3/kv/range", post(v3_range))
        .with_state(etcd)
}

/// Serve `etcd` on 127.0.0.1 and return its base url.
pub async fn spawn_fake_etcd(etcd: FakeEtcd) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake etcd");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router(etcd)).await.expect("serve fake etcd");
    });
    format!("http://{addr}")
}

/// A base url where nothing listens.
pub async fn dead_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}
