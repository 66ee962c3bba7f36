// src/client/v2.rs
//! etcd v2 keys API: `GET {uri}/v2/keys/{key}`.
//!
//! A 404 with errorCode 100 is "key not found"; a directory node carries no
//! value. Both are reported by `get` as `Ok(None)`.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use super::{status_error, ClientOptions, RemoteClient};
use crate::content::Stamp;
use crate::error::ClientError;

const ERR_KEY_NOT_FOUND: i64 = 100;

#[derive(Debug, Deserialize)]
struct KeysResponse {
    node: Node,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Node {
    value: Option<String>,
    #[serde(default)]
    dir: bool,
    modified_index: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error_code: i64,
    #[serde(default)]
    message: String,
}

pub struct EtcdV2Client {
    base: Url,
    http: reqwest::Client,
}

impl EtcdV2Client {
    pub fn new(base: Url, opts: &ClientOptions) -> Result<Self, ClientError> {
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidEndpoint(base.to_string()));
        }
        Ok(Self {
            base,
            http: opts.http_client()?,
        })
    }

    fn key_url(&self, key: &str) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        {
            let mut segs = url
                .path_segments_mut()
                .map_err(|_| ClientError::InvalidEndpoint(self.base.to_string()))?;
            segs.pop_if_empty().extend(["v2", "keys"]);
            segs.extend(key.split('/').filter(|s| !s.is_empty()));
        }
        Ok(url)
    }

    /// `Ok(None)` when etcd says the key does not exist.
    async fn fetch_node(&self, key: &str) -> Result<Option<Node>, ClientError> {
        let url = self.key_url(key)?;
        let resp = self.http.get(url).send().await?;

        if resp.status() == StatusCode::NOT_FOUND {
            let body = resp.text().await?;
            return match serde_json::from_str::<ErrorBody>(&body) {
                Ok(e) if e.error_code == ERR_KEY_NOT_FOUND => Ok(None),
                Ok(e) => Err(ClientError::protocol(format!(
                    "etcd error {}: {}",
                    e.error_code, e.message
                ))),
                Err(_) => Err(ClientError::Status {
                    status: StatusCode::NOT_FOUND.as_u16(),
                    body,
                }),
            };
        }
        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }

        let parsed: KeysResponse = resp
            .json()
            .await
            .map_err(|e| ClientError::protocol(format!("v2 keys response: {e}")))?;
        Ok(Some(parsed.node))
    }
}

#[async_trait]
impl RemoteClient for EtcdV2Client {
    async fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        let node = self.fetch_node(key).await?;
        Ok(node.filter(|n| !n.dir).and_then(|n| n.value))
    }

    async fn revision(&self, key: &str) -> Result<Stamp, ClientError> {
        match self.fetch_node(key).await? {
            Some(node) => Ok(Stamp::new(node.modified_index)),
            None => Err(ClientError::KeyNotFound(key.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "etcd-v2"
    }
}
