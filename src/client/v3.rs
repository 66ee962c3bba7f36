// src/client/v3.rs
//! etcd v3 through its gRPC JSON gateway (`POST {uri}/v3/kv/range`).
//!
//! Keys and values travel base64-encoded; int64 fields arrive as JSON strings.
//! A successful range with no `kvs` means the key is absent.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Url;
use serde::{Deserialize, Deserializer, Serialize};

use super::{status_error, ClientOptions, RemoteClient};
use crate::content::Stamp;
use crate::error::ClientError;

#[derive(Debug, Serialize)]
struct RangeRequest {
    key: String,
}

#[derive(Debug, Deserialize)]
struct RangeResponse {
    #[serde(default)]
    kvs: Vec<KeyValue>,
}

#[derive(Debug, Deserialize)]
struct KeyValue {
    /// Proto3 JSON omits empty values.
    #[serde(default)]
    value: String,
    #[serde(default, deserialize_with = "de_int64")]
    mod_revision: i64,
}

/// int64 may be encoded as a number or as a decimal string.
fn de_int64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int64 {
        Num(i64),
        Str(String),
    }
    match Int64::deserialize(d)? {
        Int64::Num(n) => Ok(n),
        Int64::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

pub struct EtcdV3Client {
    range_url: Url,
    http: reqwest::Client,
}

impl EtcdV3Client {
    pub fn new(base: Url, opts: &ClientOptions) -> Result<Self, ClientError> {
        let mut range_url = base.clone();
        range_url
            .path_segments_mut()
            .map_err(|_| ClientError::InvalidEndpoint(base.to_string()))?
            .pop_if_empty()
            .extend(["v3", "kv", "range"]);
        Ok(Self {
            range_url,
            http: opts.http_client()?,
        })
    }

    async fn range(&self, key: &str) -> Result<Option<KeyValue>, ClientError> {
        let req = RangeRequest {
            key: STANDARD.encode(key.as_bytes()),
        };
        let resp = self
            .http
            .post(self.range_url.clone())
            .json(&req)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }
        let parsed: RangeResponse = resp
            .json()
            .await
            .map_err(|e| ClientError::protocol(format!("v3 range response: {e}")))?;
        Ok(parsed.kvs.into_iter().next())
    }
}

fn decode_value(raw: &str) -> Result<String, ClientError> {
    let bytes = STANDARD
        .decode(raw)
        .map_err(|e| ClientError::protocol(format!("value is not base64: {e}")))?;
    String::from_utf8(bytes).map_err(|e| ClientError::protocol(format!("value is not utf-8: {e}")))
}

#[async_trait]
impl RemoteClient for EtcdV3Client {
    async fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        match self.range(key).await? {
            Some(kv) => decode_value(&kv.value).map(Some),
            None => Ok(None),
        }
    }

    async fn revision(&self, key: &str) -> Result<Stamp, ClientError> {
        match self.range(key).await? {
            Some(kv) => Ok(Stamp::new(kv.mod_revision)),
            None => Err(ClientError::KeyNotFound(key.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "etcd-v3"
    }
}
