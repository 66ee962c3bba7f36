// src/error.rs
use thiserror::Error;

/// Failure reported by a [`RemoteClient`](crate::client::RemoteClient).
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection refused, timeout, TLS, body read...
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("store responded with status {status}: {body}")]
    Status { status: u16, body: String },

    /// Only `revision` reports this; `get` returns `Ok(None)` instead.
    #[error("key '{0}' not found")]
    KeyNotFound(String),

    #[error("malformed store response: {0}")]
    Protocol(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl ClientError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        ClientError::Protocol(msg.into())
    }
}

/// Failure of [`RemoteConfigSource::load`](crate::source::RemoteConfigSource::load).
#[derive(Debug, Error)]
pub enum SourceError {
    /// The client failed at the transport/protocol level.
    #[error("could not get data for key '{key}'")]
    Fetch {
        key: String,
        #[source]
        source: ClientError,
    },

    /// The store answered, but the key holds no value.
    #[error("key '{key}' does not contain any value")]
    KeyMissing { key: String },
}

impl SourceError {
    pub fn key(&self) -> &str {
        match self {
            SourceError::Fetch { key, .. } | SourceError::KeyMissing { key } => key,
        }
    }

    /// Short label for logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::Fetch { .. } => "fetch",
            SourceError::KeyMissing { .. } => "missing",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn fetch_error_keeps_cause_and_key() {
        let err = SourceError::Fetch {
            key: "app.yaml".into(),
            source: ClientError::Unavailable("down".into()),
        };
        assert_eq!(err.key(), "app.yaml");
        assert_eq!(err.kind(), "fetch");
        assert_eq!(err.to_string(), "could not get data for key 'app.yaml'");
        let cause = err.source().expect("cause");
        assert_eq!(cause.to_string(), "store unavailable: down");
    }

    #[test]
    fn missing_key_message() {
        let err = SourceError::KeyMissing {
            key: "app.yaml".into(),
        };
        assert_eq!(err.to_string(), "key 'app.yaml' does not contain any value");
        assert!(err.source().is_none());
    }
}
