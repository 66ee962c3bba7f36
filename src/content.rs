// src/content.rs
use std::fmt;
use std::io::Cursor;

use serde::{Deserialize, Serialize};

/// Version of a remote document at fetch time (etcd mod revision / v2 modified index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stamp(i64);

impl Stamp {
    pub const fn new(revision: i64) -> Self {
        Self(revision)
    }

    pub const fn value(self) -> i64 {
        self.0
    }
}

impl From<i64> for Stamp {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One fetched configuration document, handed to whatever parses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEnvelope {
    data: String,
    media_type: Option<String>,
    stamp: Option<Stamp>,
}

impl ContentEnvelope {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            media_type: None,
            stamp: None,
        }
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    pub fn with_stamp(mut self, stamp: Stamp) -> Self {
        self.stamp = Some(stamp);
        self
    }

    pub fn as_str(&self) -> &str {
        &self.data
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_bytes()
    }

    /// A `Read` over the raw bytes for stream-oriented parsers.
    pub fn reader(&self) -> Cursor<&[u8]> {
        Cursor::new(self.data.as_bytes())
    }

    /// `None` means the parser should fall back to its default format.
    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    pub fn stamp(&self) -> Option<Stamp> {
        self.stamp
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_string(self) -> String {
        self.data
    }
}
