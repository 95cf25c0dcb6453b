//! Feed types.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Content type assumed when the feed server does not send one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/rss+xml";

static CATEGORY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]{1,64}$").expect("valid category regex"));

/// Check that a category is safe to use in a feed URL and an object key.
pub fn validate_category(category: &str) -> Result<(), String> {
    if CATEGORY_RE.is_match(category) {
        Ok(())
    } else {
        Err(format!(
            "invalid category '{}': expected 1-64 characters of [A-Za-z0-9._-]",
            category
        ))
    }
}

/// Raw feed document as returned by the feed source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedFeed {
    pub category: String,
    pub source_url: String,
    pub content_type: String,
    /// Response body exactly as served. Base64 in serialized history.
    #[serde(with = "base64_bytes")]
    pub body: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<T, S>(bytes: T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: AsRef<[u8]>,
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// One parsed feed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// Feed-provided unique id (e.g. `2401.00001v1`). Never empty.
    pub identifier: String,
    pub title: String,
    pub link: String,
    pub description: String,
    pub creator: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub doi: Option<String>,
}

impl ArticleRecord {
    /// Identifier with path separators replaced so it is usable as a key segment.
    pub fn key_safe_identifier(&self) -> String {
        self.identifier.replace(['/', '\\'], "_")
    }
}

/// Why a feed entry was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ArticleFieldError {
    #[error("entry has no usable identifier (guid: {guid:?}, link: {link:?})")]
    MissingIdentifier {
        guid: Option<String>,
        link: Option<String>,
    },

    #[error("identifier {identifier} maps to an object key already used in this feed")]
    DuplicateIdentifier { identifier: String },

    #[error("identifier {identifier} collides with a reserved object key")]
    ReservedIdentifier { identifier: String },
}

/// An entry that was skipped during parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    /// Zero-based position of the `<item>` in the document.
    pub position: usize,
    pub reason: ArticleFieldError,
}

/// Result of parsing a whole feed document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFeed {
    pub channel_title: Option<String>,
    /// Number of `<item>` elements seen, parsed or not.
    pub total_entries: usize,
    pub articles: Vec<ArticleRecord>,
    pub skipped: Vec<SkippedEntry>,
}
