//! Feed retrieval and parsing.
//!
//! - [`FeedSource`]: fetches the raw RSS document for a category
//! - [`parse_feed`]: turns raw bytes into [`ArticleRecord`]s, skipping
//!   entries that carry no usable identifier

mod fetcher;
mod parser;
mod types;

pub use fetcher::{FeedSource, FetchError, HttpFeedSource};
pub use parser::{parse_feed, ParseError};
pub use types::{
    validate_category, ArticleFieldError, ArticleRecord, FetchedFeed, ParsedFeed, SkippedEntry,
    DEFAULT_CONTENT_TYPE,
};
