//! Testing utilities and mock implementations.
//!
//! Mocks for the feed source and object store let the whole pipeline run
//! in-process, with fault injection and concurrency instrumentation.
//!
//! # Example
//!
//! ```rust,ignore
//! use feedline_core::testing::{fixtures, MockFeedSource, MockObjectStore};
//!
//! let feed = MockFeedSource::new();
//! feed.set_feed("cs", fixtures::sample_feed(3, 0)).await;
//!
//! let store = MockObjectStore::new();
//! store.fail_key("cs/ProcessDate=2024-01-01/2401.00002v1.json").await;
//! ```

mod mock_feed_source;
mod mock_llm_client;
mod mock_object_store;

pub use mock_feed_source::MockFeedSource;
pub use mock_llm_client::MockLlmClient;
pub use mock_object_store::MockObjectStore;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{NaiveDate, Utc};

    use crate::feed::{ArticleRecord, FetchedFeed, DEFAULT_CONTENT_TYPE};

    /// Identifier of the `n`th (1-based) fixture article.
    pub fn identifier(n: usize) -> String {
        format!("2401.{:05}v1", n)
    }

    pub fn process_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date")
    }

    /// An RSS document with `total` items, the last `missing_ids` of which
    /// carry no arXiv identifier.
    pub fn sample_feed(total: usize, missing_ids: usize) -> String {
        let valid = total.saturating_sub(missing_ids);
        let mut items = String::new();

        for n in 1..=valid {
            let id = identifier(n);
            items.push_str(&format!(
                r#"    <item>
      <title>Paper {n}</title>
      <link>https://arxiv.org/abs/{id}</link>
      <description>arXiv:{id} Announce Type: new
Abstract: We study problem {n} &amp; its consequences.</description>
      <guid isPermaLink="false">oai:arXiv.org:{id}</guid>
      <category>cs.AI</category>
      <pubDate>Mon, 01 Jan 2024 00:00:00 -0500</pubDate>
      <dc:creator>Author {n}, Coauthor {n}</dc:creator>
    </item>
"#
            ));
        }

        for n in 1..=missing_ids {
            items.push_str(&format!(
                r#"    <item>
      <title>Announcement {n}</title>
      <link>https://example.com/news/{n}</link>
      <guid>news-{n}</guid>
    </item>
"#
            ));
        }

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <channel>
    <title>cs updates on arXiv.org</title>
    <link>http://rss.arxiv.org/rss/cs</link>
{items}  </channel>
</rss>
"#
        )
    }

    /// `count` article records matching [`sample_feed`]'s valid items.
    pub fn articles(count: usize) -> Vec<ArticleRecord> {
        (1..=count)
            .map(|n| ArticleRecord {
                identifier: identifier(n),
                title: format!("Paper {}", n),
                link: format!("https://arxiv.org/abs/{}", identifier(n)),
                description: format!("Abstract: We study problem {}.", n),
                creator: Some(format!("Author {}", n)),
                published: None,
                doi: None,
            })
            .collect()
    }

    pub fn fetched_feed(category: &str, body: impl Into<Vec<u8>>) -> FetchedFeed {
        FetchedFeed {
            category: category.to_string(),
            source_url: format!("https://rss.arxiv.org/rss/{}", category),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            body: body.into(),
            fetched_at: Utc::now(),
        }
    }
}
