//! RSS parsing.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;
use tracing::{debug, warn};

use super::types::{ArticleFieldError, ArticleRecord, ParsedFeed, SkippedEntry};

/// Marker preceding the arXiv identifier in an OAI guid.
const GUID_MARKER: &str = "oai:arXiv.org:";

/// Marker preceding the arXiv identifier in an abstract link.
const LINK_MARKER: &str = "arxiv.org/abs/";

/// Document-level parse failures. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("feed is not valid UTF-8: {0}")]
    Encoding(String),

    #[error("malformed XML at byte {position}: {message}")]
    Malformed { position: u64, message: String },

    #[error("document has no <channel> element")]
    MissingChannel,
}

/// Raw field values collected for one `<item>`.
#[derive(Debug, Default)]
struct ItemFields {
    guid: Option<String>,
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    creators: Vec<String>,
    doi: Option<String>,
    published: Option<DateTime<Utc>>,
}

impl ItemFields {
    fn set(&mut self, element: &str, value: String) {
        if value.is_empty() {
            return;
        }
        match element {
            "guid" => self.guid = Some(value),
            "title" => self.title = Some(value),
            "link" => self.link = Some(value),
            "description" => self.description = Some(value),
            "summary" => {
                if self.description.is_none() {
                    self.description = Some(value);
                }
            }
            "dc:creator" | "author" | "creator" => self.creators.push(value),
            "arxiv:DOI" | "arxiv:doi" | "doi" => self.doi = Some(value),
            "pubDate" => {
                if let Ok(dt) = DateTime::parse_from_rfc2822(&value) {
                    self.published = Some(dt.with_timezone(&Utc));
                }
            }
            "dc:date" | "published" => {
                if self.published.is_none() {
                    if let Ok(dt) = DateTime::parse_from_rfc3339(&value) {
                        self.published = Some(dt.with_timezone(&Utc));
                    }
                }
            }
            _ => {}
        }
    }

    fn identifier(&self) -> Option<String> {
        let from_guid = self
            .guid
            .as_deref()
            .and_then(|g| g.split_once(GUID_MARKER))
            .map(|(_, id)| id.trim());
        let from_link = || {
            self.link
                .as_deref()
                .and_then(|l| l.split_once(LINK_MARKER))
                .map(|(_, id)| id.trim().trim_end_matches('/'))
        };

        from_guid
            .filter(|id| !id.is_empty())
            .or_else(|| from_link().filter(|id| !id.is_empty()))
            .map(|id| id.to_string())
    }

    fn into_record(self) -> Result<ArticleRecord, ArticleFieldError> {
        let Some(identifier) = self.identifier() else {
            return Err(ArticleFieldError::MissingIdentifier {
                guid: self.guid,
                link: self.link,
            });
        };

        Ok(ArticleRecord {
            identifier,
            title: self.title.unwrap_or_default(),
            link: self.link.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            creator: if self.creators.is_empty() {
                None
            } else {
                Some(self.creators.join(", "))
            },
            published: self.published,
            doi: self.doi,
        })
    }
}

fn element_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

/// Parse a raw RSS document.
///
/// Entries without a usable identifier are skipped and reported in
/// [`ParsedFeed::skipped`]; structural problems fail the whole document.
pub fn parse_feed(raw: &[u8]) -> Result<ParsedFeed, ParseError> {
    let xml = std::str::from_utf8(raw).map_err(|e| ParseError::Encoding(e.to_string()))?;

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut feed = ParsedFeed::default();
    let mut seen_keys: HashSet<String> = HashSet::new();
    let mut stack: Vec<String> = Vec::new();
    let mut saw_channel = false;
    let mut item: Option<ItemFields> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = element_name(e.name().as_ref());
                match name.as_str() {
                    "channel" => saw_channel = true,
                    "item" => item = Some(ItemFields::default()),
                    _ => {}
                }
                // Nested markup inside a field keeps accumulating into that field.
                if matches!(stack.last().map(String::as_str), Some("item" | "channel")) {
                    text.clear();
                }
                stack.push(name);
            }
            Ok(Event::End(e)) => {
                let name = element_name(e.name().as_ref());
                match stack.pop() {
                    Some(open) if open == name => {}
                    Some(open) => {
                        return Err(ParseError::Malformed {
                            position: reader.buffer_position() as u64,
                            message: format!("expected </{}>, found </{}>", open, name),
                        });
                    }
                    None => {
                        return Err(ParseError::Malformed {
                            position: reader.buffer_position() as u64,
                            message: format!("unexpected </{}>", name),
                        });
                    }
                }

                match stack.last().map(String::as_str) {
                    _ if name == "item" => {
                        if let Some(fields) = item.take() {
                            finish_item(&mut feed, &mut seen_keys, fields);
                        }
                    }
                    Some("item") => {
                        if let Some(fields) = item.as_mut() {
                            fields.set(&name, text.trim().to_string());
                        }
                        text.clear();
                    }
                    Some("channel") => {
                        if name == "title" && !text.trim().is_empty() {
                            feed.channel_title = Some(text.trim().to_string());
                        }
                        text.clear();
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let name = element_name(e.name().as_ref());
                match name.as_str() {
                    "channel" => saw_channel = true,
                    "item" if item.is_none() => finish_item(&mut feed, &mut seen_keys, ItemFields::default()),
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                let decoded = e
                    .unescape()
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&e).into_owned());
                text.push_str(&decoded);
            }
            Ok(Event::CData(c)) => {
                text.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ParseError::Malformed {
                    position: reader.buffer_position() as u64,
                    message: e.to_string(),
                });
            }
        }
    }

    if let Some(open) = stack.last() {
        return Err(ParseError::Malformed {
            position: reader.buffer_position() as u64,
            message: format!("unclosed element <{}> at end of document", open),
        });
    }

    if !saw_channel {
        return Err(ParseError::MissingChannel);
    }

    debug!(
        total = feed.total_entries,
        parsed = feed.articles.len(),
        skipped = feed.skipped.len(),
        "Parsed feed"
    );

    Ok(feed)
}

/// Key segments that belong to the run's own objects.
const RESERVED_KEYS: &[&str] = &["metadata"];

fn finish_item(feed: &mut ParsedFeed, seen_keys: &mut HashSet<String>, fields: ItemFields) {
    let position = feed.total_entries;
    feed.total_entries += 1;

    // One object per key: later entries mapping to a taken key are dropped.
    let checked = fields.into_record().and_then(|record| {
        let key = record.key_safe_identifier();
        if RESERVED_KEYS.contains(&key.as_str()) {
            Err(ArticleFieldError::ReservedIdentifier {
                identifier: record.identifier,
            })
        } else if !seen_keys.insert(key) {
            Err(ArticleFieldError::DuplicateIdentifier {
                identifier: record.identifier,
            })
        } else {
            Ok(record)
        }
    });

    match checked {
        Ok(record) => feed.articles.push(record),
        Err(reason) => {
            warn!(position, error = %reason, "Skipping feed entry");
            feed.skipped.push(SkippedEntry { position, reason });
        }
    }
}
