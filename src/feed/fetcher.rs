//! Feed fetching and parsing.
//!
//! Fetches RSS/Atom documents over HTTP with resource limits and parses
//! them into sanitized, validated [`FeedItem`]s. Items that fail
//! validation are dropped individually; the fetch as a whole still
//! succeeds.

use async_trait::async_trait;
use feed_rs::parser;
use reqwest::Client;
use std::time::Duration;

use crate::feed::item::FeedItem;
use crate::{FeedstoreError, Result};

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Read timeout in seconds.
const READ_TIMEOUT_SECS: u64 = 20;

/// Total timeout in seconds.
const TOTAL_TIMEOUT_SECS: u64 = 30;

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// Maximum feed size in bytes (5MB).
const MAX_FEED_SIZE: u64 = 5 * 1024 * 1024;

/// User agent string for feed fetching.
const USER_AGENT: &str = "feedstore/0.1 (RSS ingestion)";

/// Capability to fetch and parse a feed URL into items.
///
/// The ingestion orchestrator and the worker pool consume this trait
/// rather than a concrete client, so tests can substitute a stub.
#[async_trait]
pub trait FetchFeed: Send + Sync {
    /// Fetch the feed at `url` and return its parsed, validated items.
    async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>>;
}

/// HTTP-backed feed fetcher with timeouts and size limits.
pub struct HttpFeedFetcher {
    client: Client,
}

impl HttpFeedFetcher {
    /// Create a new fetcher with default settings.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .read_timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .timeout(Duration::from_secs(TOTAL_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                FeedstoreError::ExternalService(format!("failed to create HTTP client: {e}"))
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl FetchFeed for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FeedstoreError::ExternalService(format!("failed to fetch feed: {e}")))?;

        if !response.status().is_success() {
            return Err(FeedstoreError::ExternalService(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > MAX_FEED_SIZE {
                return Err(FeedstoreError::ExternalService(format!(
                    "feed too large: {content_length} bytes (max {MAX_FEED_SIZE} bytes)"
                )));
            }
        }

        let bytes = response.bytes().await.map_err(|e| {
            FeedstoreError::ExternalService(format!("failed to read response: {e}"))
        })?;

        if bytes.len() as u64 > MAX_FEED_SIZE {
            return Err(FeedstoreError::ExternalService(format!(
                "feed too large: {} bytes (max {MAX_FEED_SIZE} bytes)",
                bytes.len()
            )));
        }

        parse_feed(&bytes)
    }
}

/// Parse feed bytes into validated items.
fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedItem>> {
    let feed = parser::parse(bytes)
        .map_err(|e| FeedstoreError::ExternalService(format!("failed to parse feed: {e}")))?;

    let mut items = Vec::with_capacity(feed.entries.len());
    for entry in feed.entries {
        let title = entry.title.map(|t| t.content).unwrap_or_default();
        let link = entry
            .links
            .first()
            .map(|l| l.href.clone())
            .unwrap_or_default();
        let description = entry
            .summary
            .map(|t| t.content)
            .or(entry.content.and_then(|c| c.body))
            .map(|d| strip_html(&d))
            .unwrap_or_default();
        let author = entry
            .authors
            .first()
            .map(|a| a.name.clone())
            .unwrap_or_else(|| "Unknown".to_string());
        // Normalized to the Z-suffixed form so stored dates compare
        // lexicographically in publication order.
        let pub_date = entry
            .published
            .or(entry.updated)
            .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
            .unwrap_or_default();

        let mut item = FeedItem {
            title,
            link,
            description,
            author,
            pub_date,
        };
        item.sanitize();

        // Invalid items are dropped; the rest of the feed still counts.
        if let Err(e) = item.validate() {
            tracing::debug!(link = %item.link, error = %e, "Dropping invalid feed item");
            continue;
        }

        items.push(item);
    }

    Ok(items)
}

/// Strip HTML tags from text and decode common entities.
fn strip_html(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut in_entity = false;
    let mut entity = String::new();

    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            '&' if !in_tag => {
                in_entity = true;
                entity.clear();
            }
            ';' if in_entity => {
                in_entity = false;
                match entity.as_str() {
                    "amp" => result.push('&'),
                    "lt" => result.push('<'),
                    "gt" => result.push('>'),
                    "quot" => result.push('"'),
                    "apos" => result.push('\''),
                    "nbsp" => result.push(' '),
                    _ if entity.starts_with('#') => {
                        if let Some(code) = parse_numeric_entity(&entity) {
                            if let Some(c) = char::from_u32(code) {
                                result.push(c);
                            }
                        }
                    }
                    _ => {
                        result.push('&');
                        result.push_str(&entity);
                        result.push(';');
                    }
                }
            }
            _ if in_entity => {
                entity.push(ch);
            }
            _ if !in_tag => {
                result.push(ch);
            }
            _ => {}
        }
    }

    let result: String = result.split_whitespace().collect::<Vec<&str>>().join(" ");
    result.trim().to_string()
}

/// Parse a numeric HTML entity (e.g., "#123" or "#x7B").
fn parse_numeric_entity(entity: &str) -> Option<u32> {
    if entity.starts_with("#x") || entity.starts_with("#X") {
        u32::from_str_radix(&entity[2..], 16).ok()
    } else if let Some(decimal) = entity.strip_prefix('#') {
        decimal.parse().ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html_basic() {
        assert_eq!(strip_html("<p>Hello</p>"), "Hello");
        assert_eq!(strip_html("<b>Bold</b> text"), "Bold text");
        assert_eq!(strip_html("<div><p>Nested</p></div>"), "Nested");
    }

    #[test]
    fn test_strip_html_entities() {
        assert_eq!(strip_html("&amp;"), "&");
        assert_eq!(strip_html("&lt;tag&gt;"), "<tag>");
        assert_eq!(strip_html("&quot;quoted&quot;"), "\"quoted\"");
        assert_eq!(strip_html("A&nbsp;B"), "A B");
    }

    #[test]
    fn test_strip_html_numeric_entities() {
        assert_eq!(strip_html("&#65;"), "A");
        assert_eq!(strip_html("&#x41;"), "A");
    }

    #[test]
    fn test_strip_html_whitespace() {
        assert_eq!(
            strip_html("<p>  Multiple   spaces  </p>"),
            "Multiple spaces"
        );
    }

    #[test]
    fn test_parse_numeric_entity() {
        assert_eq!(parse_numeric_entity("#65"), Some(65));
        assert_eq!(parse_numeric_entity("#x41"), Some(65));
        assert_eq!(parse_numeric_entity("#X41"), Some(65));
        assert_eq!(parse_numeric_entity("invalid"), None);
    }

    #[test]
    fn test_parse_feed_rss() {
        let rss = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Feed</title>
    <link>https://example.com</link>
    <item>
      <title>First Article</title>
      <link>https://example.com/1</link>
      <guid>guid-1</guid>
      <description>&lt;p&gt;Description&lt;/p&gt;</description>
      <pubDate>Mon, 02 Jun 2025 09:00:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

        let items = parse_feed(rss.as_bytes()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "First Article");
        assert_eq!(items[0].link, "https://example.com/1");
        assert_eq!(items[0].description, "Description");
        assert_eq!(items[0].author, "Unknown");
        assert!(items[0].pub_date.starts_with("2025-06-02T09:00:00"));
    }

    #[test]
    fn test_parse_feed_atom() {
        let atom = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Feed</title>
  <entry>
    <id>urn:uuid:1</id>
    <title>Atom Entry</title>
    <link href="https://example.com/entry"/>
    <summary>Entry summary</summary>
    <author><name>Author Name</name></author>
    <updated>2025-01-01T00:00:00Z</updated>
  </entry>
</feed>"#;

        let items = parse_feed(atom.as_bytes()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Atom Entry");
        assert_eq!(items[0].author, "Author Name");
        assert!(!items[0].pub_date.is_empty());
    }

    #[test]
    fn test_parse_feed_drops_invalid_items() {
        // Second item has no link and must be dropped; the first survives.
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Feed</title>
    <item>
      <title>Good</title>
      <link>https://example.com/good</link>
    </item>
    <item>
      <title>No link</title>
    </item>
  </channel>
</rss>"#;

        let items = parse_feed(rss.as_bytes()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Good");
    }

    #[test]
    fn test_parse_feed_invalid_input() {
        assert!(parse_feed(b"This is not XML").is_err());
    }
}
