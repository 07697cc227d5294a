//! Predefined feed sources.
//!
//! The `/feeds` endpoint serves a curated source list loaded from a JSON
//! file at startup, falling back to a built-in list when the file is
//! missing or malformed.

use serde::{Deserialize, Serialize};

/// A predefined RSS feed source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSource {
    /// Display name.
    pub name: String,
    /// Feed URL.
    pub url: String,
}

/// Built-in fallback sources.
pub fn default_sources() -> Vec<FeedSource> {
    [
        ("BBC News", "https://feeds.bbci.co.uk/news/rss.xml"),
        ("Hacker News", "https://news.ycombinator.com/rss"),
        ("Ars Technica", "https://feeds.arstechnica.com/arstechnica/index"),
        ("The Verge", "https://www.theverge.com/rss/index.xml"),
        ("NASA Breaking News", "https://www.nasa.gov/rss/dyn/breaking_news.rss"),
    ]
    .iter()
    .map(|(name, url)| FeedSource {
        name: name.to_string(),
        url: url.to_string(),
    })
    .collect()
}

/// Load the source list from `path`, falling back to the built-in list.
pub fn load_sources(path: &str) -> Vec<FeedSource> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<Vec<FeedSource>>(&contents) {
            Ok(sources) if !sources.is_empty() => {
                tracing::info!(path, count = sources.len(), "Loaded feed sources");
                sources
            }
            Ok(_) => {
                tracing::warn!(path, "Feed sources file is empty, using defaults");
                default_sources()
            }
            Err(e) => {
                tracing::warn!(path, error = %e, "Invalid feed sources file, using defaults");
                default_sources()
            }
        },
        Err(e) => {
            tracing::warn!(path, error = %e, "Feed sources file not readable, using defaults");
            default_sources()
        }
    }
}
