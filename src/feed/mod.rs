//! Feed domain: item model, fetching, URL security and predefined sources.

pub mod fetcher;
pub mod item;
pub mod security;
pub mod sources;

pub use fetcher::{FetchFeed, HttpFeedFetcher};
pub use item::FeedItem;
pub use security::validate_feed_url;
pub use sources::{load_sources, FeedSource};
