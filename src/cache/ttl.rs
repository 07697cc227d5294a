//! Adaptive TTL selection from a feed's observed update cadence.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::config::CacheConfig;
use crate::feed::FeedItem;

/// Cadence at or below which a feed counts as high-frequency.
const HIGH_FREQ_CADENCE: Duration = Duration::from_secs(60 * 60);

/// Cadence at or above which a feed counts as low-frequency.
const LOW_FREQ_CADENCE: Duration = Duration::from_secs(24 * 60 * 60);

/// Gaps at or above this are outliers and excluded from the cadence mean.
const OUTLIER_GAP: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Cadence assumed when publication dates are missing or unusable.
const FALLBACK_CADENCE: Duration = LOW_FREQ_CADENCE;

/// Item count above which a medium-frequency feed's TTL is doubled.
const LARGE_FEED_ITEMS: usize = 100;

/// Item count below which a medium-frequency feed's TTL is halved.
const SMALL_FEED_ITEMS: usize = 10;

/// Choose a cache TTL for a freshly parsed feed.
///
/// High-cadence feeds get the short TTL, low-cadence feeds the long one;
/// in between, the default TTL is scaled by feed size.
pub fn adaptive_feed_ttl(items: &[FeedItem], ttls: &CacheConfig) -> Duration {
    if items.is_empty() {
        return ttls.default_feed_ttl;
    }

    let cadence = observed_cadence(items);

    if cadence <= HIGH_FREQ_CADENCE {
        ttls.high_freq_feed_ttl
    } else if cadence >= LOW_FREQ_CADENCE {
        ttls.low_freq_feed_ttl
    } else if items.len() > LARGE_FEED_ITEMS {
        ttls.default_feed_ttl * 2
    } else if items.len() < SMALL_FEED_ITEMS {
        ttls.default_feed_ttl / 2
    } else {
        ttls.default_feed_ttl
    }
}

/// Mean gap between consecutive publications, newest first.
///
/// Items with unparseable dates are dropped; gaps of a week or more are
/// treated as outliers. Falls back to 24 hours when fewer than two dates
/// survive or no gap qualifies.
fn observed_cadence(items: &[FeedItem]) -> Duration {
    let mut times: Vec<DateTime<Utc>> = items
        .iter()
        .filter_map(|item| parse_pub_date(&item.pub_date))
        .collect();

    if times.len() < 2 {
        return FALLBACK_CADENCE;
    }

    times.sort_by(|a, b| b.cmp(a));

    let mut total = Duration::ZERO;
    let mut count = 0u32;
    for pair in times.windows(2) {
        let gap = pair[0] - pair[1];
        match gap.to_std() {
            Ok(gap) if gap > Duration::ZERO && gap < OUTLIER_GAP => {
                total += gap;
                count += 1;
            }
            _ => {}
        }
    }

    if count == 0 {
        return FALLBACK_CADENCE;
    }

    total / count
}

/// Parse a publication date in the formats feeds actually emit.
fn parse_pub_date(value: &str) -> Option<DateTime<Utc>> {
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    // RFC 1123 dates, with either a named zone or a numeric offset.
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_at(pub_date: &str) -> FeedItem {
        FeedItem {
            title: "T".to_string(),
            link: "https://example.com/a".to_string(),
            description: String::new(),
            author: "A".to_string(),
            pub_date: pub_date.to_string(),
        }
    }

    fn items_spaced(count: usize, gap_minutes: i64) -> Vec<FeedItem> {
        let start = DateTime::parse_from_rfc3339("2025-06-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        (0..count)
            .map(|i| {
                let at = start + chrono::Duration::minutes(gap_minutes * i as i64);
                item_at(&at.to_rfc3339())
            })
            .collect()
    }

    fn ttls() -> CacheConfig {
        CacheConfig {
            default_feed_ttl: Duration::from_secs(15 * 60),
            default_items_ttl: Duration::from_secs(30 * 60),
            high_freq_feed_ttl: Duration::from_secs(5 * 60),
            low_freq_feed_ttl: Duration::from_secs(60 * 60),
        }
    }

    #[test]
    fn test_empty_feed_uses_default_ttl() {
        assert_eq!(adaptive_feed_ttl(&[], &ttls()), Duration::from_secs(900));
    }

    #[test]
    fn test_high_frequency_feed() {
        // 20 minutes apart: cadence well under an hour.
        let items = items_spaced(5, 20);
        assert_eq!(adaptive_feed_ttl(&items, &ttls()), Duration::from_secs(300));
    }

    #[test]
    fn test_low_frequency_feed() {
        // 2 days apart.
        let items = items_spaced(4, 48 * 60);
        assert_eq!(
            adaptive_feed_ttl(&items, &ttls()),
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn test_medium_frequency_small_feed_halves_default() {
        // 30 minutes apart, 5 items: medium cadence, small feed.
        let items = items_spaced(5, 30);
        assert_eq!(
            adaptive_feed_ttl(&items, &ttls()),
            Duration::from_secs(450)
        );
    }

    #[test]
    fn test_medium_frequency_large_feed_doubles_default() {
        // 90 minutes apart, 120 items.
        let items = items_spaced(120, 90);
        assert_eq!(
            adaptive_feed_ttl(&items, &ttls()),
            Duration::from_secs(1800)
        );
    }

    #[test]
    fn test_medium_frequency_medium_feed_uses_default() {
        let items = items_spaced(50, 90);
        assert_eq!(
            adaptive_feed_ttl(&items, &ttls()),
            Duration::from_secs(900)
        );
    }

    #[test]
    fn test_equal_cadence_yields_equal_ttl() {
        let a = items_spaced(5, 30);
        let b = items_spaced(5, 30);
        assert_eq!(adaptive_feed_ttl(&a, &ttls()), adaptive_feed_ttl(&b, &ttls()));
    }

    #[test]
    fn test_cadence_with_too_few_dates_falls_back() {
        let items = vec![item_at("2025-06-01T00:00:00Z"), item_at("")];
        assert_eq!(observed_cadence(&items), FALLBACK_CADENCE);
    }

    #[test]
    fn test_cadence_ignores_unparseable_dates() {
        let mut items = items_spaced(3, 30);
        items.push(item_at("not a date"));
        assert_eq!(observed_cadence(&items), Duration::from_secs(30 * 60));
    }

    #[test]
    fn test_cadence_discards_week_long_outliers() {
        let mut items = items_spaced(3, 30);
        // One entry nine days earlier must not drag the mean.
        items.insert(0, item_at("2025-05-23T00:00:00Z"));
        assert_eq!(observed_cadence(&items), Duration::from_secs(30 * 60));
    }

    #[test]
    fn test_cadence_all_outliers_falls_back() {
        let items = vec![
            item_at("2025-06-01T00:00:00Z"),
            item_at("2025-05-01T00:00:00Z"),
        ];
        assert_eq!(observed_cadence(&items), FALLBACK_CADENCE);
    }

    #[test]
    fn test_parse_pub_date_formats() {
        assert!(parse_pub_date("2025-06-01T12:00:00Z").is_some());
        assert!(parse_pub_date("2025-06-01T12:00:00+02:00").is_some());
        assert!(parse_pub_date("Sun, 01 Jun 2025 12:00:00 GMT").is_some());
        assert!(parse_pub_date("Sun, 01 Jun 2025 12:00:00 +0000").is_some());
        assert!(parse_pub_date("2025-06-01 12:00:00").is_some());
        assert!(parse_pub_date("June 1st, 2025").is_none());
        assert!(parse_pub_date("").is_none());
    }
}
