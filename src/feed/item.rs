//! Feed item model and duplicate fingerprints.

use serde::{Deserialize, Serialize};

use crate::{FeedstoreError, Result};

/// Maximum length for item titles.
pub const MAX_TITLE_LENGTH: usize = 500;

/// Maximum length for item descriptions.
pub const MAX_DESCRIPTION_LENGTH: usize = 2000;

/// Maximum length for author names.
pub const MAX_AUTHOR_LENGTH: usize = 100;

/// A single syndication feed item.
///
/// The canonical URL in `link` is the item's identity: it keys the stored
/// record and anchors deduplication across processes. Items are never
/// mutated after sanitization and validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    /// Item title.
    pub title: String,
    /// Canonical URL of the article; primary identity.
    pub link: String,
    /// Item description or summary.
    pub description: String,
    /// Author name ("Unknown" when the feed omits one).
    pub author: String,
    /// Publication timestamp, RFC 3339 in UTC; empty when unknown.
    pub pub_date: String,
}

impl FeedItem {
    /// Trim whitespace from all string fields in place.
    pub fn sanitize(&mut self) {
        self.title = self.title.trim().to_string();
        self.link = self.link.trim().to_string();
        self.description = self.description.trim().to_string();
        self.author = self.author.trim().to_string();
        self.pub_date = self.pub_date.trim().to_string();
    }

    /// Validate the item against the model invariants.
    ///
    /// All violations are collected and reported in a single error.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.title.trim().is_empty() {
            errors.push("title cannot be empty".to_string());
        } else if self.title.chars().count() > MAX_TITLE_LENGTH {
            errors.push(format!("title cannot exceed {MAX_TITLE_LENGTH} characters"));
        }

        if self.link.trim().is_empty() {
            errors.push("link cannot be empty".to_string());
        } else if url::Url::parse(&self.link).is_err() {
            errors.push("link must be a valid URL".to_string());
        }

        if self.description.chars().count() > MAX_DESCRIPTION_LENGTH {
            errors.push(format!(
                "description cannot exceed {MAX_DESCRIPTION_LENGTH} characters"
            ));
        }

        if self.author.chars().count() > MAX_AUTHOR_LENGTH {
            errors.push(format!(
                "author cannot exceed {MAX_AUTHOR_LENGTH} characters"
            ));
        }

        if !self.pub_date.trim().is_empty()
            && chrono::DateTime::parse_from_rfc3339(&self.pub_date).is_err()
        {
            errors.push("pub_date must be in RFC 3339 format".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(FeedstoreError::Validation(errors.join(", ")))
        }
    }

    /// 128-bit content fingerprint for near-duplicate detection.
    ///
    /// Hashes `title`, `description` and `author` concatenated without
    /// separators (kept for bit-compatibility with stored fingerprints).
    pub fn content_hash(&self) -> String {
        let content = format!("{}{}{}", self.title, self.description, self.author);
        format!("{:x}", md5::compute(content.as_bytes()))
    }

    /// Whether this item is likely a duplicate of `other`.
    ///
    /// Checks, in order: exact link match, then (title, author) match,
    /// then content-hash match. Short-circuits on the first hit.
    pub fn is_duplicate(&self, other: &FeedItem) -> bool {
        if self.link == other.link {
            return true;
        }

        if self.title == other.title && self.author == other.author {
            return true;
        }

        self.content_hash() == other.content_hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_item() -> FeedItem {
        FeedItem {
            title: "Rust 1.80 released".to_string(),
            link: "https://example.com/rust-1-80".to_string(),
            description: "Release notes".to_string(),
            author: "The Rust Team".to_string(),
            pub_date: "2025-06-01T12:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_sanitize_trims_all_fields() {
        let mut item = FeedItem {
            title: "  Title  ".to_string(),
            link: " https://example.com/a ".to_string(),
            description: "\tdesc\n".to_string(),
            author: " A ".to_string(),
            pub_date: " 2025-06-01T12:00:00Z ".to_string(),
        };
        item.sanitize();
        assert_eq!(item.title, "Title");
        assert_eq!(item.link, "https://example.com/a");
        assert_eq!(item.description, "desc");
        assert_eq!(item.author, "A");
        assert_eq!(item.pub_date, "2025-06-01T12:00:00Z");
    }

    #[test]
    fn test_validate_accepts_valid_item() {
        assert!(valid_item().validate().is_ok());
    }

    #[test]
    fn test_validate_empty_pub_date_is_allowed() {
        let item = FeedItem {
            pub_date: String::new(),
            ..valid_item()
        };
        assert!(item.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_title() {
        let item = FeedItem {
            title: "   ".to_string(),
            ..valid_item()
        };
        let err = item.validate().unwrap_err();
        assert!(err.to_string().contains("title cannot be empty"));
    }

    #[test]
    fn test_validate_rejects_oversized_fields() {
        let item = FeedItem {
            title: "t".repeat(MAX_TITLE_LENGTH + 1),
            description: "d".repeat(MAX_DESCRIPTION_LENGTH + 1),
            author: "a".repeat(MAX_AUTHOR_LENGTH + 1),
            ..valid_item()
        };
        let err = item.validate().unwrap_err().to_string();
        assert!(err.contains("title cannot exceed"));
        assert!(err.contains("description cannot exceed"));
        assert!(err.contains("author cannot exceed"));
    }

    #[test]
    fn test_validate_rejects_bad_link_and_date() {
        let item = FeedItem {
            link: "not a url".to_string(),
            pub_date: "June 1st, 2025".to_string(),
            ..valid_item()
        };
        let err = item.validate().unwrap_err().to_string();
        assert!(err.contains("link must be a valid URL"));
        assert!(err.contains("pub_date must be in RFC 3339 format"));
    }

    #[test]
    fn test_content_hash_is_stable_hex() {
        let item = valid_item();
        let hash = item.content_hash();
        assert_eq!(hash.len(), 32);
        assert_eq!(hash, item.content_hash());
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_content_hash_ignores_link_and_date() {
        let a = valid_item();
        let b = FeedItem {
            link: "https://example.com/other".to_string(),
            pub_date: "2025-06-02T12:00:00Z".to_string(),
            ..valid_item()
        };
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_is_duplicate_by_link() {
        let a = valid_item();
        let b = FeedItem {
            title: "Entirely different".to_string(),
            ..valid_item()
        };
        assert!(a.is_duplicate(&b));
    }

    #[test]
    fn test_is_duplicate_by_title_and_author() {
        let a = valid_item();
        let b = FeedItem {
            link: "https://example.com/mirror".to_string(),
            description: "Different description".to_string(),
            ..valid_item()
        };
        assert!(a.is_duplicate(&b));
    }

    #[test]
    fn test_is_duplicate_by_content_hash() {
        let a = valid_item();
        let b = FeedItem {
            link: "https://example.com/mirror".to_string(),
            ..valid_item()
        };
        assert!(a.is_duplicate(&b));
    }

    #[test]
    fn test_distinct_items_are_not_duplicates() {
        let a = valid_item();
        let b = FeedItem {
            title: "Other title".to_string(),
            link: "https://example.com/b".to_string(),
            description: "Other description".to_string(),
            author: "Someone Else".to_string(),
            pub_date: String::new(),
        };
        assert!(!a.is_duplicate(&b));
    }
}
