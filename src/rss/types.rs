//! RSS types for gator.

use chrono::{DateTime, FixedOffset, Utc};
use uuid::Uuid;

use super::normalize::normalize;

/// A registered RSS feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Feed {
    /// Feed ID.
    pub id: Uuid,
    /// Feed URL (unique).
    pub url: String,
    /// Display name.
    pub name: String,
    /// Owning user.
    pub user_id: Uuid,
    /// Last time a fetch of this feed was started.
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// When the feed was registered.
    pub created_at: DateTime<Utc>,
    /// When the feed row was last modified.
    pub updated_at: DateTime<Utc>,
}

/// New feed for registration.
#[derive(Debug, Clone)]
pub struct NewFeed {
    /// Feed URL.
    pub url: String,
    /// Display name.
    pub name: String,
    /// Owning user.
    pub user_id: Uuid,
}

impl NewFeed {
    /// Create a new feed registration.
    pub fn new(name: impl Into<String>, url: impl Into<String>, user_id: Uuid) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            user_id,
        }
    }
}

/// A feed as decoded from one fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedDocument {
    /// Channel title.
    pub title: String,
    /// Channel description.
    pub description: String,
    /// Items in document order.
    pub items: Vec<ParsedItem>,
}

/// A decoded `<item>` element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedItem {
    /// Item title.
    pub title: String,
    /// Item link.
    pub link: String,
    /// Item description (may be empty).
    pub description: String,
    /// Raw `pubDate` text.
    pub pub_date: String,
}

/// An item ready to be written as an entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryCandidate {
    /// Entry title.
    pub title: String,
    /// Entry link, the dedup key.
    pub link: String,
    /// Description, `None` when the source supplied an empty string.
    pub description: Option<String>,
    /// Publish date as supplied by the feed.
    pub raw_published: String,
    /// Normalized publish date, if the raw text was recognized.
    pub published_at: Option<DateTime<FixedOffset>>,
}

impl From<ParsedItem> for EntryCandidate {
    fn from(item: ParsedItem) -> Self {
        let published_at = normalize(&item.pub_date);
        let description = if item.description.is_empty() {
            None
        } else {
            Some(item.description)
        };

        Self {
            title: item.title,
            link: item.link,
            description,
            raw_published: item.pub_date,
            published_at,
        }
    }
}

/// A persisted entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Entry ID.
    pub id: Uuid,
    /// Feed that produced the entry.
    pub feed_id: Uuid,
    /// Entry title.
    pub title: String,
    /// Entry link (unique across all entries).
    pub link: String,
    /// Entry description.
    pub description: Option<String>,
    /// Normalized publish date.
    pub published_at: Option<DateTime<Utc>>,
    /// When the entry was stored.
    pub created_at: DateTime<Utc>,
}

/// New entry for insertion.
#[derive(Debug, Clone)]
pub struct NewEntry {
    /// Entry ID.
    pub id: Uuid,
    /// Feed that produced the entry.
    pub feed_id: Uuid,
    /// Entry title.
    pub title: String,
    /// Entry link.
    pub link: String,
    /// Entry description.
    pub description: Option<String>,
    /// Normalized publish date.
    pub published_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl NewEntry {
    /// Create a new entry with a fresh ID.
    pub fn new(feed_id: Uuid, title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            feed_id,
            title: title.into(),
            link: link.into(),
            description: None,
            published_at: None,
            created_at: Utc::now(),
        }
    }

    /// Build an entry from a candidate.
    pub fn from_candidate(feed_id: Uuid, candidate: &EntryCandidate) -> Self {
        let mut entry = Self::new(feed_id, &candidate.title, &candidate.link);
        entry.description = candidate.description.clone();
        entry.published_at = candidate.published_at.map(|dt| dt.with_timezone(&Utc));
        entry
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the publish date.
    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }
}

/// Outcome of writing one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// A new entry was stored.
    Inserted(Entry),
    /// An entry with the same link already exists.
    Skipped,
}

/// Summary of one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Polled feed.
    pub feed_id: Uuid,
    /// Polled feed name.
    pub feed_name: String,
    /// Entries newly stored.
    pub inserted: usize,
    /// Entries already known.
    pub skipped: usize,
}

impl CycleReport {
    /// Create an empty report for a feed.
    pub fn new(feed: &Feed) -> Self {
        Self {
            feed_id: feed.id,
            feed_name: feed.name.clone(),
            inserted: 0,
            skipped: 0,
        }
    }
}
