//! Feed aggregation for gator.
//!
//! This module polls registered RSS feeds and stores their items as
//! entries, each link at most once.

pub mod fetcher;
pub mod normalize;
pub mod repository;
pub mod scheduler;
pub mod selector;
pub mod store;
pub mod types;
pub mod writer;

pub use fetcher::{parse_feed, validate_url, FetchFeed, RssFetcher};
pub use normalize::{normalize, normalize_with_layout, DateLayout, DATE_LAYOUTS};
pub use repository::{EntryRepository, FeedRepository};
pub use scheduler::{Aggregator, MIN_INTERVAL};
pub use selector::select_next;
pub use store::FeedStore;
pub use types::{
    CycleReport, Entry, EntryCandidate, Feed, FeedDocument, NewEntry, NewFeed, ParsedItem,
    WriteOutcome,
};
pub use writer::{write_entry, ENTRY_LINK_CONSTRAINT};
