//! Store boundary used by the aggregation core.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::repository::{EntryRepository, FeedRepository};
use super::types::{Entry, Feed, NewEntry};
use crate::db::Database;
use crate::error::StoreResult;

/// Persistent feed and entry storage.
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// Atomically select the stalest feed and mark it fetched at `now`.
    ///
    /// Returns `None` when no feeds are registered.
    async fn claim_stalest_feed(&self, now: DateTime<Utc>) -> StoreResult<Option<Feed>>;

    /// Insert an entry. A duplicate link is reported as a unique violation.
    async fn insert_entry(&self, entry: &NewEntry) -> StoreResult<Entry>;
}

#[async_trait]
impl FeedStore for Database {
    async fn claim_stalest_feed(&self, now: DateTime<Utc>) -> StoreResult<Option<Feed>> {
        FeedRepository::new(self.pool()).claim_stalest(now).await
    }

    async fn insert_entry(&self, entry: &NewEntry) -> StoreResult<Entry> {
        EntryRepository::new(self.pool()).create(entry).await
    }
}
