//! Entry writing with link-based deduplication.

use tracing::debug;
use uuid::Uuid;

use super::store::FeedStore;
use super::types::{EntryCandidate, NewEntry, WriteOutcome};
use crate::error::StoreResult;

/// Identity of the entry-link uniqueness constraint.
pub const ENTRY_LINK_CONSTRAINT: &str = "entries.link";

/// Store a candidate as an entry of `feed_id`.
///
/// A link that is already stored yields [`WriteOutcome::Skipped`]. Every
/// other failure, including violations of other constraints, is returned.
pub async fn write_entry(
    store: &dyn FeedStore,
    feed_id: Uuid,
    candidate: &EntryCandidate,
) -> StoreResult<WriteOutcome> {
    let entry = NewEntry::from_candidate(feed_id, candidate);

    match store.insert_entry(&entry).await {
        Ok(stored) => Ok(WriteOutcome::Inserted(stored)),
        Err(e) if e.is_unique_violation_on(ENTRY_LINK_CONSTRAINT) => {
            debug!(link = %candidate.link, "Entry already stored");
            Ok(WriteOutcome::Skipped)
        }
        Err(e) => Err(e),
    }
}
