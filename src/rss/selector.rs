//! Feed selection.

use chrono::Utc;
use tracing::debug;

use super::store::FeedStore;
use super::types::Feed;
use crate::{GatorError, Result};

/// Pick the stalest feed and mark it fetched now.
///
/// Selection and marking happen in one store operation, so two callers
/// never receive the same stalest feed for the same moment.
pub async fn select_next(store: &dyn FeedStore) -> Result<Feed> {
    let feed = store
        .claim_stalest_feed(Utc::now())
        .await?
        .ok_or(GatorError::NoFeedsRegistered)?;

    debug!(feed = %feed.name, url = %feed.url, "Selected feed");
    Ok(feed)
}
