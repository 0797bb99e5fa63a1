//! Feed and entry repositories for gator.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::types::{Entry, Feed, NewEntry, NewFeed};
use crate::db::{format_timestamp, parse_datetime, DbPool};
use crate::error::{StoreError, StoreResult};

const FEED_COLUMNS: &str = "id, url, name, user_id, last_fetched_at, created_at, updated_at";

const ENTRY_COLUMNS: &str = "id, feed_id, title, link, description, published_at, created_at";

/// Row type for feeds.
#[derive(Debug, Clone, sqlx::FromRow)]
struct FeedRow {
    id: String,
    url: String,
    name: String,
    user_id: String,
    last_fetched_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<FeedRow> for Feed {
    type Error = StoreError;

    fn try_from(row: FeedRow) -> StoreResult<Self> {
        Ok(Feed {
            id: decode_uuid(&row.id)?,
            url: row.url,
            name: row.name,
            user_id: decode_uuid(&row.user_id)?,
            last_fetched_at: row
                .last_fetched_at
                .as_deref()
                .map(decode_timestamp)
                .transpose()?,
            created_at: decode_timestamp(&row.created_at)?,
            updated_at: decode_timestamp(&row.updated_at)?,
        })
    }
}

/// Row type for entries.
#[derive(Debug, Clone, sqlx::FromRow)]
struct EntryRow {
    id: String,
    feed_id: String,
    title: String,
    link: String,
    description: Option<String>,
    published_at: Option<String>,
    created_at: String,
}

impl TryFrom<EntryRow> for Entry {
    type Error = StoreError;

    fn try_from(row: EntryRow) -> StoreResult<Self> {
        Ok(Entry {
            id: decode_uuid(&row.id)?,
            feed_id: decode_uuid(&row.feed_id)?,
            title: row.title,
            link: row.link,
            description: row.description,
            published_at: row
                .published_at
                .as_deref()
                .map(decode_timestamp)
                .transpose()?,
            created_at: decode_timestamp(&row.created_at)?,
        })
    }
}

fn decode_uuid(s: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| StoreError::Decode(format!("invalid id {s:?}: {e}")))
}

fn decode_timestamp(s: &str) -> StoreResult<DateTime<Utc>> {
    parse_datetime(s).ok_or_else(|| StoreError::Decode(format!("invalid timestamp {s:?}")))
}

/// Repository for feed operations.
pub struct FeedRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> FeedRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Register a new feed.
    pub async fn create(&self, feed: &NewFeed) -> StoreResult<Feed> {
        self.create_at(feed, Utc::now()).await
    }

    /// Register a new feed with an explicit creation time.
    pub async fn create_at(&self, feed: &NewFeed, created_at: DateTime<Utc>) -> StoreResult<Feed> {
        let now = format_timestamp(&created_at);
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            r#"
            INSERT INTO feeds (id, url, name, user_id, last_fetched_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NULL, $5, $5)
            RETURNING {FEED_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(&feed.url)
        .bind(&feed.name)
        .bind(feed.user_id.to_string())
        .bind(&now)
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Get a feed by ID.
    pub async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<Feed>> {
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE id = $1"
        ))
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await?;

        row.map(Feed::try_from).transpose()
    }

    /// Get a feed by URL.
    pub async fn get_by_url(&self, url: &str) -> StoreResult<Option<Feed>> {
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE url = $1"
        ))
        .bind(url)
        .fetch_optional(self.pool)
        .await?;

        row.map(Feed::try_from).transpose()
    }

    /// List all feeds in registration order.
    pub async fn list_all(&self) -> StoreResult<Vec<Feed>> {
        let rows = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Feed::try_from).collect()
    }

    /// Count registered feeds.
    pub async fn count(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feeds")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Select the stalest feed and stamp it as fetched at `now`, in one statement.
    ///
    /// Never-fetched feeds come first, then the oldest `last_fetched_at`;
    /// ties go to the earliest `created_at`, then the smallest id. The stored
    /// `last_fetched_at` never moves backwards. Returns the feed with its
    /// updated timestamps, or `None` when no feeds exist.
    pub async fn claim_stalest(&self, now: DateTime<Utc>) -> StoreResult<Option<Feed>> {
        let now = format_timestamp(&now);
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            r#"
            UPDATE feeds
            SET last_fetched_at = CASE
                    WHEN last_fetched_at IS NULL OR last_fetched_at < $1 THEN $1
                    ELSE last_fetched_at
                END,
                updated_at = $1
            WHERE id = (
                SELECT id FROM feeds
                ORDER BY last_fetched_at ASC NULLS FIRST, created_at ASC, id ASC
                LIMIT 1
            )
            RETURNING {FEED_COLUMNS}
            "#
        ))
        .bind(&now)
        .fetch_optional(self.pool)
        .await?;

        row.map(Feed::try_from).transpose()
    }

    /// Peek at the feed that would be claimed next, without marking it.
    pub async fn next_to_fetch(&self) -> StoreResult<Option<Feed>> {
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            r#"
            SELECT {FEED_COLUMNS} FROM feeds
            ORDER BY last_fetched_at ASC NULLS FIRST, created_at ASC, id ASC
            LIMIT 1
            "#
        ))
        .fetch_optional(self.pool)
        .await?;

        row.map(Feed::try_from).transpose()
    }

    /// Record a fetch of `id` at `at`.
    ///
    /// An earlier `at` than the stored value leaves `last_fetched_at` as is.
    /// Returns false if the feed does not exist.
    pub async fn mark_fetched(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        let at = format_timestamp(&at);
        let result = sqlx::query(
            r#"
            UPDATE feeds
            SET last_fetched_at = CASE
                    WHEN last_fetched_at IS NULL OR last_fetched_at < $1 THEN $1
                    ELSE last_fetched_at
                END,
                updated_at = $1
            WHERE id = $2
            "#,
        )
        .bind(&at)
        .bind(id.to_string())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Repository for entry operations.
pub struct EntryRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> EntryRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert an entry.
    ///
    /// A duplicate link fails with [`StoreError::UniqueViolation`] naming
    /// `entries.link`.
    pub async fn create(&self, entry: &NewEntry) -> StoreResult<Entry> {
        let row = sqlx::query_as::<_, EntryRow>(&format!(
            r#"
            INSERT INTO entries (id, feed_id, title, link, description, published_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ENTRY_COLUMNS}
            "#
        ))
        .bind(entry.id.to_string())
        .bind(entry.feed_id.to_string())
        .bind(&entry.title)
        .bind(&entry.link)
        .bind(&entry.description)
        .bind(entry.published_at.as_ref().map(format_timestamp))
        .bind(format_timestamp(&entry.created_at))
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Get an entry by link.
    pub async fn get_by_link(&self, link: &str) -> StoreResult<Option<Entry>> {
        let row = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE link = $1"
        ))
        .bind(link)
        .fetch_optional(self.pool)
        .await?;

        row.map(Entry::try_from).transpose()
    }

    /// List entries for a feed, newest first.
    pub async fn list_by_feed(&self, feed_id: Uuid, limit: usize) -> StoreResult<Vec<Entry>> {
        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS} FROM entries
            WHERE feed_id = $1
            ORDER BY COALESCE(published_at, created_at) DESC, id DESC
            LIMIT $2
            "#
        ))
        .bind(feed_id.to_string())
        .bind(limit as i64)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Entry::try_from).collect()
    }

    /// Count all entries.
    pub async fn count(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Count entries for a feed.
    pub async fn count_by_feed(&self, feed_id: Uuid) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE feed_id = $1")
            .bind(feed_id.to_string())
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use chrono::{Duration, TimeZone};

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
    }

    async fn create_feed(db: &Database, name: &str, created_at: DateTime<Utc>) -> Feed {
        let repo = FeedRepository::new(db.pool());
        let feed = NewFeed::new(name, format!("https://example.com/{name}.xml"), Uuid::new_v4());
        repo.create_at(&feed, created_at).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_feed() {
        let db = setup_db().await;
        let repo = FeedRepository::new(db.pool());
        let user_id = Uuid::new_v4();

        let feed = repo
            .create(&NewFeed::new("Test Feed", "https://example.com/feed.xml", user_id))
            .await
            .unwrap();

        assert_eq!(feed.url, "https://example.com/feed.xml");
        assert_eq!(feed.name, "Test Feed");
        assert_eq!(feed.user_id, user_id);
        assert!(feed.last_fetched_at.is_none());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_feed_by_id_and_url() {
        let db = setup_db().await;
        let created = create_feed(&db, "blog", t(9)).await;
        let repo = FeedRepository::new(db.pool());

        let by_id = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id, created);

        let by_url = repo.get_by_url(&created.url).await.unwrap().unwrap();
        assert_eq!(by_url.id, created.id);

        assert!(repo.get_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_feed_url() {
        let db = setup_db().await;
        let repo = FeedRepository::new(db.pool());
        let feed = NewFeed::new("A", "https://example.com/feed.xml", Uuid::new_v4());
        repo.create(&feed).await.unwrap();

        let err = repo.create(&feed).await.unwrap_err();
        assert!(err.is_unique_violation_on("feeds.url"), "{err:?}");
    }

    #[tokio::test]
    async fn test_list_all_in_registration_order() {
        let db = setup_db().await;
        create_feed(&db, "second", t(10)).await;
        create_feed(&db, "first", t(9)).await;

        let feeds = FeedRepository::new(db.pool()).list_all().await.unwrap();
        let names: Vec<&str> = feeds.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["first", "second"]);
    }

    #[tokio::test]
    async fn test_claim_stalest_empty() {
        let db = setup_db().await;
        let repo = FeedRepository::new(db.pool());
        assert!(repo.claim_stalest(t(12)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_prefers_never_fetched() {
        let db = setup_db().await;
        let repo = FeedRepository::new(db.pool());
        let a = create_feed(&db, "a", t(8)).await;
        let b = create_feed(&db, "b", t(7)).await;
        repo.mark_fetched(b.id, t(11)).await.unwrap();

        let claimed = repo.claim_stalest(t(12)).await.unwrap().unwrap();
        assert_eq!(claimed.id, a.id);
        assert_eq!(claimed.last_fetched_at, Some(t(12)));
        assert_eq!(claimed.updated_at, t(12));
    }

    #[tokio::test]
    async fn test_claim_oldest_fetch_first() {
        let db = setup_db().await;
        let repo = FeedRepository::new(db.pool());
        let a = create_feed(&db, "a", t(1)).await;
        let b = create_feed(&db, "b", t(2)).await;
        repo.mark_fetched(a.id, t(10)).await.unwrap();
        repo.mark_fetched(b.id, t(9)).await.unwrap();

        let claimed = repo.claim_stalest(t(12)).await.unwrap().unwrap();
        assert_eq!(claimed.id, b.id);
    }

    #[tokio::test]
    async fn test_claim_tie_broken_by_created_at() {
        let db = setup_db().await;
        let repo = FeedRepository::new(db.pool());
        let later = create_feed(&db, "later", t(3)).await;
        let earlier = create_feed(&db, "earlier", t(2)).await;

        let first = repo.claim_stalest(t(12)).await.unwrap().unwrap();
        let second = repo.claim_stalest(t(13)).await.unwrap().unwrap();
        assert_eq!(first.id, earlier.id);
        assert_eq!(second.id, later.id);
    }

    #[tokio::test]
    async fn test_claim_rotates_through_feeds() {
        let db = setup_db().await;
        let repo = FeedRepository::new(db.pool());
        let a = create_feed(&db, "a", t(1)).await;
        let b = create_feed(&db, "b", t(2)).await;

        let mut claimed = Vec::new();
        for i in 0..4 {
            let now = t(12) + Duration::minutes(i);
            claimed.push(repo.claim_stalest(now).await.unwrap().unwrap().id);
        }
        assert_eq!(claimed, [a.id, b.id, a.id, b.id]);
    }

    #[tokio::test]
    async fn test_claim_never_moves_backwards() {
        let db = setup_db().await;
        let repo = FeedRepository::new(db.pool());
        let feed = create_feed(&db, "only", t(1)).await;
        repo.mark_fetched(feed.id, t(12)).await.unwrap();

        let claimed = repo.claim_stalest(t(6)).await.unwrap().unwrap();
        assert_eq!(claimed.id, feed.id);
        assert_eq!(claimed.last_fetched_at, Some(t(12)));
    }

    #[tokio::test]
    async fn test_next_to_fetch_does_not_mark() {
        let db = setup_db().await;
        let repo = FeedRepository::new(db.pool());
        let feed = create_feed(&db, "only", t(1)).await;

        let next = repo.next_to_fetch().await.unwrap().unwrap();
        assert_eq!(next.id, feed.id);
        assert!(next.last_fetched_at.is_none());

        let again = repo.get_by_id(feed.id).await.unwrap().unwrap();
        assert!(again.last_fetched_at.is_none());
    }

    #[tokio::test]
    async fn test_mark_fetched_monotonic() {
        let db = setup_db().await;
        let repo = FeedRepository::new(db.pool());
        let feed = create_feed(&db, "only", t(1)).await;

        assert!(repo.mark_fetched(feed.id, t(10)).await.unwrap());
        assert!(repo.mark_fetched(feed.id, t(5)).await.unwrap());

        let stored = repo.get_by_id(feed.id).await.unwrap().unwrap();
        assert_eq!(stored.last_fetched_at, Some(t(10)));

        assert!(!repo.mark_fetched(Uuid::new_v4(), t(10)).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_entry() {
        let db = setup_db().await;
        let feed = create_feed(&db, "blog", t(1)).await;
        let repo = EntryRepository::new(db.pool());

        let new_entry = NewEntry::new(feed.id, "Hello", "https://example.com/hello")
            .with_description("First post")
            .with_published_at(t(9));
        let entry = repo.create(&new_entry).await.unwrap();

        assert_eq!(entry.id, new_entry.id);
        assert_eq!(entry.feed_id, feed.id);
        assert_eq!(entry.title, "Hello");
        assert_eq!(entry.description, Some("First post".to_string()));
        assert_eq!(entry.published_at, Some(t(9)));

        let by_link = repo
            .get_by_link("https://example.com/hello")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_link, entry);
    }

    #[tokio::test]
    async fn test_create_entry_without_optional_fields() {
        let db = setup_db().await;
        let feed = create_feed(&db, "blog", t(1)).await;
        let repo = EntryRepository::new(db.pool());

        let entry = repo
            .create(&NewEntry::new(feed.id, "Bare", "https://example.com/bare"))
            .await
            .unwrap();
        assert!(entry.description.is_none());
        assert!(entry.published_at.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_link_is_unique_violation() {
        let db = setup_db().await;
        let a = create_feed(&db, "a", t(1)).await;
        let b = create_feed(&db, "b", t(2)).await;
        let repo = EntryRepository::new(db.pool());

        repo.create(&NewEntry::new(a.id, "One", "https://example.com/x"))
            .await
            .unwrap();
        // Link uniqueness spans feeds
        let err = repo
            .create(&NewEntry::new(b.id, "Two", "https://example.com/x"))
            .await
            .unwrap_err();

        assert!(err.is_unique_violation_on("entries.link"), "{err:?}");
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_entry_requires_existing_feed() {
        let db = setup_db().await;
        let repo = EntryRepository::new(db.pool());

        let err = repo
            .create(&NewEntry::new(Uuid::new_v4(), "Orphan", "https://example.com/o"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Database(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_list_and_count_by_feed() {
        let db = setup_db().await;
        let a = create_feed(&db, "a", t(1)).await;
        let b = create_feed(&db, "b", t(2)).await;
        let repo = EntryRepository::new(db.pool());

        repo.create(&NewEntry::new(a.id, "Old", "https://example.com/old").with_published_at(t(3)))
            .await
            .unwrap();
        repo.create(&NewEntry::new(a.id, "New", "https://example.com/new").with_published_at(t(5)))
            .await
            .unwrap();
        repo.create(&NewEntry::new(b.id, "Other", "https://example.com/other"))
            .await
            .unwrap();

        assert_eq!(repo.count_by_feed(a.id).await.unwrap(), 2);
        assert_eq!(repo.count_by_feed(b.id).await.unwrap(), 1);
        assert_eq!(repo.count().await.unwrap(), 3);

        let titles: Vec<String> = repo
            .list_by_feed(a.id, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, ["New", "Old"]);

        assert_eq!(repo.list_by_feed(a.id, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_row_is_decode_error() {
        let db = setup_db().await;
        sqlx::query(
            "INSERT INTO feeds (id, url, name, user_id, created_at, updated_at)
             VALUES ('not-a-uuid', 'https://example.com/c.xml', 'c', 'x', 'y', 'z')",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let err = FeedRepository::new(db.pool()).list_all().await.unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)), "{err:?}");
    }
}
