//! Database schema and migrations for gator.
//!
//! Migrations are applied in order when the database is first opened or
//! upgraded; the schema_version table records which ones have run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: Feeds table
    r#"
-- Registered RSS sources; last_fetched_at drives staleness ordering
CREATE TABLE feeds (
    id              TEXT PRIMARY KEY,        -- UUID
    url             TEXT NOT NULL UNIQUE,
    name            TEXT NOT NULL,
    user_id         TEXT NOT NULL,           -- owning user (UUID, managed elsewhere)
    last_fetched_at TEXT,                    -- RFC 3339 UTC, NULL = never fetched
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX idx_feeds_last_fetched_at ON feeds(last_fetched_at);
"#,
    // v2: Entries table
    r#"
-- Items parsed from feeds; link is the system-wide dedup key
CREATE TABLE entries (
    id              TEXT PRIMARY KEY,        -- UUID
    feed_id         TEXT NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
    title           TEXT NOT NULL,
    link            TEXT NOT NULL UNIQUE,
    description     TEXT,
    published_at    TEXT,                    -- NULL when the source date was unrecognized
    created_at      TEXT NOT NULL
);

CREATE INDEX idx_entries_feed_id ON entries(feed_id);
CREATE INDEX idx_entries_published_at ON entries(published_at);
"#,
];
