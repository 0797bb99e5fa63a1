//! Test helpers for integration tests.
//!
//! Provides an in-memory database, feed registration and RSS document
//! builders for a local mock HTTP server.

#![allow(dead_code)]

use std::sync::Arc;

use gator::config::{AggregatorConfig, FetcherConfig};
use gator::rss::{Feed, FeedRepository, NewFeed};
use gator::{Aggregator, Database, RssFetcher};
use uuid::Uuid;

/// Open a migrated in-memory database.
pub async fn setup_test_db() -> Arc<Database> {
    Arc::new(Database::open_in_memory().await.unwrap())
}

/// Register a feed pointing at `url`.
pub async fn register_feed(db: &Database, name: &str, url: &str) -> Feed {
    FeedRepository::new(db.pool())
        .create(&NewFeed::new(name, url, Uuid::new_v4()))
        .await
        .unwrap()
}

/// Fetcher settings that allow the loopback mock server.
pub fn test_fetcher_config() -> FetcherConfig {
    FetcherConfig {
        allow_private_hosts: true,
        connect_timeout_secs: 2,
        read_timeout_secs: 2,
        total_timeout_secs: 5,
        ..FetcherConfig::default()
    }
}

/// Aggregator over `db` using a real HTTP fetcher.
pub fn test_aggregator(db: Arc<Database>) -> Aggregator {
    let fetcher = RssFetcher::new(&test_fetcher_config()).unwrap();
    Aggregator::new(db, Arc::new(fetcher), &AggregatorConfig::default())
}

/// One `<item>` of an RSS document.
pub struct TestItem<'a> {
    pub title: &'a str,
    pub link: &'a str,
    pub description: &'a str,
    pub pub_date: &'a str,
}

impl<'a> TestItem<'a> {
    pub fn new(title: &'a str, link: &'a str) -> Self {
        Self {
            title,
            link,
            description: "",
            pub_date: "",
        }
    }

    pub fn published(mut self, pub_date: &'a str) -> Self {
        self.pub_date = pub_date;
        self
    }

    pub fn described(mut self, description: &'a str) -> Self {
        self.description = description;
        self
    }
}

/// Build an RSS 2.0 document. Item fields are inserted verbatim.
pub fn rss_document(title: &str, items: &[TestItem<'_>]) -> String {
    let mut body = String::new();
    for item in items {
        body.push_str(&format!(
            "<item><title>{}</title><link>{}</link><description>{}</description><pubDate>{}</pubDate></item>\n",
            item.title, item.link, item.description, item.pub_date
        ));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
<channel>
<title>{title}</title>
<link>https://example.com/</link>
<atom:link href="https://example.com/feed.xml" rel="self" type="application/rss+xml"/>
<description>Test feed</description>
{body}</channel>
</rss>"#
    )
}
