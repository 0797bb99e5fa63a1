//! End-to-end poll cycles against an in-memory database and a local
//! mock HTTP server.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio::sync::watch;

use common::{register_feed, rss_document, setup_test_db, test_aggregator, TestItem};
use gator::rss::{EntryRepository, FeedRepository};
use gator::{CycleErrorPolicy, FetchError, GatorError};

#[tokio::test]
async fn test_cycle_stores_new_items_once() {
    let mut server = mockito::Server::new_async().await;
    let body = rss_document(
        "Blog",
        &[
            TestItem::new("First", "https://blog.example.com/1")
                .published("Mon, 02 Jan 2006 15:04:05 MST")
                .described("Hello &amp;amp; welcome"),
            TestItem::new("Second", "https://blog.example.com/2").published("not-a-date"),
        ],
    );
    let mock = server
        .mock("GET", "/feed.xml")
        .with_status(200)
        .with_body(&body)
        .expect(2)
        .create_async()
        .await;

    let db = setup_test_db().await;
    let feed = register_feed(&db, "Blog", &format!("{}/feed.xml", server.url())).await;
    let agg = test_aggregator(db.clone());

    let first = agg.poll_next().await.unwrap();
    assert_eq!(first.feed_id, feed.id);
    assert_eq!((first.inserted, first.skipped), (2, 0));

    let second = agg.poll_next().await.unwrap();
    assert_eq!((second.inserted, second.skipped), (0, 2));
    mock.assert_async().await;

    let entries = EntryRepository::new(db.pool());
    assert_eq!(entries.count().await.unwrap(), 2);

    let one = entries
        .get_by_link("https://blog.example.com/1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(one.title, "First");
    assert_eq!(one.description.as_deref(), Some("Hello & welcome"));
    assert_eq!(
        one.published_at,
        Some(Utc.with_ymd_and_hms(2006, 1, 2, 22, 4, 5).unwrap())
    );

    // Unrecognized dates are stored without a publish time
    let two = entries
        .get_by_link("https://blog.example.com/2")
        .await
        .unwrap()
        .unwrap();
    assert!(two.published_at.is_none());
    assert!(two.description.is_none());
}

#[tokio::test]
async fn test_same_link_across_feeds_stored_once() {
    let mut server = mockito::Server::new_async().await;
    let shared = [TestItem::new("Shared", "https://news.example.com/story")];
    server
        .mock("GET", "/a.xml")
        .with_body(rss_document("A", &shared))
        .create_async()
        .await;
    server
        .mock("GET", "/b.xml")
        .with_body(rss_document("B", &shared))
        .create_async()
        .await;

    let db = setup_test_db().await;
    register_feed(&db, "A", &format!("{}/a.xml", server.url())).await;
    register_feed(&db, "B", &format!("{}/b.xml", server.url())).await;
    let agg = test_aggregator(db.clone());

    let first = agg.poll_next().await.unwrap();
    let second = agg.poll_next().await.unwrap();

    assert_ne!(first.feed_id, second.feed_id);
    assert_eq!(first.inserted + second.inserted, 1);
    assert_eq!(first.skipped + second.skipped, 1);
    assert_eq!(EntryRepository::new(db.pool()).count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_feeds_polled_stalest_first() {
    let mut server = mockito::Server::new_async().await;
    for path in ["/a.xml", "/b.xml", "/c.xml"] {
        server
            .mock("GET", path)
            .with_body(rss_document(path, &[]))
            .create_async()
            .await;
    }

    let db = setup_test_db().await;
    let repo = FeedRepository::new(db.pool());
    let a = register_feed(&db, "a", &format!("{}/a.xml", server.url())).await;
    let b = register_feed(&db, "b", &format!("{}/b.xml", server.url())).await;
    let c = register_feed(&db, "c", &format!("{}/c.xml", server.url())).await;

    // b was fetched long ago, a more recently, c never
    repo.mark_fetched(b.id, Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap())
        .await
        .unwrap();
    repo.mark_fetched(a.id, Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap())
        .await
        .unwrap();

    let agg = test_aggregator(db.clone());
    let mut order = Vec::new();
    for _ in 0..3 {
        order.push(agg.poll_next().await.unwrap().feed_id);
    }
    assert_eq!(order, [c.id, b.id, a.id]);
}

#[tokio::test]
async fn test_http_failure_reports_feed() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/down.xml")
        .with_status(503)
        .create_async()
        .await;

    let db = setup_test_db().await;
    let feed = register_feed(&db, "Down", &format!("{}/down.xml", server.url())).await;
    let agg = test_aggregator(db.clone());

    match agg.poll_next().await {
        Err(GatorError::Fetch { feed: name, source }) => {
            assert_eq!(name, "Down");
            assert!(matches!(source, FetchError::Status(s) if s.as_u16() == 503));
        }
        other => panic!("expected fetch error, got {other:?}"),
    }

    // The feed was claimed before the fetch failed
    let stored = FeedRepository::new(db.pool())
        .get_by_id(feed.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.last_fetched_at.is_some());
}

#[tokio::test]
async fn test_malformed_feed_is_decode_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/broken.xml")
        .with_body("<rss><channel><title>oops")
        .create_async()
        .await;

    let db = setup_test_db().await;
    register_feed(&db, "Broken", &format!("{}/broken.xml", server.url())).await;

    let result = test_aggregator(db).poll_next().await;
    assert!(matches!(
        result,
        Err(GatorError::Fetch {
            source: FetchError::Decode(_),
            ..
        })
    ));
}

#[tokio::test]
async fn test_run_continue_keeps_polling_other_feeds() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/down.xml")
        .with_status(500)
        .create_async()
        .await;
    server
        .mock("GET", "/up.xml")
        .with_body(rss_document(
            "Up",
            &[TestItem::new("Alive", "https://up.example.com/1")],
        ))
        .create_async()
        .await;

    let db = setup_test_db().await;
    register_feed(&db, "Down", &format!("{}/down.xml", server.url())).await;
    register_feed(&db, "Up", &format!("{}/up.xml", server.url())).await;

    let agg = test_aggregator(db.clone())
        .with_interval(Duration::from_millis(20))
        .with_error_policy(CycleErrorPolicy::Continue);

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(async move { agg.run(rx).await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    assert_eq!(EntryRepository::new(db.pool()).count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_run_abort_stops_on_empty_store() {
    let db = setup_test_db().await;
    let agg = test_aggregator(db);

    let (_tx, rx) = watch::channel(false);
    let result = agg.run(rx).await;
    assert!(matches!(result, Err(GatorError::NoFeedsRegistered)));
}

#[tokio::test]
async fn test_concurrent_claims_take_distinct_feeds() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db = Arc::new(
        gator::Database::open(temp_dir.path().join("gator.db"))
            .await
            .unwrap(),
    );

    const NUM_FEEDS: usize = 8;
    for i in 0..NUM_FEEDS {
        register_feed(&db, &format!("feed-{i}"), &format!("https://example.com/{i}.xml")).await;
    }

    let mut handles = Vec::new();
    for _ in 0..NUM_FEEDS {
        let db = Arc::clone(&db);
        handles.push(tokio::spawn(async move {
            gator::rss::select_next(db.as_ref()).await.map(|f| f.id)
        }));
    }

    let mut claimed = Vec::new();
    for handle in handles {
        claimed.push(handle.await.unwrap().unwrap());
    }
    claimed.sort();
    claimed.dedup();
    assert_eq!(claimed.len(), NUM_FEEDS, "every claim should pick a different feed");

    db.close().await;
}
