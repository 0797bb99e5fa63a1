//! gator - personal RSS feed aggregator
//!
//! Polls registered feeds one at a time, stalest first, and stores each
//! item link exactly once.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod rss;

pub use config::{Config, CycleErrorPolicy};
pub use db::Database;
pub use error::{FetchError, GatorError, Result, StoreError, StoreResult};
pub use rss::{Aggregator, FeedStore, FetchFeed, RssFetcher};
