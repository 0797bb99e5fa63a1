//! Aggregation scheduler for gator.
//!
//! Polls one feed per interval: select the stalest feed, fetch it, and
//! store every item whose link has not been seen before.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::fetcher::FetchFeed;
use super::selector::select_next;
use super::store::FeedStore;
use super::types::{CycleReport, EntryCandidate, WriteOutcome};
use super::writer::write_entry;
use crate::config::{AggregatorConfig, CycleErrorPolicy};
use crate::{GatorError, Result};

/// Shortest polling interval; shorter values are raised to it.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Periodic feed aggregator.
pub struct Aggregator {
    store: Arc<dyn FeedStore>,
    fetcher: Arc<dyn FetchFeed>,
    interval: Duration,
    on_error: CycleErrorPolicy,
}

impl Aggregator {
    /// Create an aggregator from configuration.
    pub fn new(
        store: Arc<dyn FeedStore>,
        fetcher: Arc<dyn FetchFeed>,
        config: &AggregatorConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            interval: config.interval().max(MIN_INTERVAL),
            on_error: config.on_error,
        }
    }

    /// Override the polling interval. It is never shorter than [`MIN_INTERVAL`].
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_INTERVAL);
        self
    }

    /// Override the cycle failure policy.
    pub fn with_error_policy(mut self, on_error: CycleErrorPolicy) -> Self {
        self.on_error = on_error;
        self
    }

    /// Polling interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run the polling loop until shutdown.
    ///
    /// The first cycle starts immediately. With [`CycleErrorPolicy::Abort`]
    /// the first failed cycle ends the loop with its error; with
    /// [`CycleErrorPolicy::Continue`] failures are logged and polling goes on.
    /// Shutdown is honored between cycles, when `shutdown` becomes `true` or
    /// its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            on_error = ?self.on_error,
            "Aggregator started"
        );

        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("Shutdown sender dropped");
                        break;
                    }
                    continue;
                }
                _ = timer.tick() => {}
            }

            match self.poll_next().await {
                Ok(report) => {
                    debug!(feed = %report.feed_name, "Cycle complete");
                }
                Err(e) => match self.on_error {
                    CycleErrorPolicy::Abort => {
                        error!(error = %e, "Cycle failed, stopping aggregator");
                        return Err(e);
                    }
                    CycleErrorPolicy::Continue => {
                        warn!(error = %e, "Cycle failed, retrying next interval");
                    }
                },
            }
        }

        info!("Aggregator stopped");
        Ok(())
    }

    /// Run one poll cycle: select, fetch, write.
    pub async fn poll_next(&self) -> Result<CycleReport> {
        let feed = select_next(self.store.as_ref()).await?;
        info!(feed = %feed.name, url = %feed.url, "Polling feed");

        let document = self
            .fetcher
            .fetch(&feed.url)
            .await
            .map_err(|source| GatorError::Fetch {
                feed: feed.name.clone(),
                source,
            })?;

        let mut report = CycleReport::new(&feed);

        for item in document.items {
            let candidate = EntryCandidate::from(item);
            if candidate.published_at.is_none() && !candidate.raw_published.is_empty() {
                debug!(
                    link = %candidate.link,
                    raw = %candidate.raw_published,
                    "Unrecognized publish date"
                );
            }

            let outcome = write_entry(self.store.as_ref(), feed.id, &candidate)
                .await
                .map_err(|source| GatorError::Write {
                    feed: feed.name.clone(),
                    link: candidate.link.clone(),
                    source,
                })?;

            match outcome {
                WriteOutcome::Inserted(entry) => {
                    debug!(feed = %feed.name, title = %entry.title, "Stored entry");
                    report.inserted += 1;
                }
                WriteOutcome::Skipped => report.skipped += 1,
            }
        }

        info!(
            feed = %feed.name,
            inserted = report.inserted,
            skipped = report.skipped,
            "Feed polled"
        );
        Ok(report)
    }
}
