//! Engine orchestration
//!
//! `LiveMapEngine` composes the store, detector, feed, and publisher, and
//! owns the background tasks that pump the external sources into them: the
//! periodic snapshot poll and the realtime subscriptions. All mutation of
//! the store happens inside these tasks, one event at a time; consumers
//! only ever see published snapshots.
//!
//! There is no internal retry policy. A failed fetch reports disconnection
//! and leaves existing state untouched; the next scheduled poll is the sole
//! recovery mechanism, and a closed subscription is the external store's
//! problem to re-establish.

use crate::config::EngineConfig;
use crate::detector::ChangeDetector;
use crate::events::{AccessEvent, RecentEvents};
use crate::snapshot::{Snapshot, SnapshotPublisher};
use crate::source::{PopulationSource, RecordSource, SnapshotClient, SourceStatus};
use crate::store::AggregationStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{info, warn};

/// Window for the "events in the last minute" counter
const LAST_MINUTE_WINDOW: Duration = Duration::from_secs(60);

/// Owns the aggregation core and its source-pump tasks
pub struct LiveMapEngine {
    store: Arc<AggregationStore>,
    feed: Arc<Mutex<RecentEvents>>,
    detector: Arc<Mutex<ChangeDetector>>,
    status: Arc<SourceStatus>,
    publisher: SnapshotPublisher,
    config: EngineConfig,
    tasks: Vec<JoinHandle<()>>,
}

impl LiveMapEngine {
    pub fn new(config: EngineConfig) -> Self {
        let store = Arc::new(AggregationStore::new(config.recency_window));
        let feed = Arc::new(Mutex::new(RecentEvents::new(config.recent_events_capacity)));
        let detector = Arc::new(Mutex::new(ChangeDetector::new(
            Arc::clone(&store),
            Arc::clone(&feed),
        )));
        let status = Arc::new(SourceStatus::default());
        let publisher = SnapshotPublisher::new(
            Arc::clone(&store),
            Arc::clone(&status),
            config.show_inactive_regions,
        );

        Self {
            store,
            feed,
            detector,
            status,
            publisher,
            config,
            tasks: Vec::new(),
        }
    }

    /// Start polling the pre-aggregated snapshot endpoint
    ///
    /// Each successful fetch installs the document's rows with full-replace
    /// authority; a failure flips the status to disconnected and keeps the
    /// stale state available.
    pub fn start_polling(&mut self, client: SnapshotClient) {
        let store = Arc::clone(&self.store);
        let status = Arc::clone(&self.status);
        let poll_interval = self.config.poll_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval(poll_interval);
            loop {
                ticker.tick().await;

                match client.fetch().await {
                    Ok(document) => {
                        let last_updated = document.last_updated;
                        match document.into_rows() {
                            Ok(rows) => {
                                let rows =
                                    rows.into_iter().map(|r| r.into_region_row()).collect();
                                store.full_replace(rows, last_updated).await;
                                status.set_connected();
                            }
                            Err(e) => {
                                warn!(error = %e, "Snapshot document had no usable rows");
                                status.set_error(e.to_string());
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Snapshot fetch failed, keeping stale state");
                        status.set_error(e.to_string());
                    }
                }
            }
        });

        self.tasks.push(handle);
        info!(interval_secs = poll_interval.as_secs(), "Snapshot polling started");
    }

    /// Attach a subscribe-to-newly-added-entries source
    ///
    /// The source's initial key replay seeds the detector's dedup set before
    /// any record is counted.
    pub fn attach_record_source<S>(&mut self, mut source: S)
    where
        S: RecordSource + 'static,
    {
        let detector = Arc::clone(&self.detector);
        let status = Arc::clone(&self.status);

        let handle = tokio::spawn(async move {
            match source.initial_keys().await {
                Ok(ids) => detector.lock().await.seed_seen(ids),
                Err(e) => warn!(error = %e, "Failed to seed dedup set"),
            }

            loop {
                match source.next_record().await {
                    Ok(Some(record)) => {
                        detector.lock().await.observe_record(record).await;
                        status.set_connected();
                    }
                    Ok(None) => {
                        info!("Record subscription ended");
                        status.set_error("record subscription ended");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Record subscription failed");
                        status.set_error(e.to_string());
                        break;
                    }
                }
            }
        });

        self.tasks.push(handle);
    }

    /// Attach a full-collection subscription source
    pub fn attach_population_source<S>(&mut self, mut source: S)
    where
        S: PopulationSource + 'static,
    {
        let detector = Arc::clone(&self.detector);
        let status = Arc::clone(&self.status);

        let handle = tokio::spawn(async move {
            loop {
                match source.next_population().await {
                    Ok(Some(population)) => {
                        detector.lock().await.observe_population(population).await;
                        status.set_connected();
                    }
                    Ok(None) => {
                        info!("Population subscription ended");
                        status.set_error("population subscription ended");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Population subscription failed");
                        status.set_error(e.to_string());
                        break;
                    }
                }
            }
        });

        self.tasks.push(handle);
    }

    /// Current published view
    pub async fn snapshot(&self) -> Snapshot {
        self.publisher.publish().await
    }

    /// Newest-first recent events for the live feed
    pub async fn recent_events(&self) -> Vec<AccessEvent> {
        self.feed.lock().await.events()
    }

    /// Events observed in the last minute
    pub async fn last_minute_count(&self) -> usize {
        self.feed.lock().await.count_within(LAST_MINUTE_WINDOW)
    }

    /// Stop all source pumps and cancel pending recency timers
    ///
    /// After this returns no callback can fire against the store.
    pub async fn shutdown(mut self) {
        for handle in self.tasks.drain(..) {
            handle.abort();
        }
        self.store.shutdown().await;
        info!("Engine shut down");
    }
}
