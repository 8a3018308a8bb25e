//! Change detection
//!
//! Turns the two external data-source shapes into one stream of access
//! events plus store mutations:
//!
//! - **Snapshot-diff mode** (`observe_population`): compares the previous
//!   full population with the new one and emits an event for every new user
//!   or changed results payload. Totals are always derived by a full rescan
//!   of the new population and installed with `rescan_install`, never by
//!   accumulating diff deltas, so repeated events for a growing payload
//!   cannot double-count earlier contributions. The install preserves the
//!   recency highlight of regions untouched by this diff.
//! - **Single-record mode** (`observe_record`): each record arrives at most
//!   once per session thanks to a grow-only set of already-counted ids;
//!   deltas are extracted from the record and applied incrementally.
//!
//! Both modes terminate in the same "emit event, mark region recent" call,
//! so the store never knows which transport delivered the change.

use crate::events::{AccessEvent, RecentEvents};
use crate::record::UserRecord;
use crate::region::resolve_region;
use crate::score::extract_contribution;
use crate::store::{AggregationStore, RegionRow};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Detects new activity and drives the aggregation store
pub struct ChangeDetector {
    store: Arc<AggregationStore>,
    feed: Arc<Mutex<RecentEvents>>,
    /// Previous full population, retained between snapshot-diff invocations
    previous: HashMap<String, UserRecord>,
    /// Ids already counted in single-record mode; grows for the session
    seen: HashSet<String>,
}

impl ChangeDetector {
    pub fn new(store: Arc<AggregationStore>, feed: Arc<Mutex<RecentEvents>>) -> Self {
        Self {
            store,
            feed,
            previous: HashMap::new(),
            seen: HashSet::new(),
        }
    }

    /// Seed the dedup set with ids that existed before the subscription
    ///
    /// Used with subscribe-to-newly-added sources, which replay the current
    /// keys on connect; those users must not generate "new user" events.
    pub fn seed_seen<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        let before = self.seen.len();
        self.seen.extend(ids);
        info!(seeded = self.seen.len() - before, "Seeded dedup set");
    }

    /// Snapshot-diff mode: observe a complete new population
    ///
    /// Emits one event per new user or changed results payload, then
    /// installs totals recomputed from the whole population. Users present
    /// before but absent now generate no event; the rescan simply drops
    /// them.
    pub async fn observe_population(
        &mut self,
        population: HashMap<String, UserRecord>,
    ) -> Vec<AccessEvent> {
        let mut events = Vec::new();

        for (id, record) in &population {
            let changed = match self.previous.get(id) {
                None => true,
                Some(prior) => prior.results != record.results,
            };
            if !changed {
                continue;
            }

            if let Some(region) = resolve_region(&record.language) {
                events.push(AccessEvent::new(region.clone()));
            } else {
                debug!(user = %id, language = %record.language, "No region for language");
            }
        }

        let rows = Self::aggregate_population(&population);
        self.store.rescan_install(rows, None).await;

        for event in &events {
            // Zero deltas: totals came from the rescan above, the event only
            // drives the recency highlight and the feed.
            self.store
                .apply_delta(&event.region, 0, 0, 0, true)
                .await;
        }

        let mut feed = self.feed.lock().await;
        for event in &events {
            feed.push(event.clone());
        }
        drop(feed);

        info!(
            population = population.len(),
            events = events.len(),
            "Observed population snapshot"
        );

        self.previous = population;
        events
    }

    /// Single-record mode: observe one freshly delivered record
    ///
    /// Re-delivery of an already-counted id is silently ignored, so each
    /// physical user contributes at most one new-user event per session.
    pub async fn observe_record(&mut self, record: UserRecord) -> Option<AccessEvent> {
        if !self.seen.insert(record.id.clone()) {
            debug!(user = %record.id, "Duplicate record delivery ignored");
            return None;
        }

        let region = match resolve_region(&record.language) {
            Some(region) => region,
            None => {
                debug!(user = %record.id, language = %record.language, "No region for language");
                return None;
            }
        };

        let contribution = extract_contribution(&record.results);
        self.store
            .apply_delta(region, 1, contribution.plays, contribution.purified, true)
            .await;

        let event = AccessEvent::new(region.clone());
        self.feed.lock().await.push(event.clone());

        debug!(
            user = %record.id,
            region = %region.name,
            plays = contribution.plays,
            purified = contribution.purified,
            "Counted new user record"
        );

        Some(event)
    }

    /// Rescan a full population into per-region rows
    fn aggregate_population(population: &HashMap<String, UserRecord>) -> Vec<RegionRow> {
        let mut rows: HashMap<String, RegionRow> = HashMap::new();

        for record in population.values() {
            let Some(region) = resolve_region(&record.language) else {
                continue;
            };

            let contribution = extract_contribution(&record.results);
            let row = rows.entry(region.name.clone()).or_insert_with(|| RegionRow {
                region: region.clone(),
                users: 0,
                plays: 0,
                purified: Some(0),
            });
            row.users += 1;
            row.plays += contribution.plays;
            row.purified = Some(row.purified.unwrap_or(0) + contribution.purified);
        }

        rows.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::GameResult;
    use crate::store::AggregationStore;

    fn detector() -> (ChangeDetector, Arc<AggregationStore>, Arc<Mutex<RecentEvents>>) {
        let store = Arc::new(AggregationStore::default());
        let feed = Arc::new(Mutex::new(RecentEvents::default()));
        (
            ChangeDetector::new(Arc::clone(&store), Arc::clone(&feed)),
            store,
            feed,
        )
    }

    fn population(records: Vec<UserRecord>) -> HashMap<String, UserRecord> {
        records.into_iter().map(|r| (r.id.clone(), r)).collect()
    }

    #[tokio::test]
    async fn test_single_record_dedup_is_idempotent() {
        let (mut detector, store, feed) = detector();
        let record =
            UserRecord::new("u1", "Japanese").with_result("t1", GameResult::new(1000, 50.0));

        assert!(detector.observe_record(record.clone()).await.is_some());
        assert!(detector.observe_record(record).await.is_none());

        let stat = store.get("Japan").await.unwrap();
        assert_eq!(stat.users, 1);
        assert_eq!(stat.plays, 1);
        assert_eq!(stat.purified, 5);
        assert_eq!(feed.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_seeded_ids_are_not_counted() {
        let (mut detector, store, _) = detector();
        detector.seed_seen(vec!["u1".to_string()]);

        let replayed = UserRecord::new("u1", "Japanese");
        assert!(detector.observe_record(replayed).await.is_none());
        assert!(store.get("Japan").await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_language_excluded() {
        let (mut detector, store, feed) = detector();
        let record = UserRecord::new("u1", "Klingon");

        assert!(detector.observe_record(record).await.is_none());
        assert!(store.stats().await.is_empty());
        assert_eq!(store.total_users().await, 0);
        assert!(feed.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_population_diff_emits_for_new_users() {
        let (mut detector, store, _) = detector();

        let first = population(vec![UserRecord::new("u1", "Japanese")]);
        let events = detector.observe_population(first).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].region.name, "Japan");

        let second = population(vec![
            UserRecord::new("u1", "Japanese"),
            UserRecord::new("u2", "English"),
        ]);
        let events = detector.observe_population(second).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].region.name, "USA");

        assert_eq!(store.total_users().await, 2);
    }

    #[tokio::test]
    async fn test_population_diff_emits_for_changed_results() {
        let (mut detector, store, _) = detector();

        let u1 = UserRecord::new("u1", "Japanese").with_result("t1", GameResult::new(1000, 50.0));
        detector.observe_population(population(vec![u1.clone()])).await;

        // Same id, updated results: one event, totals rescanned not added.
        let updated =
            UserRecord::new("u1", "Japanese").with_result("t1", GameResult::new(2000, 50.0));
        let events = detector.observe_population(population(vec![updated])).await;
        assert_eq!(events.len(), 1);

        let stat = store.get("Japan").await.unwrap();
        assert_eq!(stat.users, 1);
        assert_eq!(stat.plays, 1);
        assert_eq!(stat.purified, 10);
        assert!(stat.recent_hit);
    }

    #[tokio::test]
    async fn test_population_diff_no_event_when_unchanged() {
        let (mut detector, _, _) = detector();

        let u1 = UserRecord::new("u1", "Japanese").with_result("t1", GameResult::new(1000, 50.0));
        detector.observe_population(population(vec![u1.clone()])).await;
        let events = detector.observe_population(population(vec![u1])).await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_departures_are_not_events() {
        let (mut detector, store, _) = detector();

        detector
            .observe_population(population(vec![
                UserRecord::new("u1", "Japanese"),
                UserRecord::new("u2", "English"),
            ]))
            .await;

        let events = detector
            .observe_population(population(vec![UserRecord::new("u1", "Japanese")]))
            .await;
        assert!(events.is_empty());

        // The rescan is authoritative: the departed user's region is gone.
        assert!(store.get("USA").await.is_none());
        assert_eq!(store.total_users().await, 1);
    }

    #[tokio::test]
    async fn test_repeated_growth_does_not_double_count() {
        let (mut detector, store, _) = detector();

        let mut record =
            UserRecord::new("u1", "Japanese").with_result("t1", GameResult::new(1000, 100.0));
        detector
            .observe_population(population(vec![record.clone()]))
            .await;

        record = record.with_result("t2", GameResult::new(1000, 100.0));
        detector
            .observe_population(population(vec![record.clone()]))
            .await;

        record = record.with_result("t3", GameResult::new(1000, 100.0));
        detector.observe_population(population(vec![record])).await;

        let stat = store.get("Japan").await.unwrap();
        assert_eq!(stat.users, 1);
        assert_eq!(stat.plays, 3);
        assert_eq!(stat.purified, 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrelated_change_keeps_highlight_inside_window() {
        let (mut detector, store, _) = detector();

        detector
            .observe_population(population(vec![UserRecord::new("u1", "Japanese")]))
            .await;
        assert!(store.get("Japan").await.unwrap().recent_hit);

        // A second user elsewhere arrives 1s in; Japan's 3s window must not
        // be cut short by the rescan the diff triggers.
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        detector
            .observe_population(population(vec![
                UserRecord::new("u1", "Japanese"),
                UserRecord::new("u2", "English"),
            ]))
            .await;

        assert!(store.get("Japan").await.unwrap().recent_hit);
        assert!(store.get("USA").await.unwrap().recent_hit);

        // Each highlight still expires on its own schedule.
        tokio::time::sleep(std::time::Duration::from_millis(2500)).await;
        assert!(!store.get("Japan").await.unwrap().recent_hit);
        assert!(store.get("USA").await.unwrap().recent_hit);

        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        assert!(!store.get("USA").await.unwrap().recent_hit);
    }

    #[tokio::test]
    async fn test_event_region_always_has_stat_entry() {
        let (mut detector, store, _) = detector();
        let events = detector
            .observe_population(population(vec![UserRecord::new("u1", "French")]))
            .await;

        for event in events {
            assert!(store.get(&event.region.name).await.is_some());
        }
    }
}
