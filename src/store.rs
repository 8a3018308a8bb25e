//! Aggregation store
//!
//! Owns the per-region running totals and the transient "recently active"
//! highlight. Three entry points mutate it: `apply_delta` (incremental
//! upsert, monotonically non-decreasing), `full_replace` (authoritative
//! batch install from a pre-aggregated snapshot, resetting all highlights),
//! and `rescan_install` (batch install from a diff rescan, carrying the
//! highlight and its pending reset over for regions that survive). The batch
//! installs are the only paths allowed to decrease a stat. All mutation goes
//! through one internal mutex so a reader never observes a partially-updated
//! region.
//!
//! The recency highlight is an expiring flag: marking a region recent
//! schedules a delayed reset and cancels any reset already pending for that
//! region, so sustained activity keeps the flag alive instead of flickering.

use crate::region::RegionDescriptor;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// Default lifetime of the recently-active highlight
pub const RECENCY_WINDOW: Duration = Duration::from_secs(3);

/// Per-region aggregate owned by the store
#[derive(Debug, Clone, Serialize)]
pub struct RegionStat {
    pub region: RegionDescriptor,
    /// Number of distinct users attributed to this region
    pub users: u64,
    /// Total plays across those users
    pub plays: u64,
    /// Total purified units across those users
    pub purified: u64,
    /// Transient highlight; reset by a delayed, cancellable timer
    pub recent_hit: bool,
}

/// One precomputed row for a full-replace batch
#[derive(Debug, Clone)]
pub struct RegionRow {
    pub region: RegionDescriptor,
    pub users: u64,
    pub plays: u64,
    pub purified: Option<u64>,
}

struct StoreInner {
    stats: HashMap<String, RegionStat>,
    /// Pending recency-reset tasks keyed by region
    resets: HashMap<String, JoinHandle<()>>,
    last_updated: Option<DateTime<Utc>>,
}

/// Mutable keyed accumulator of per-region statistics
///
/// Internally the state sits behind an `Arc<Mutex<..>>` so the recency-reset
/// tasks can hold a weak reference to it without keeping the store alive.
pub struct AggregationStore {
    inner: Arc<Mutex<StoreInner>>,
    recency_window: Duration,
}

impl Default for AggregationStore {
    fn default() -> Self {
        Self::new(RECENCY_WINDOW)
    }
}

impl AggregationStore {
    pub fn new(recency_window: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                stats: HashMap::new(),
                resets: HashMap::new(),
                last_updated: None,
            })),
            recency_window,
        }
    }

    /// Upsert the stat for `region`, adding the given deltas
    ///
    /// Creates the entry if absent. With `mark_recent` the recently-active
    /// flag is set and its delayed reset is scheduled, superseding any reset
    /// already pending for the same region.
    pub async fn apply_delta(
        &self,
        region: &RegionDescriptor,
        users: u64,
        plays: u64,
        purified: u64,
        mark_recent: bool,
    ) {
        let mut inner = self.inner.lock().await;

        let stat = inner
            .stats
            .entry(region.name.clone())
            .or_insert_with(|| RegionStat {
                region: region.clone(),
                users: 0,
                plays: 0,
                purified: 0,
                recent_hit: false,
            });

        stat.users = stat.users.saturating_add(users);
        stat.plays = stat.plays.saturating_add(plays);
        stat.purified = stat.purified.saturating_add(purified);

        if mark_recent {
            stat.recent_hit = true;
            self.schedule_recency_reset(&mut inner, &region.name);
        }

        inner.last_updated = Some(Utc::now());

        debug!(
            region = %region.name,
            users, plays, purified, mark_recent,
            "Applied region delta"
        );
    }

    /// Atomically replace the whole mapping with externally aggregated rows
    ///
    /// The snapshot is authoritative for its instant, so this is the one
    /// operation that may decrease a stat or drop a region. All pending
    /// recency resets are cancelled; the installed rows start un-highlighted.
    pub async fn full_replace(&self, rows: Vec<RegionRow>, last_updated: Option<DateTime<Utc>>) {
        let mut inner = self.inner.lock().await;

        for (_, handle) in inner.resets.drain() {
            handle.abort();
        }

        inner.stats = rows
            .into_iter()
            .map(|row| {
                (
                    row.region.name.clone(),
                    RegionStat {
                        region: row.region,
                        users: row.users,
                        plays: row.plays,
                        purified: row.purified.unwrap_or(0),
                        recent_hit: false,
                    },
                )
            })
            .collect();

        inner.last_updated = last_updated.or_else(|| Some(Utc::now()));

        debug!(regions = inner.stats.len(), "Replaced aggregation state");
    }

    /// Install rescanned rows without disturbing the recency highlight
    ///
    /// Used by the diff detector, which recomputes totals from the whole
    /// population on every delivery: a region that survives the install
    /// keeps its highlight and its pending reset timer, so unrelated
    /// activity elsewhere cannot clear it inside its window. Regions the
    /// rescan drops have their pending resets cancelled.
    pub async fn rescan_install(&self, rows: Vec<RegionRow>, last_updated: Option<DateTime<Utc>>) {
        let mut inner = self.inner.lock().await;

        let mut next: HashMap<String, RegionStat> = HashMap::with_capacity(rows.len());
        for row in rows {
            let recent_hit = inner
                .stats
                .get(&row.region.name)
                .map_or(false, |s| s.recent_hit);
            next.insert(
                row.region.name.clone(),
                RegionStat {
                    region: row.region,
                    users: row.users,
                    plays: row.plays,
                    purified: row.purified.unwrap_or(0),
                    recent_hit,
                },
            );
        }
        inner.stats = next;

        let dropped: Vec<String> = inner
            .resets
            .keys()
            .filter(|key| !inner.stats.contains_key(key.as_str()))
            .cloned()
            .collect();
        for key in dropped {
            if let Some(handle) = inner.resets.remove(&key) {
                handle.abort();
            }
        }

        inner.last_updated = last_updated.or_else(|| Some(Utc::now()));

        debug!(regions = inner.stats.len(), "Installed rescanned state");
    }

    /// Schedule the delayed reset for `key`, cancelling any prior one
    fn schedule_recency_reset(&self, inner: &mut StoreInner, key: &str) {
        let weak = Arc::downgrade(&self.inner);
        let window = self.recency_window;
        let task_key = key.to_string();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if let Some(state) = weak.upgrade() {
                let mut inner = state.lock().await;
                if let Some(stat) = inner.stats.get_mut(&task_key) {
                    stat.recent_hit = false;
                }
                inner.resets.remove(&task_key);
            }
        });

        if let Some(previous) = inner.resets.insert(key.to_string(), handle) {
            previous.abort();
        }
    }

    /// Current stats, in unspecified order
    pub async fn stats(&self) -> Vec<RegionStat> {
        self.inner.lock().await.stats.values().cloned().collect()
    }

    /// Stat for a single region key
    pub async fn get(&self, key: &str) -> Option<RegionStat> {
        self.inner.lock().await.stats.get(key).cloned()
    }

    /// Sum of per-region user counts
    pub async fn total_users(&self) -> u64 {
        self.inner
            .lock()
            .await
            .stats
            .values()
            .map(|s| s.users)
            .sum()
    }

    /// Timestamp of the last applied mutation or installed snapshot
    pub async fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().await.last_updated
    }

    /// Cancel all pending recency resets
    ///
    /// Must be called on teardown so no timer fires against a store that the
    /// rest of the system considers gone.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        for (_, handle) in inner.resets.drain() {
            handle.abort();
        }
    }
}
