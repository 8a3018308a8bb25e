//! Snapshot publication
//!
//! Read-only projection of the aggregation store into the view the
//! rendering layer consumes: a deterministically ordered region list, the
//! derived total user count, and the connection status.

use crate::source::SourceStatus;
use crate::store::{AggregationStore, RegionStat};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Immutable, UI-consumable view of the current stats
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    /// Region stats ordered by play count descending, region key ascending
    pub regions: Vec<RegionStat>,
    /// Sum of per-region user counts
    pub total_users: u64,
    pub connected: bool,
    pub error: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Produces snapshots on demand without mutating store state
pub struct SnapshotPublisher {
    store: Arc<AggregationStore>,
    status: Arc<SourceStatus>,
    /// Display policy: include regions whose current user count is zero
    show_inactive_regions: bool,
}

impl SnapshotPublisher {
    pub fn new(
        store: Arc<AggregationStore>,
        status: Arc<SourceStatus>,
        show_inactive_regions: bool,
    ) -> Self {
        Self {
            store,
            status,
            show_inactive_regions,
        }
    }

    /// Materialize the current view
    pub async fn publish(&self) -> Snapshot {
        let mut regions = self.store.stats().await;

        if !self.show_inactive_regions {
            regions.retain(|stat| stat.users > 0);
        }

        // Stable, deterministic order: busiest first, ties by region key.
        regions.sort_by(|a, b| {
            b.plays
                .cmp(&a.plays)
                .then_with(|| a.region.name.cmp(&b.region.name))
        });

        let total_users = regions.iter().map(|stat| stat.users).sum();

        Snapshot {
            regions,
            total_users,
            connected: self.status.connected(),
            error: self.status.error(),
            last_updated: self.store.last_updated().await,
        }
    }
}
