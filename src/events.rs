//! Access events and the bounded live feed
//!
//! The Change Detector emits one `AccessEvent` per observed "new activity".
//! The feed retains only the newest events for the UI; the
//! events-in-the-last-minute counter is backed by a separate age-pruned
//! record of every push, so a burst larger than the display cap is still
//! counted in full.

use crate::region::RegionDescriptor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use uuid::Uuid;

/// Maximum number of events retained for the live feed
pub const RECENT_EVENTS_CAPACITY: usize = 20;

/// How long push timestamps are retained for the rate counter
pub const RATE_RETENTION: Duration = Duration::from_secs(60);

/// An immutable, ephemeral access event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessEvent {
    /// Synthetic event id
    pub id: Uuid,
    /// Region the event is attributed to
    pub region: RegionDescriptor,
    /// Wall-clock time the event was detected
    pub timestamp: DateTime<Utc>,
}

impl AccessEvent {
    pub fn new(region: RegionDescriptor) -> Self {
        Self {
            id: Uuid::new_v4(),
            region,
            timestamp: Utc::now(),
        }
    }
}

/// Bounded, newest-first list of recent access events
///
/// The display list and the rate counter have different retention rules:
/// the list is capped by count, the counter's timestamps by age.
#[derive(Debug)]
pub struct RecentEvents {
    events: VecDeque<AccessEvent>,
    capacity: usize,
    /// Timestamps of every push inside the retention window, oldest first
    hits: VecDeque<DateTime<Utc>>,
    retention: Duration,
}

impl Default for RecentEvents {
    fn default() -> Self {
        Self::new(RECENT_EVENTS_CAPACITY)
    }
}

impl RecentEvents {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            hits: VecDeque::new(),
            retention: RATE_RETENTION,
        }
    }

    /// Record a new event, evicting the oldest past capacity
    pub fn push(&mut self, event: AccessEvent) {
        self.hits.push_back(event.timestamp);
        self.prune_hits();
        self.events.push_front(event);
        self.events.truncate(self.capacity);
    }

    /// Newest-first snapshot of the feed
    pub fn events(&self) -> Vec<AccessEvent> {
        self.events.iter().cloned().collect()
    }

    /// Number of pushes newer than `window`
    ///
    /// Accurate for any `window` up to the retention period, independent of
    /// how many events the display list holds.
    pub fn count_within(&self, window: Duration) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::zero());
        self.hits.iter().filter(|t| **t >= cutoff).count()
    }

    fn prune_hits(&mut self) {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.retention)
                .unwrap_or_else(|_| chrono::Duration::zero());
        while self.hits.front().map_or(false, |t| *t < cutoff) {
            self.hits.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn japan() -> RegionDescriptor {
        RegionDescriptor::new("Japan", "日本", 36.20, 138.25)
    }

    #[test]
    fn test_events_are_newest_first() {
        let mut feed = RecentEvents::default();
        let first = AccessEvent::new(japan());
        let second = AccessEvent::new(japan());
        feed.push(first.clone());
        feed.push(second.clone());

        let events = feed.events();
        assert_eq!(events[0].id, second.id);
        assert_eq!(events[1].id, first.id);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut feed = RecentEvents::new(3);
        let oldest = AccessEvent::new(japan());
        feed.push(oldest.clone());
        for _ in 0..3 {
            feed.push(AccessEvent::new(japan()));
        }

        assert_eq!(feed.len(), 3);
        assert!(feed.events().iter().all(|e| e.id != oldest.id));
    }

    #[test]
    fn test_count_within_window() {
        let mut feed = RecentEvents::default();
        let mut stale = AccessEvent::new(japan());
        stale.timestamp = Utc::now() - chrono::Duration::minutes(5);
        feed.push(stale);
        feed.push(AccessEvent::new(japan()));

        // The stale push is outside the retention window; the fresh one
        // counts, whatever window is asked for.
        assert_eq!(feed.count_within(Duration::from_secs(60)), 1);
        assert_eq!(feed.count_within(Duration::from_secs(600)), 1);
    }

    #[test]
    fn test_count_not_limited_by_display_cap() {
        let mut feed = RecentEvents::default();
        for _ in 0..25 {
            feed.push(AccessEvent::new(japan()));
        }

        assert_eq!(feed.len(), RECENT_EVENTS_CAPACITY);
        assert_eq!(feed.count_within(Duration::from_secs(60)), 25);
    }

    #[test]
    fn test_event_ids_are_unique() {
        let a = AccessEvent::new(japan());
        let b = AccessEvent::new(japan());
        assert_ne!(a.id, b.id);
    }
}
