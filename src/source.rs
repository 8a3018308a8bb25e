//! External data-source adapters
//!
//! The engine consumes two source shapes, known only at their interface:
//! a periodically polled, pre-aggregated JSON snapshot endpoint, and a
//! realtime record store reachable either as whole-population deliveries or
//! as one-record-at-a-time deliveries with an initial key replay. The store
//! itself is an external collaborator; its reconnect behavior is its own.

use crate::record::UserRecord;
use crate::region::RegionDescriptor;
use crate::store::RegionRow;
use crate::{EngineError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

/// One pre-aggregated region row from the snapshot endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotRow {
    pub region: String,
    #[serde(rename = "regionJa", alias = "regionDisplayName")]
    pub display_name: String,
    pub lat: f64,
    pub lng: f64,
    pub users: u64,
    pub plays: u64,
    #[serde(default)]
    pub purified: Option<u64>,
}

impl SnapshotRow {
    pub fn into_region_row(self) -> RegionRow {
        RegionRow {
            region: RegionDescriptor::new(self.region, self.display_name, self.lat, self.lng),
            users: self.users,
            plays: self.plays,
            purified: self.purified,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RegionsBlock {
    regions: Vec<SnapshotRow>,
}

/// The polled snapshot document
///
/// The deployed dashboard JSON nests the rows under
/// `purificationByRegion.regions`; flat `regions` is also accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotDocument {
    #[serde(rename = "lastUpdated", default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    regions: Option<Vec<SnapshotRow>>,
    #[serde(rename = "purificationByRegion", default)]
    purification_by_region: Option<RegionsBlock>,
}

impl SnapshotDocument {
    /// Extract the region rows, wherever the document carries them
    pub fn into_rows(self) -> Result<Vec<SnapshotRow>> {
        if let Some(block) = self.purification_by_region {
            return Ok(block.regions);
        }
        self.regions
            .ok_or_else(|| EngineError::MalformedPayload("no region data found".to_string()))
    }
}

/// HTTP client for the pre-aggregated snapshot endpoint
pub struct SnapshotClient {
    client: Client,
    url: String,
}

impl SnapshotClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    /// Fetch and decode the current snapshot document
    ///
    /// A non-2xx response or undecodable body is a connection failure for
    /// the caller to report, never a reason to drop existing state.
    pub async fn fetch(&self) -> Result<SnapshotDocument> {
        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(EngineError::SourceUnavailable(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let document = response
            .json::<SnapshotDocument>()
            .await
            .map_err(|e| EngineError::MalformedPayload(e.to_string()))?;

        debug!(url = %self.url, "Fetched snapshot document");
        Ok(document)
    }
}

/// Source delivering one newly added record at a time
///
/// `initial_keys` replays the ids that already exist at subscribe time so
/// the detector can seed its dedup set; `next_record` resolves to `None`
/// when the subscription ends.
#[async_trait]
pub trait RecordSource: Send {
    async fn initial_keys(&mut self) -> Result<Vec<String>>;
    async fn next_record(&mut self) -> Result<Option<UserRecord>>;
}

/// Source delivering the entire current population on every change
#[async_trait]
pub trait PopulationSource: Send {
    async fn next_population(&mut self) -> Result<Option<HashMap<String, UserRecord>>>;
}

/// Channel-backed record source
///
/// Bridges whatever realtime transport is in use (or a test) onto the
/// `RecordSource` contract.
pub struct ChannelRecordSource {
    initial: Vec<String>,
    rx: mpsc::Receiver<UserRecord>,
}

impl ChannelRecordSource {
    pub fn new(initial: Vec<String>) -> (Self, mpsc::Sender<UserRecord>) {
        let (tx, rx) = mpsc::channel(64);
        (Self { initial, rx }, tx)
    }
}

#[async_trait]
impl RecordSource for ChannelRecordSource {
    async fn initial_keys(&mut self) -> Result<Vec<String>> {
        Ok(std::mem::take(&mut self.initial))
    }

    async fn next_record(&mut self) -> Result<Option<UserRecord>> {
        Ok(self.rx.recv().await)
    }
}

/// Channel-backed population source
pub struct ChannelPopulationSource {
    rx: mpsc::Receiver<HashMap<String, UserRecord>>,
}

impl ChannelPopulationSource {
    pub fn new() -> (Self, mpsc::Sender<HashMap<String, UserRecord>>) {
        let (tx, rx) = mpsc::channel(16);
        (Self { rx }, tx)
    }
}

#[async_trait]
impl PopulationSource for ChannelPopulationSource {
    async fn next_population(&mut self) -> Result<Option<HashMap<String, UserRecord>>> {
        Ok(self.rx.recv().await)
    }
}

/// Shared connection status reported alongside published snapshots
///
/// A failed fetch flips this to disconnected with the failure message while
/// the aggregated state stays untouched (stale but available).
#[derive(Debug, Default)]
pub struct SourceStatus {
    inner: Mutex<StatusInner>,
}

#[derive(Debug, Default)]
struct StatusInner {
    connected: bool,
    error: Option<String>,
}

impl SourceStatus {
    pub fn set_connected(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.connected = true;
        inner.error = None;
    }

    pub fn set_error(&self, message: impl Into<String>) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.connected = false;
        inner.error = Some(message.into());
    }

    pub fn connected(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .connected
    }

    pub fn error(&self) -> Option<String> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .error
            .clone()
    }
}
