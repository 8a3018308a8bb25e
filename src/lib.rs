//! SoundBeats Live Map aggregation engine
//!
//! This crate provides the realtime aggregation core behind the live access
//! map: it ingests user records from a realtime store or a pre-aggregated
//! snapshot endpoint, buckets them by geographic region inferred from the
//! user's declared system language, and maintains per-region running totals
//! together with a transient "recently active" highlight and a bounded
//! access-event feed.

pub mod auth;
pub mod config;
pub mod detector;
pub mod engine;
pub mod events;
pub mod record;
pub mod region;
pub mod score;
pub mod snapshot;
pub mod source;
pub mod store;

// Re-export main types
pub use auth::SessionGate;
pub use config::{AuthConfig, EngineConfig};
pub use detector::ChangeDetector;
pub use engine::LiveMapEngine;
pub use events::{AccessEvent, RecentEvents, RATE_RETENTION, RECENT_EVENTS_CAPACITY};
pub use record::{GameResult, UserRecord};
pub use region::{resolve_region, RegionDescriptor};
pub use score::{extract_contribution, Contribution, SCORE_PER_UNIT};
pub use snapshot::{Snapshot, SnapshotPublisher};
pub use source::{
    ChannelPopulationSource, ChannelRecordSource, PopulationSource, RecordSource, SnapshotClient,
    SnapshotDocument, SnapshotRow, SourceStatus,
};
pub use store::{AggregationStore, RegionRow, RegionStat};

/// Common error type for the aggregation engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Snapshot source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Malformed snapshot payload: {0}")]
    MalformedPayload(String),

    #[error("Configuration error: {message}")]
    ConfigurationError {
        message: String,
        key: Option<String>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
pub type Error = EngineError;
