//! External user-record types
//!
//! These mirror the shape of the realtime store's entries. The engine only
//! reads snapshots and deltas of them; it never writes back.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One per-track result payload inside a user record
///
/// `max_score` is the best score the user has achieved on that track;
/// `clear_rate` is a completion percentage in [0, 100]. Records written by
/// older game builds can carry a zero or negative `max_score` for attempted
/// but unscored activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    #[serde(rename = "maxScore", default)]
    pub max_score: i64,
    #[serde(rename = "clearRate", default)]
    pub clear_rate: f64,
}

impl GameResult {
    pub fn new(max_score: i64, clear_rate: f64) -> Self {
        Self {
            max_score,
            clear_rate,
        }
    }
}

/// A user record as delivered by the realtime store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Unique user id assigned by the store
    pub id: String,
    /// Declared system language, e.g. "Japanese"
    #[serde(default)]
    pub language: String,
    /// Per-track results keyed by track id; may be absent or empty
    #[serde(default)]
    pub results: HashMap<String, GameResult>,
}

impl UserRecord {
    pub fn new(id: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            language: language.into(),
            results: HashMap::new(),
        }
    }

    pub fn with_result(mut self, track_id: impl Into<String>, result: GameResult) -> Self {
        self.results.insert(track_id.into(), result);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_deserializes_with_missing_fields() {
        let record: UserRecord = serde_json::from_str(r#"{"id": "u1"}"#).unwrap();
        assert_eq!(record.id, "u1");
        assert!(record.language.is_empty());
        assert!(record.results.is_empty());
    }

    #[test]
    fn test_record_deserializes_wire_names() {
        let json = r#"{
            "id": "u2",
            "language": "Japanese",
            "results": {
                "track-1": {"maxScore": 1200, "clearRate": 85.5}
            }
        }"#;
        let record: UserRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.language, "Japanese");
        let result = &record.results["track-1"];
        assert_eq!(result.max_score, 1200);
        assert!((result.clear_rate - 85.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_results_value_equality() {
        let a = UserRecord::new("u1", "Japanese").with_result("t1", GameResult::new(100, 50.0));
        let b = UserRecord::new("u1", "Japanese").with_result("t1", GameResult::new(100, 50.0));
        assert_eq!(a.results, b.results);

        let c = UserRecord::new("u1", "Japanese").with_result("t1", GameResult::new(200, 50.0));
        assert_ne!(a.results, c.results);
    }
}
