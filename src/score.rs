//! Score extraction
//!
//! Computes a user's plays and purified-units contribution from their
//! per-track results. Pure and idempotent: it is evaluated over the full
//! observed state of a record, never over a partial delta, so running it
//! twice over the same payload yields the same contribution.

use crate::record::GameResult;
use std::collections::HashMap;

/// Score points that make up one purifiable unit
pub const SCORE_PER_UNIT: i64 = 100;

/// Aggregate contribution of one user record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Contribution {
    /// Number of tracks with a positive best score
    pub plays: u64,
    /// Total purified units across all tracks
    pub purified: u64,
}

/// Extract the plays and purified-units contribution from a results mapping
///
/// For each result with a positive `max_score`, the notional maximum unit
/// count is `max_score / SCORE_PER_UNIT` (floored), and the purified units
/// are `floor(max_units * clear_rate / 100)` with the clear rate clamped to
/// [0, 100]. Results with a non-positive `max_score` are attempted but
/// unscored activity and contribute nothing, not even a play.
pub fn extract_contribution(results: &HashMap<String, GameResult>) -> Contribution {
    let mut contribution = Contribution::default();

    for result in results.values() {
        if result.max_score <= 0 {
            continue;
        }

        let max_units = (result.max_score / SCORE_PER_UNIT) as u64;
        let clear_rate = result.clear_rate.clamp(0.0, 100.0);
        let purified = (max_units as f64 * clear_rate / 100.0).floor() as u64;

        contribution.plays += 1;
        contribution.purified += purified;
    }

    contribution
}
