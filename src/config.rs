// ABOUTME: Tunable reconciliation parameters loaded from the environment
// ABOUTME: Match windows, confidence thresholds, backfill caps and pacing, lock TTL
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sync engine configuration.
//!
//! The rescan window and the confidence thresholds are empirically chosen
//! values, not load-bearing constants, so every one of them is exposed as a
//! `STRIDE_*` environment variable with a sensible default.

use std::env;

use tracing::warn;

/// Tunable parameters for one reconciliation engine instance
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Half-width of the cross-platform match window in hours (default 12).
    ///
    /// Wide enough to absorb timezone and clock skew between platforms that
    /// disagree on what "start time" means.
    pub rescan_window_hours: i64,
    /// Confidence score at or above which a candidate pair is merged
    /// without human review (default 90)
    pub auto_merge_threshold: f64,
    /// Confidence score at or above which a candidate classifies as medium
    /// rather than low (default 75)
    pub medium_confidence_threshold: f64,
    /// Confidence score below which a pair is not a candidate at all
    /// (default 45)
    pub candidate_floor: f64,
    /// Maximum number of pre-existing detail-less activities backfilled per
    /// run (default 10); newly inserted or merged activities are exempt
    pub legacy_backfill_cap: usize,
    /// Delay between consecutive backfill provider calls in milliseconds
    /// (default 500)
    pub backfill_delay_ms: u64,
    /// Sync lock time-to-live in seconds (default 900); a crashed run's lock
    /// expires after this and stops blocking future syncs
    pub lock_ttl_secs: i64,
    /// Activity fetch limit used when the caller does not supply one
    /// (default 100)
    pub default_fetch_limit: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            rescan_window_hours: 12,
            auto_merge_threshold: 90.0,
            medium_confidence_threshold: 75.0,
            candidate_floor: 45.0,
            legacy_backfill_cap: 10,
            backfill_delay_ms: 500,
            lock_ttl_secs: 900,
            default_fetch_limit: 100,
        }
    }
}

impl SyncConfig {
    /// Load configuration from `STRIDE_*` environment variables, falling
    /// back to defaults for anything unset or unparseable
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            rescan_window_hours: env_parse("STRIDE_RESCAN_WINDOW_HOURS", defaults.rescan_window_hours),
            auto_merge_threshold: env_parse("STRIDE_AUTO_MERGE_THRESHOLD", defaults.auto_merge_threshold),
            medium_confidence_threshold: env_parse(
                "STRIDE_MEDIUM_CONFIDENCE_THRESHOLD",
                defaults.medium_confidence_threshold,
            ),
            candidate_floor: env_parse("STRIDE_CANDIDATE_FLOOR", defaults.candidate_floor),
            legacy_backfill_cap: env_parse("STRIDE_LEGACY_BACKFILL_CAP", defaults.legacy_backfill_cap),
            backfill_delay_ms: env_parse("STRIDE_BACKFILL_DELAY_MS", defaults.backfill_delay_ms),
            lock_ttl_secs: env_parse("STRIDE_LOCK_TTL_SECS", defaults.lock_ttl_secs),
            default_fetch_limit: env_parse("STRIDE_FETCH_LIMIT", defaults.default_fetch_limit),
        }
    }

    /// Rescan window half-width as a chrono duration
    #[must_use]
    pub fn rescan_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.rescan_window_hours)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Ignoring unparseable value for {key}");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_consistent() {
        let cfg = SyncConfig::default();
        assert!(cfg.candidate_floor < cfg.medium_confidence_threshold);
        assert!(cfg.medium_confidence_threshold < cfg.auto_merge_threshold);
        assert!(cfg.auto_merge_threshold <= 100.0);
        assert_eq!(cfg.rescan_window(), chrono::Duration::hours(12));
    }
}
