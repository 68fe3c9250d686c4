// ABOUTME: Common data models for canonical and provider-shaped fitness data
// ABOUTME: Activity, Lap, WorkoutFlag, merge candidates, raw provider records, sync results
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The two fitness platforms an athlete can connect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Garmin Connect (watch vendor)
    Garmin,
    /// Strava (social-fitness network)
    Strava,
}

impl Platform {
    /// Stable string form used in database columns and logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Garmin => "garmin",
            Self::Strava => "strava",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which platform(s) a canonical activity's data came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivitySource {
    /// Reported only by Garmin so far
    Garmin,
    /// Reported only by Strava so far
    Strava,
    /// Linked records from both platforms merged into one row
    Merged,
}

impl ActivitySource {
    /// Stable string form used in database columns
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Garmin => "garmin",
            Self::Strava => "strava",
            Self::Merged => "merged",
        }
    }

    /// Parse the database column form
    #[must_use]
    pub fn from_str_value(value: &str) -> Option<Self> {
        match value {
            "garmin" => Some(Self::Garmin),
            "strava" => Some(Self::Strava),
            "merged" => Some(Self::Merged),
            _ => None,
        }
    }
}

impl From<Platform> for ActivitySource {
    fn from(platform: Platform) -> Self {
        match platform {
            Platform::Garmin => Self::Garmin,
            Platform::Strava => Self::Strava,
        }
    }
}

/// Review state of a canonical activity with respect to merging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStatus {
    /// No merge decision pending
    #[default]
    None,
    /// A below-threshold merge candidate exists and awaits human review
    PendingReview,
    /// A reviewer decided the records are distinct workouts
    Ignored,
}

impl MergeStatus {
    /// Stable string form used in database columns
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::PendingReview => "pending_review",
            Self::Ignored => "ignored",
        }
    }

    /// Parse the database column form
    #[must_use]
    pub fn from_str_value(value: &str) -> Option<Self> {
        match value {
            "none" => Some(Self::None),
            "pending_review" => Some(Self::PendingReview),
            "ignored" => Some(Self::Ignored),
            _ => None,
        }
    }
}

/// Canonical activity: the single authoritative record for one physical
/// workout, regardless of how many platforms reported it.
///
/// Invariant: a `Merged` activity has (or had, before one side was deleted
/// upstream) both external ids set; a non-merged activity has exactly one.
/// `id` is assigned monotonically by the store and doubles as the age signal
/// for the lowest-id-wins merge tie-break.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    /// Store-assigned monotonic identifier
    pub id: i64,
    /// Owning athlete
    pub athlete_id: Uuid,
    /// Which platform(s) this record's data came from
    pub source: ActivitySource,
    /// Garmin's own id for this activity, once linked
    pub garmin_activity_id: Option<String>,
    /// Strava's own id for this activity, once linked
    pub strava_activity_id: Option<String>,
    /// Human-readable activity name
    pub activity_name: Option<String>,
    /// Activity type (run, ride, swim, ...)
    pub activity_type: Option<String>,
    /// Workout start instant
    pub start_time: DateTime<Utc>,
    /// Total distance in meters
    pub distance_meters: Option<f64>,
    /// Elapsed duration in seconds
    pub duration_seconds: Option<f64>,
    /// Moving (non-paused) duration in seconds
    pub moving_duration_seconds: Option<f64>,
    /// Cumulative climb in meters
    pub elevation_gain_meters: Option<f64>,
    /// Cumulative descent in meters
    pub elevation_loss_meters: Option<f64>,
    /// Average heart rate in bpm
    pub avg_hr: Option<i64>,
    /// Maximum heart rate in bpm
    pub max_hr: Option<i64>,
    /// Energy expenditure in kcal
    pub calories: Option<i64>,
    /// Average cadence (spm or rpm depending on sport)
    pub avg_cadence: Option<f64>,
    /// Maximum cadence
    pub max_cadence: Option<f64>,
    /// Whether lap/HR-zone detail has been backfilled
    pub has_detail_data: bool,
    /// Heart-rate-zone summary stored as opaque JSON
    pub hr_zone_summary: Option<Value>,
    /// Garmin's raw payload, opaque to the engine
    pub garmin_payload: Option<Value>,
    /// Strava's raw payload, opaque to the engine
    pub strava_payload: Option<Value>,
    /// Last time Garmin data was written to this row
    pub garmin_synced_at: Option<DateTime<Utc>>,
    /// Last time Strava data was written to this row
    pub strava_synced_at: Option<DateTime<Utc>>,
    /// Merge review state
    pub merge_status: MergeStatus,
    /// Confidence score of the merge that produced this row, if any
    pub confidence_score: Option<f64>,
    /// Row creation instant
    pub created_at: DateTime<Utc>,
    /// Last row update instant
    pub updated_at: DateTime<Utc>,
}

/// One per-lap split belonging to a canonical activity.
///
/// Bulk-written by the backfill worker via upsert keyed on
/// `(activity_id, lap_index)`, so re-running backfill never duplicates laps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lap {
    /// Owning activity
    pub activity_id: i64,
    /// 0-based position within the activity, unique per activity
    pub lap_index: i64,
    /// Lap distance in meters
    pub distance_meters: Option<f64>,
    /// Lap duration in seconds
    pub duration_seconds: Option<f64>,
    /// Average heart rate in bpm
    pub avg_hr: Option<i64>,
    /// Maximum heart rate in bpm
    pub max_hr: Option<i64>,
    /// Average pace in seconds per kilometer
    pub avg_pace: Option<f64>,
    /// Interval intensity (active, rest, warmup, ...)
    pub intensity_type: Option<String>,
    /// Plan-compliance score for structured workouts
    pub compliance_score: Option<f64>,
}

/// A persisted review flag for a below-threshold merge candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutFlag {
    /// Store-assigned identifier
    pub id: i64,
    /// Owning athlete
    pub athlete_id: Uuid,
    /// The newly inserted, retained activity the flag refers to
    pub activity_id: i64,
    /// Flag discriminator; always `merge_candidate` from this engine
    pub flag_type: String,
    /// Review severity, derived from the candidate confidence
    pub severity: String,
    /// `{potential_match_id, confidence, confidence_score}`
    pub flag_data: Option<Value>,
    /// Flag creation instant
    pub created_at: DateTime<Utc>,
}

/// Flag type written for every merge candidate left to human review
pub const FLAG_TYPE_MERGE_CANDIDATE: &str = "merge_candidate";

/// Confidence classification of a merge candidate pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeConfidence {
    /// Above the auto-merge threshold; merged without review
    High,
    /// Plausible but review-worthy
    Medium,
    /// Weak; review-worthy only
    Low,
}

impl MergeConfidence {
    /// Stable string form used in flag payloads
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// A scored cross-platform candidate pair.
///
/// Transient: produced by the matcher, consumed immediately by the
/// reconciliation loop. Only below-threshold candidates outlive the loop,
/// as [`WorkoutFlag`] rows.
#[derive(Debug, Clone)]
pub struct MergeCandidate {
    /// The existing canonical activity proposed as the counterpart
    pub existing: Activity,
    /// Confidence classification
    pub confidence: MergeConfidence,
    /// Confidence score in `[0, 100]`
    pub confidence_score: f64,
}

impl MergeCandidate {
    /// Whether this candidate merges without human review
    #[must_use]
    pub const fn should_auto_merge(&self) -> bool {
        matches!(self.confidence, MergeConfidence::High)
    }
}

/// An activity as fetched from a provider, before reconciliation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawActivity {
    /// The provider's own id for this activity
    pub external_id: String,
    /// Activity name as reported by the provider
    pub activity_name: Option<String>,
    /// Activity type as reported by the provider
    pub activity_type: Option<String>,
    /// Workout start instant (already normalized to UTC by the adapter)
    pub start_time: DateTime<Utc>,
    /// Total distance in meters
    pub distance_meters: Option<f64>,
    /// Elapsed duration in seconds
    pub duration_seconds: Option<f64>,
    /// Moving duration in seconds
    pub moving_duration_seconds: Option<f64>,
    /// Cumulative climb in meters
    pub elevation_gain_meters: Option<f64>,
    /// Cumulative descent in meters
    pub elevation_loss_meters: Option<f64>,
    /// Average heart rate in bpm
    pub avg_hr: Option<i64>,
    /// Maximum heart rate in bpm
    pub max_hr: Option<i64>,
    /// Energy expenditure in kcal
    pub calories: Option<i64>,
    /// Average cadence
    pub avg_cadence: Option<f64>,
    /// Maximum cadence
    pub max_cadence: Option<f64>,
    /// The provider's raw payload, carried opaquely
    pub payload: Value,
}

/// One per-lap split as fetched from a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLap {
    /// Lap distance in meters
    pub distance_meters: Option<f64>,
    /// Lap duration in seconds
    pub duration_seconds: Option<f64>,
    /// Average heart rate in bpm
    pub avg_hr: Option<i64>,
    /// Maximum heart rate in bpm
    pub max_hr: Option<i64>,
    /// Average pace in seconds per kilometer
    pub avg_pace: Option<f64>,
    /// Interval intensity as reported by the provider
    pub intensity_type: Option<String>,
    /// Plan-compliance score, if the provider computes one
    pub compliance_score: Option<f64>,
}

/// Per-lap split payload returned by a provider's detail endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSplits {
    /// Ordered lap splits; index in this vector becomes `lap_index`
    pub laps: Vec<RawLap>,
}

/// Heart-rate-zone time-in-zone summary for one activity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HrZoneSummary {
    /// Seconds spent in each zone, zone 1 first
    pub seconds_in_zone: Vec<f64>,
}

/// Which platform's descriptive fields win when records merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferredDataSource {
    /// Garmin's names and types always win
    Garmin,
    /// Strava's names and types always win
    Strava,
    /// The side performing the merge wins
    #[default]
    MostRecent,
}

impl PreferredDataSource {
    /// Stable string form used in database columns
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Garmin => "garmin",
            Self::Strava => "strava",
            Self::MostRecent => "most_recent",
        }
    }

    /// Parse the database column form
    #[must_use]
    pub fn from_str_value(value: &str) -> Option<Self> {
        match value {
            "garmin" => Some(Self::Garmin),
            "strava" => Some(Self::Strava),
            "most_recent" => Some(Self::MostRecent),
            _ => None,
        }
    }
}

/// Aggregate counts for one completed sync run.
///
/// `skipped` is additive to `synced`/`merged`, so the totals reconcile
/// against the fetched count even when some per-item operations failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Activities inserted or already present (incl. rows pending review)
    pub synced: u64,
    /// Activities merged into an existing counterpart
    pub merged: u64,
    /// Flags created for below-threshold candidates
    pub pending_review: u64,
    /// Activities skipped due to per-item persistence errors
    pub skipped: u64,
    /// Lap rows written by backfill across the run
    pub laps_inserted: u64,
}

/// Outcome of a sync request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncOutcome {
    /// The run completed; counts inside
    Completed(SyncReport),
    /// Another sync for this athlete holds the lock; retry later
    AlreadyRunning,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_round_trips() {
        for source in [
            ActivitySource::Garmin,
            ActivitySource::Strava,
            ActivitySource::Merged,
        ] {
            assert_eq!(ActivitySource::from_str_value(source.as_str()), Some(source));
        }
        for status in [MergeStatus::None, MergeStatus::PendingReview, MergeStatus::Ignored] {
            assert_eq!(MergeStatus::from_str_value(status.as_str()), Some(status));
        }
        assert_eq!(ActivitySource::from_str_value("fitbit"), None);
    }
}
