// ABOUTME: Field-merge policy for activity records that merge
// ABOUTME: Identifying fields always carry over; descriptive fields follow athlete preference
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde_json::Value;

use crate::models::{Platform, PreferredDataSource, RawActivity};

/// The resolved set of fields a merge writes onto its target row.
///
/// Identifying fields (external id, payload, sync timestamp, the `merged`
/// source marker) are always written. Descriptive fields are `None` when
/// the target's existing values should be kept.
#[derive(Debug, Clone)]
pub struct FieldUpdate {
    /// Platform whose data is being merged in
    pub incoming_platform: Platform,
    /// The incoming platform's external id for this workout
    pub external_id: String,
    /// The incoming platform's opaque payload
    pub payload: Value,
    /// New activity name, when the incoming side wins descriptive fields
    pub activity_name: Option<String>,
    /// New activity type, when the incoming side wins descriptive fields
    pub activity_type: Option<String>,
    /// Confidence score of the match that caused this merge, if fuzzy
    pub confidence_score: Option<f64>,
}

/// Resolve which fields the incoming platform's record contributes to the
/// merge target.
///
/// Descriptive fields (`activity_name`, `activity_type`) transfer only when
/// the athlete's preference names the incoming platform, or is
/// `MostRecent` (the side performing the merge is the most recent arrival,
/// so it wins). This lets an athlete pin "always trust Garmin's activity
/// names" even when Strava's data arrives later.
#[must_use]
pub fn merge_fields(
    incoming_platform: Platform,
    incoming: &RawActivity,
    preference: PreferredDataSource,
    confidence_score: Option<f64>,
) -> FieldUpdate {
    let incoming_wins_descriptive = match preference {
        PreferredDataSource::Garmin => incoming_platform == Platform::Garmin,
        PreferredDataSource::Strava => incoming_platform == Platform::Strava,
        PreferredDataSource::MostRecent => true,
    };

    let (activity_name, activity_type) = if incoming_wins_descriptive {
        (incoming.activity_name.clone(), incoming.activity_type.clone())
    } else {
        (None, None)
    };

    FieldUpdate {
        incoming_platform,
        external_id: incoming.external_id.clone(),
        payload: incoming.payload.clone(),
        activity_name,
        activity_type,
        confidence_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn raw(name: &str) -> RawActivity {
        RawActivity {
            external_id: "ext-1".to_owned(),
            activity_name: Some(name.to_owned()),
            activity_type: Some("running".to_owned()),
            start_time: Utc::now(),
            distance_meters: Some(5_000.0),
            duration_seconds: Some(1_500.0),
            moving_duration_seconds: None,
            elevation_gain_meters: None,
            elevation_loss_meters: None,
            avg_hr: None,
            max_hr: None,
            calories: None,
            avg_cadence: None,
            max_cadence: None,
            payload: json!({"id": "ext-1"}),
        }
    }

    #[test]
    fn most_recent_preference_always_takes_incoming_fields() {
        let update = merge_fields(
            Platform::Strava,
            &raw("Morning Run"),
            PreferredDataSource::MostRecent,
            Some(95.0),
        );
        assert_eq!(update.activity_name.as_deref(), Some("Morning Run"));
        assert_eq!(update.activity_type.as_deref(), Some("running"));
    }

    #[test]
    fn pinned_preference_keeps_target_fields_when_other_side_merges() {
        let update = merge_fields(
            Platform::Strava,
            &raw("Lunch Ride"),
            PreferredDataSource::Garmin,
            None,
        );
        assert!(update.activity_name.is_none());
        assert!(update.activity_type.is_none());
        // Identifying fields still transfer
        assert_eq!(update.external_id, "ext-1");
    }

    #[test]
    fn pinned_preference_takes_fields_when_that_side_merges() {
        let update = merge_fields(
            Platform::Garmin,
            &raw("Track Intervals"),
            PreferredDataSource::Garmin,
            Some(91.0),
        );
        assert_eq!(update.activity_name.as_deref(), Some("Track Intervals"));
    }
}
