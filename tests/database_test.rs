// ABOUTME: Integration tests for the canonical store operations
// ABOUTME: Activity CRUD, match-window queries, merge application, flags, preferences
//
// SPDX-License-Identifier: MIT OR Apache-2.0
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use anyhow::Result;
use chrono::Duration;
use uuid::Uuid;

use common::{create_test_database, raw_activity, start_at};
use stride_sync::models::{
    ActivitySource, MergeConfidence, Platform, PreferredDataSource, RawActivity,
};
use stride_sync::sync::merge::FieldUpdate;

#[tokio::test]
async fn insert_and_get_round_trip() -> Result<()> {
    let db = create_test_database().await;
    let athlete_id = Uuid::new_v4();
    let raw = raw_activity("g-1", 0, 10_000.0, 3_000.0);

    let id = db.insert_activity(athlete_id, Platform::Garmin, &raw).await?;
    let activity = db.get_activity(id).await?.unwrap();

    assert_eq!(activity.athlete_id, athlete_id);
    assert_eq!(activity.source, ActivitySource::Garmin);
    assert_eq!(activity.garmin_activity_id.as_deref(), Some("g-1"));
    assert!(activity.strava_activity_id.is_none());
    assert_eq!(activity.start_time, raw.start_time);
    assert_eq!(activity.distance_meters, Some(10_000.0));
    assert_eq!(activity.avg_hr, Some(148));
    assert!(!activity.has_detail_data);
    assert!(activity.garmin_payload.is_some());
    assert!(activity.garmin_synced_at.is_some());
    assert!(activity.strava_synced_at.is_none());
    // All three insert timestamps come from the same instant
    assert_eq!(activity.created_at, activity.updated_at);
    assert_eq!(activity.garmin_synced_at, Some(activity.created_at));
    Ok(())
}

#[tokio::test]
async fn ids_are_monotonic_across_inserts() -> Result<()> {
    let db = create_test_database().await;
    let athlete_id = Uuid::new_v4();
    let mut last = 0;
    for i in 0..4 {
        let raw = raw_activity(&format!("g-{i}"), i64::from(i) * 3_600, 5_000.0, 1_500.0);
        let id = db.insert_activity(athlete_id, Platform::Garmin, &raw).await?;
        assert!(id > last, "ids must be assigned monotonically");
        last = id;
    }
    Ok(())
}

#[tokio::test]
async fn duplicate_external_id_violates_unique_key() -> Result<()> {
    let db = create_test_database().await;
    let athlete_id = Uuid::new_v4();
    let raw = raw_activity("g-1", 0, 10_000.0, 3_000.0);

    db.insert_activity(athlete_id, Platform::Garmin, &raw).await?;
    assert!(db.insert_activity(athlete_id, Platform::Garmin, &raw).await.is_err());
    Ok(())
}

#[tokio::test]
async fn find_by_external_id_scopes_to_athlete_and_platform() -> Result<()> {
    let db = create_test_database().await;
    let athlete_id = Uuid::new_v4();
    let other_athlete = Uuid::new_v4();
    let raw = raw_activity("shared-id", 0, 10_000.0, 3_000.0);
    db.insert_activity(athlete_id, Platform::Garmin, &raw).await?;

    assert!(db
        .find_by_external_id(athlete_id, Platform::Garmin, "shared-id")
        .await?
        .is_some());
    assert!(db
        .find_by_external_id(athlete_id, Platform::Strava, "shared-id")
        .await?
        .is_none());
    assert!(db
        .find_by_external_id(other_athlete, Platform::Garmin, "shared-id")
        .await?
        .is_none());
    Ok(())
}

#[tokio::test]
async fn unlinked_candidates_respect_window_and_linkage() -> Result<()> {
    let db = create_test_database().await;
    let athlete_id = Uuid::new_v4();

    // In-window, unlinked from Strava's perspective
    let in_window = db
        .insert_activity(athlete_id, Platform::Garmin, &raw_activity("g-1", 0, 10_000.0, 3_000.0))
        .await?;
    // Outside the +/-12h window
    db.insert_activity(
        athlete_id,
        Platform::Garmin,
        &raw_activity("g-2", 13 * 3_600, 10_000.0, 3_000.0),
    )
    .await?;
    // Already carries a Strava id, so it cannot link again
    db.insert_activity(athlete_id, Platform::Strava, &raw_activity("s-9", 60, 9_900.0, 2_950.0))
        .await?;

    let candidates = db
        .find_unlinked_candidates(athlete_id, Platform::Strava, start_at(0), Duration::hours(12))
        .await?;
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].id, in_window);
    Ok(())
}

#[tokio::test]
async fn apply_merge_links_and_marks_merged() -> Result<()> {
    let db = create_test_database().await;
    let athlete_id = Uuid::new_v4();
    let target = db
        .insert_activity(athlete_id, Platform::Garmin, &raw_activity("g-1", 0, 10_000.0, 3_000.0))
        .await?;

    let incoming: RawActivity = raw_activity("s-1", 30, 10_020.0, 2_995.0);
    let update = FieldUpdate {
        incoming_platform: Platform::Strava,
        external_id: incoming.external_id.clone(),
        payload: incoming.payload.clone(),
        activity_name: Some("Renamed Run".to_owned()),
        activity_type: None,
        confidence_score: Some(97.5),
    };
    db.apply_merge(target, &update).await?;

    let merged = db.get_activity(target).await?.unwrap();
    assert_eq!(merged.source, ActivitySource::Merged);
    assert_eq!(merged.garmin_activity_id.as_deref(), Some("g-1"));
    assert_eq!(merged.strava_activity_id.as_deref(), Some("s-1"));
    assert_eq!(merged.activity_name.as_deref(), Some("Renamed Run"));
    // None in the update keeps the target's existing value
    assert_eq!(merged.activity_type.as_deref(), Some("running"));
    assert_eq!(merged.confidence_score, Some(97.5));
    assert!(merged.strava_payload.is_some());
    assert!(merged.strava_synced_at.is_some());
    Ok(())
}

#[tokio::test]
async fn apply_merge_to_missing_row_fails() {
    let db = create_test_database().await;
    let update = FieldUpdate {
        incoming_platform: Platform::Strava,
        external_id: "s-1".to_owned(),
        payload: serde_json::json!({}),
        activity_name: None,
        activity_type: None,
        confidence_score: None,
    };
    assert!(db.apply_merge(9_999, &update).await.is_err());
}

#[tokio::test]
async fn deleting_an_activity_cascades_to_laps() -> Result<()> {
    let db = create_test_database().await;
    let athlete_id = Uuid::new_v4();
    let id = db
        .insert_activity(athlete_id, Platform::Garmin, &raw_activity("g-1", 0, 10_000.0, 3_000.0))
        .await?;

    let splits = common::three_lap_splits(10_000.0, 3_000.0);
    let laps: Vec<stride_sync::models::Lap> = splits
        .laps
        .iter()
        .enumerate()
        .map(|(i, raw)| stride_sync::models::Lap {
            activity_id: id,
            lap_index: i as i64,
            distance_meters: raw.distance_meters,
            duration_seconds: raw.duration_seconds,
            avg_hr: raw.avg_hr,
            max_hr: raw.max_hr,
            avg_pace: raw.avg_pace,
            intensity_type: raw.intensity_type.clone(),
            compliance_score: raw.compliance_score,
        })
        .collect();
    db.upsert_laps(id, &laps).await?;
    assert_eq!(db.get_laps(id).await?.len(), 3);

    db.delete_activity(id).await?;
    assert!(db.get_laps(id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn flags_round_trip_and_resolve_by_delete() -> Result<()> {
    let db = create_test_database().await;
    let athlete_id = Uuid::new_v4();
    let kept = db
        .insert_activity(athlete_id, Platform::Strava, &raw_activity("s-1", 0, 6_000.0, 1_800.0))
        .await?;
    let counterpart = db
        .insert_activity(athlete_id, Platform::Garmin, &raw_activity("g-1", 0, 10_000.0, 3_000.0))
        .await?;

    let flag_id = db
        .insert_merge_flag(athlete_id, kept, counterpart, MergeConfidence::Low, 68.0)
        .await?;

    let flags = db.list_flags_for_athlete(athlete_id).await?;
    assert_eq!(flags.len(), 1);
    assert_eq!(flags[0].id, flag_id);
    assert_eq!(flags[0].activity_id, kept);
    assert_eq!(flags[0].severity, "info");
    let data = flags[0].flag_data.as_ref().unwrap();
    assert_eq!(data["potential_match_id"], counterpart);
    assert!((data["confidence_score"].as_f64().unwrap() - 68.0).abs() < f64::EPSILON);

    // "Keep separate" resolution deletes the flag
    db.delete_flag(flag_id).await?;
    assert!(db.list_flags_for_athlete(athlete_id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn preference_defaults_to_most_recent_and_round_trips() -> Result<()> {
    let db = create_test_database().await;
    let athlete_id = Uuid::new_v4();

    assert_eq!(
        db.get_preferred_data_source(athlete_id).await?,
        PreferredDataSource::MostRecent
    );

    db.set_preferred_data_source(athlete_id, PreferredDataSource::Garmin).await?;
    assert_eq!(
        db.get_preferred_data_source(athlete_id).await?,
        PreferredDataSource::Garmin
    );

    // Upsert overwrites
    db.set_preferred_data_source(athlete_id, PreferredDataSource::Strava).await?;
    assert_eq!(
        db.get_preferred_data_source(athlete_id).await?,
        PreferredDataSource::Strava
    );
    Ok(())
}

#[tokio::test]
async fn activities_missing_detail_lists_only_platform_rows() -> Result<()> {
    let db = create_test_database().await;
    let athlete_id = Uuid::new_v4();

    let garmin_id = db
        .insert_activity(athlete_id, Platform::Garmin, &raw_activity("g-1", 0, 10_000.0, 3_000.0))
        .await?;
    db.insert_activity(athlete_id, Platform::Strava, &raw_activity("s-1", 7_200, 5_000.0, 1_500.0))
        .await?;

    let missing = db.activities_missing_detail(athlete_id, Platform::Garmin, 10).await?;
    assert_eq!(missing, vec![(garmin_id, "g-1".to_owned())]);

    db.mark_detail_synced(garmin_id, Platform::Garmin, None).await?;
    assert!(db.activities_missing_detail(athlete_id, Platform::Garmin, 10).await?.is_empty());
    Ok(())
}
