// ABOUTME: Database operations for canonical activities
// ABOUTME: Insert, lookup by external id, match-window queries, merge application, deletion
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::database::{parse_timestamp, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{
    Activity, ActivitySource, HrZoneSummary, MergeStatus, Platform, RawActivity,
};
use crate::sync::merge::FieldUpdate;

/// Column holding the given platform's external activity id
const fn external_id_column(platform: Platform) -> &'static str {
    match platform {
        Platform::Garmin => "garmin_activity_id",
        Platform::Strava => "strava_activity_id",
    }
}

/// Column holding the given platform's last-sync timestamp
const fn synced_at_column(platform: Platform) -> &'static str {
    match platform {
        Platform::Garmin => "garmin_synced_at",
        Platform::Strava => "strava_synced_at",
    }
}

/// Column holding the given platform's opaque payload
const fn payload_column(platform: Platform) -> &'static str {
    match platform {
        Platform::Garmin => "garmin_payload",
        Platform::Strava => "strava_payload",
    }
}

fn activity_from_row(row: &SqliteRow) -> Activity {
    let source_str: String = row.get("source");
    let merge_status_str: String = row.get("merge_status");
    let athlete_id_str: String = row.get("athlete_id");
    let start_time_str: String = row.get("start_time");
    let created_at_str: String = row.get("created_at");
    let updated_at_str: String = row.get("updated_at");

    Activity {
        id: row.get("id"),
        athlete_id: Uuid::parse_str(&athlete_id_str).unwrap_or_else(|_| Uuid::nil()),
        source: ActivitySource::from_str_value(&source_str).unwrap_or(ActivitySource::Merged),
        garmin_activity_id: row.get("garmin_activity_id"),
        strava_activity_id: row.get("strava_activity_id"),
        activity_name: row.get("activity_name"),
        activity_type: row.get("activity_type"),
        start_time: parse_timestamp(&start_time_str),
        distance_meters: row.get("distance_meters"),
        duration_seconds: row.get("duration_seconds"),
        moving_duration_seconds: row.get("moving_duration_seconds"),
        elevation_gain_meters: row.get("elevation_gain_meters"),
        elevation_loss_meters: row.get("elevation_loss_meters"),
        avg_hr: row.get("avg_hr"),
        max_hr: row.get("max_hr"),
        calories: row.get("calories"),
        avg_cadence: row.get("avg_cadence"),
        max_cadence: row.get("max_cadence"),
        has_detail_data: row.get::<i64, _>("has_detail_data") != 0,
        hr_zone_summary: parse_json_column(row, "hr_zone_summary"),
        garmin_payload: parse_json_column(row, "garmin_payload"),
        strava_payload: parse_json_column(row, "strava_payload"),
        garmin_synced_at: parse_optional_timestamp(row, "garmin_synced_at"),
        strava_synced_at: parse_optional_timestamp(row, "strava_synced_at"),
        merge_status: MergeStatus::from_str_value(&merge_status_str).unwrap_or_default(),
        confidence_score: row.get("confidence_score"),
        created_at: parse_timestamp(&created_at_str),
        updated_at: parse_timestamp(&updated_at_str),
    }
}

fn parse_json_column(row: &SqliteRow, column: &str) -> Option<Value> {
    let raw: Option<String> = row.get(column);
    raw.and_then(|s| serde_json::from_str(&s).ok())
}

fn parse_optional_timestamp(row: &SqliteRow, column: &str) -> Option<DateTime<Utc>> {
    let raw: Option<String> = row.get(column);
    raw.map(|s| parse_timestamp(&s))
}

impl Database {
    /// Insert a new canonical activity for a raw provider record
    ///
    /// Returns the store-assigned id. Ids are monotonic (`SQLite` rowids),
    /// which the merge tie-break relies on.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails, including unique-key violations
    /// on `(athlete_id, external_id)`.
    pub async fn insert_activity(
        &self,
        athlete_id: Uuid,
        platform: Platform,
        raw: &RawActivity,
    ) -> AppResult<i64> {
        let now = Utc::now().to_rfc3339();
        let payload = serde_json::to_string(&raw.payload)?;
        let sql = format!(
            r"
            INSERT INTO activities (
                athlete_id, source, {ext_col}, activity_name, activity_type,
                start_time, distance_meters, duration_seconds, moving_duration_seconds,
                elevation_gain_meters, elevation_loss_meters, avg_hr, max_hr,
                calories, avg_cadence, max_cadence, {payload_col}, {synced_col},
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
            ext_col = external_id_column(platform),
            payload_col = payload_column(platform),
            synced_col = synced_at_column(platform),
        );

        let result = sqlx::query(&sql)
            .bind(athlete_id.to_string())
            .bind(ActivitySource::from(platform).as_str())
            .bind(&raw.external_id)
            .bind(&raw.activity_name)
            .bind(&raw.activity_type)
            .bind(raw.start_time.to_rfc3339())
            .bind(raw.distance_meters)
            .bind(raw.duration_seconds)
            .bind(raw.moving_duration_seconds)
            .bind(raw.elevation_gain_meters)
            .bind(raw.elevation_loss_meters)
            .bind(raw.avg_hr)
            .bind(raw.max_hr)
            .bind(raw.calories)
            .bind(raw.avg_cadence)
            .bind(raw.max_cadence)
            .bind(&payload)
            .bind(&now)
            .bind(&now)
            .bind(&now)
            .execute(self.pool())
            .await?;

        Ok(result.last_insert_rowid())
    }

    /// Fetch one activity by id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_activity(&self, id: i64) -> AppResult<Option<Activity>> {
        let row = sqlx::query("SELECT * FROM activities WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.as_ref().map(activity_from_row))
    }

    /// Fetch the athlete's activity carrying the given platform external id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_by_external_id(
        &self,
        athlete_id: Uuid,
        platform: Platform,
        external_id: &str,
    ) -> AppResult<Option<Activity>> {
        let sql = format!(
            "SELECT * FROM activities WHERE athlete_id = ? AND {} = ?",
            external_id_column(platform)
        );
        let row = sqlx::query(&sql)
            .bind(athlete_id.to_string())
            .bind(external_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.as_ref().map(activity_from_row))
    }

    /// Fetch the athlete's activities that could still be linked to an
    /// incoming record from `platform`: rows with no external id from that
    /// platform yet, starting within `center ± window`.
    ///
    /// A row missing the incoming platform's id is by construction either
    /// from the other source or not yet merged, so no extra source filter
    /// is needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_unlinked_candidates(
        &self,
        athlete_id: Uuid,
        platform: Platform,
        center: DateTime<Utc>,
        window: Duration,
    ) -> AppResult<Vec<Activity>> {
        let lower = (center - window).to_rfc3339();
        let upper = (center + window).to_rfc3339();
        let sql = format!(
            r"
            SELECT * FROM activities
            WHERE athlete_id = ?
              AND {} IS NULL
              AND start_time >= ? AND start_time <= ?
            ORDER BY start_time
            ",
            external_id_column(platform)
        );
        let rows = sqlx::query(&sql)
            .bind(athlete_id.to_string())
            .bind(&lower)
            .bind(&upper)
            .fetch_all(self.pool())
            .await?;
        Ok(rows.iter().map(activity_from_row).collect())
    }

    /// Apply a merge to `target_id`: attach the incoming platform's external
    /// id, payload, and sync timestamp, set `source = merged`, and update
    /// descriptive fields per the already-resolved field-merge decision
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails or the target row is gone.
    pub async fn apply_merge(&self, target_id: i64, update: &FieldUpdate) -> AppResult<()> {
        let now = Utc::now().to_rfc3339();
        let payload = serde_json::to_string(&update.payload)?;
        let sql = format!(
            r"
            UPDATE activities SET
                {ext_col} = ?,
                {payload_col} = ?,
                {synced_col} = ?,
                source = 'merged',
                activity_name = COALESCE(?, activity_name),
                activity_type = COALESCE(?, activity_type),
                confidence_score = ?,
                merge_status = 'none',
                updated_at = ?
            WHERE id = ?
            ",
            ext_col = external_id_column(update.incoming_platform),
            payload_col = payload_column(update.incoming_platform),
            synced_col = synced_at_column(update.incoming_platform),
        );

        let result = sqlx::query(&sql)
            .bind(&update.external_id)
            .bind(&payload)
            .bind(&now)
            .bind(&update.activity_name)
            .bind(&update.activity_type)
            .bind(update.confidence_score)
            .bind(&now)
            .bind(target_id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::database(format!(
                "Merge target activity {target_id} no longer exists"
            )));
        }
        Ok(())
    }

    /// Delete one activity row (its laps cascade)
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_activity(&self, id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM activities WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Set the pending-review marker and candidate score on a flagged row
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn mark_pending_review(&self, id: i64, confidence_score: f64) -> AppResult<()> {
        sqlx::query(
            r"
            UPDATE activities
            SET merge_status = 'pending_review', confidence_score = ?, updated_at = ?
            WHERE id = ?
            ",
        )
        .bind(confidence_score)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Mark an activity as detail-complete after backfill, storing the
    /// HR-zone summary when the provider returned one
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn mark_detail_synced(
        &self,
        id: i64,
        platform: Platform,
        hr_zones: Option<&HrZoneSummary>,
    ) -> AppResult<()> {
        let now = Utc::now().to_rfc3339();
        let zones_json = hr_zones.map(serde_json::to_string).transpose()?;
        let sql = format!(
            r"
            UPDATE activities SET
                has_detail_data = 1,
                hr_zone_summary = COALESCE(?, hr_zone_summary),
                {synced_col} = ?,
                updated_at = ?
            WHERE id = ?
            ",
            synced_col = synced_at_column(platform),
        );
        sqlx::query(&sql)
            .bind(zones_json)
            .bind(&now)
            .bind(&now)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// List ids and external ids of the athlete's activities on `platform`
    /// still lacking detail data, oldest first, capped at `limit`
    ///
    /// Used to pick the per-run quota of legacy backfills for activities
    /// that predate detail capture.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn activities_missing_detail(
        &self,
        athlete_id: Uuid,
        platform: Platform,
        limit: u32,
    ) -> AppResult<Vec<(i64, String)>> {
        let ext_col = external_id_column(platform);
        let sql = format!(
            r"
            SELECT id, {ext_col} AS external_id FROM activities
            WHERE athlete_id = ? AND has_detail_data = 0 AND {ext_col} IS NOT NULL
            ORDER BY start_time
            LIMIT ?
            ",
        );
        let rows = sqlx::query(&sql)
            .bind(athlete_id.to_string())
            .bind(i64::from(limit))
            .fetch_all(self.pool())
            .await?;
        Ok(rows
            .iter()
            .map(|row| (row.get("id"), row.get("external_id")))
            .collect())
    }

    /// List the athlete's activities within `[start, end]`, ordered by
    /// start time
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_activities(
        &self,
        athlete_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Activity>> {
        let rows = sqlx::query(
            r"
            SELECT * FROM activities
            WHERE athlete_id = ? AND start_time >= ? AND start_time <= ?
            ORDER BY start_time
            ",
        )
        .bind(athlete_id.to_string())
        .bind(start.to_rfc3339())
        .bind(end.to_rfc3339())
        .fetch_all(self.pool())
        .await?;
        Ok(rows.iter().map(activity_from_row).collect())
    }

    /// Count the athlete's canonical activities
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn count_activities(&self, athlete_id: Uuid) -> AppResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM activities WHERE athlete_id = ?")
                .bind(athlete_id.to_string())
                .fetch_one(self.pool())
                .await?;
        Ok(count)
    }
}
