// ABOUTME: Database operations for activity laps
// ABOUTME: Idempotent bulk upsert keyed on (activity_id, lap_index) and lap retrieval
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::Utc;
use sqlx::Row;

use crate::database::Database;
use crate::errors::AppResult;
use crate::models::Lap;

impl Database {
    /// Bulk-upsert laps for one activity, keyed on
    /// `(activity_id, lap_index)`
    ///
    /// Safe to re-run: an existing lap at the same index is overwritten in
    /// place, never duplicated. Returns the number of laps that were
    /// genuinely new (not already present before this call), so repeated
    /// backfill runs report zero.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails.
    pub async fn upsert_laps(&self, activity_id: i64, laps: &[Lap]) -> AppResult<u64> {
        if laps.is_empty() {
            return Ok(0);
        }

        let before: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM activity_laps WHERE activity_id = ?")
                .bind(activity_id)
                .fetch_one(self.pool())
                .await?;

        let now = Utc::now().to_rfc3339();
        for lap in laps {
            sqlx::query(
                r"
                INSERT INTO activity_laps (
                    activity_id, lap_index, distance_meters, duration_seconds,
                    avg_hr, max_hr, avg_pace, intensity_type, compliance_score,
                    created_at, updated_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(activity_id, lap_index) DO UPDATE SET
                    distance_meters = excluded.distance_meters,
                    duration_seconds = excluded.duration_seconds,
                    avg_hr = excluded.avg_hr,
                    max_hr = excluded.max_hr,
                    avg_pace = excluded.avg_pace,
                    intensity_type = excluded.intensity_type,
                    compliance_score = excluded.compliance_score,
                    updated_at = excluded.updated_at
                ",
            )
            .bind(activity_id)
            .bind(lap.lap_index)
            .bind(lap.distance_meters)
            .bind(lap.duration_seconds)
            .bind(lap.avg_hr)
            .bind(lap.max_hr)
            .bind(lap.avg_pace)
            .bind(lap.intensity_type.as_deref())
            .bind(lap.compliance_score)
            .bind(&now)
            .bind(&now)
            .execute(self.pool())
            .await?;
        }

        let after: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM activity_laps WHERE activity_id = ?")
                .bind(activity_id)
                .fetch_one(self.pool())
                .await?;

        Ok(u64::try_from(after - before).unwrap_or(0))
    }

    /// Fetch all laps for one activity, ordered by lap index
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_laps(&self, activity_id: i64) -> AppResult<Vec<Lap>> {
        let rows = sqlx::query(
            r"
            SELECT activity_id, lap_index, distance_meters, duration_seconds,
                   avg_hr, max_hr, avg_pace, intensity_type, compliance_score
            FROM activity_laps
            WHERE activity_id = ?
            ORDER BY lap_index
            ",
        )
        .bind(activity_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|row| Lap {
                activity_id: row.get("activity_id"),
                lap_index: row.get("lap_index"),
                distance_meters: row.get("distance_meters"),
                duration_seconds: row.get("duration_seconds"),
                avg_hr: row.get("avg_hr"),
                max_hr: row.get("max_hr"),
                avg_pace: row.get("avg_pace"),
                intensity_type: row.get("intensity_type"),
                compliance_score: row.get("compliance_score"),
            })
            .collect())
    }
}
