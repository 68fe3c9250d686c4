// ABOUTME: Database operations for workout flags
// ABOUTME: Persists below-threshold merge candidates for the human review step
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::Utc;
use serde_json::json;
use sqlx::Row;
use uuid::Uuid;

use crate::database::{parse_timestamp, Database};
use crate::errors::AppResult;
use crate::models::{MergeConfidence, WorkoutFlag, FLAG_TYPE_MERGE_CANDIDATE};

impl Database {
    /// Persist a merge-candidate flag referencing the retained activity and
    /// its potential counterpart
    ///
    /// Severity mirrors the candidate confidence: medium-confidence pairs
    /// are `warning`, low are `info`.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn insert_merge_flag(
        &self,
        athlete_id: Uuid,
        activity_id: i64,
        potential_match_id: i64,
        confidence: MergeConfidence,
        confidence_score: f64,
    ) -> AppResult<i64> {
        let severity = match confidence {
            MergeConfidence::High | MergeConfidence::Medium => "warning",
            MergeConfidence::Low => "info",
        };
        let flag_data = json!({
            "potential_match_id": potential_match_id,
            "confidence": confidence.as_str(),
            "confidence_score": confidence_score,
        });

        let result = sqlx::query(
            r"
            INSERT INTO workout_flags (athlete_id, activity_id, flag_type, severity, flag_data, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(athlete_id.to_string())
        .bind(activity_id)
        .bind(FLAG_TYPE_MERGE_CANDIDATE)
        .bind(severity)
        .bind(flag_data.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// List all flags for an athlete, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_flags_for_athlete(&self, athlete_id: Uuid) -> AppResult<Vec<WorkoutFlag>> {
        let rows = sqlx::query(
            r"
            SELECT id, athlete_id, activity_id, flag_type, severity, flag_data, created_at
            FROM workout_flags
            WHERE athlete_id = ?
            ORDER BY created_at DESC
            ",
        )
        .bind(athlete_id.to_string())
        .fetch_all(self.pool())
        .await?;

        let mut flags = Vec::with_capacity(rows.len());
        for row in rows {
            let athlete_id_str: String = row.get("athlete_id");
            let created_at_str: String = row.get("created_at");
            let flag_data_str: Option<String> = row.get("flag_data");
            flags.push(WorkoutFlag {
                id: row.get("id"),
                athlete_id: Uuid::parse_str(&athlete_id_str).unwrap_or_else(|_| Uuid::nil()),
                activity_id: row.get("activity_id"),
                flag_type: row.get("flag_type"),
                severity: row.get("severity"),
                flag_data: flag_data_str.and_then(|s| serde_json::from_str(&s).ok()),
                created_at: parse_timestamp(&created_at_str),
            });
        }
        Ok(flags)
    }

    /// Delete one flag; the review UI's "keep separate" resolution
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_flag(&self, flag_id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM workout_flags WHERE id = ?")
            .bind(flag_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}
