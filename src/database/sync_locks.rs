// ABOUTME: Per-athlete sync lock acquire/release against the sync_locks table
// ABOUTME: Atomic conditional insert with TTL expiry so crashed runs never block forever
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::database::Database;
use crate::errors::AppResult;

impl Database {
    /// Try to acquire the per-athlete sync lock
    ///
    /// Returns `false` when a live lock already exists (another sync in
    /// progress). Acquisition is a single conditional insert, so two
    /// processes cannot both observe "no lock" and proceed. Stale rows left
    /// by a crashed run are expired first, based on the TTL recorded at
    /// acquisition time.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub async fn acquire_sync_lock(&self, athlete_id: Uuid, ttl_secs: i64) -> AppResult<bool> {
        let now = Utc::now();

        sqlx::query("DELETE FROM sync_locks WHERE athlete_id = ? AND expires_at <= ?")
            .bind(athlete_id.to_string())
            .bind(now.to_rfc3339())
            .execute(self.pool())
            .await?;

        let expires_at = now + Duration::seconds(ttl_secs);
        let result = sqlx::query(
            r"
            INSERT INTO sync_locks (athlete_id, acquired_at, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(athlete_id) DO NOTHING
            ",
        )
        .bind(athlete_id.to_string())
        .bind(now.to_rfc3339())
        .bind(expires_at.to_rfc3339())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Release the per-athlete sync lock unconditionally
    ///
    /// Safe to call on every exit path, including when acquisition failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn release_sync_lock(&self, athlete_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM sync_locks WHERE athlete_id = ?")
            .bind(athlete_id.to_string())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Whether a live lock currently exists for the athlete
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn sync_lock_held(&self, athlete_id: Uuid) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sync_locks WHERE athlete_id = ? AND expires_at > ?",
        )
        .bind(athlete_id.to_string())
        .bind(Utc::now().to_rfc3339())
        .fetch_one(self.pool())
        .await?;
        Ok(count > 0)
    }
}
