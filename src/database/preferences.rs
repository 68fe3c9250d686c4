// ABOUTME: Athlete merge-preference storage
// ABOUTME: Which platform's descriptive fields win when records merge
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::Utc;
use uuid::Uuid;

use crate::database::Database;
use crate::errors::AppResult;
use crate::models::PreferredDataSource;

impl Database {
    /// Read the athlete's preferred data source, defaulting to
    /// `MostRecent` when none is stored
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_preferred_data_source(
        &self,
        athlete_id: Uuid,
    ) -> AppResult<PreferredDataSource> {
        let raw: Option<String> = sqlx::query_scalar(
            "SELECT preferred_data_source FROM athlete_preferences WHERE athlete_id = ?",
        )
        .bind(athlete_id.to_string())
        .fetch_optional(self.pool())
        .await?;

        Ok(raw
            .as_deref()
            .and_then(PreferredDataSource::from_str_value)
            .unwrap_or_default())
    }

    /// Store the athlete's preferred data source (upsert)
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub async fn set_preferred_data_source(
        &self,
        athlete_id: Uuid,
        preference: PreferredDataSource,
    ) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO athlete_preferences (athlete_id, preferred_data_source, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(athlete_id) DO UPDATE SET
                preferred_data_source = excluded.preferred_data_source,
                updated_at = excluded.updated_at
            ",
        )
        .bind(athlete_id.to_string())
        .bind(preference.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }
}
