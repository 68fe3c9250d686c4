// ABOUTME: Core database management for the canonical activity store
// ABOUTME: SQLite connection pool, embedded migrations, per-domain operation modules
//
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Canonical activity CRUD, match-window queries, and merge application
pub mod activities;
/// Lap upserts keyed on (`activity_id`, `lap_index`)
pub mod laps;
/// Athlete merge-preference storage
pub mod preferences;
/// Per-athlete sync lock acquire/release
pub mod sync_locks;
/// Workout flag persistence for review-worthy merge candidates
pub mod workout_flags;

use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite, SqlitePool};
use tracing::info;

use crate::errors::{AppError, AppResult};

/// Database connection pool over the canonical activity store
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Create a new database connection and run pending migrations
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Database URL is invalid or malformed
    /// - Database connection fails
    /// - `SQLite` file creation fails
    /// - Migration process fails
    pub async fn new(database_url: &str) -> AppResult<Self> {
        // Ensure SQLite creates the database file if it doesn't exist
        let connection_options = if database_url.starts_with("sqlite:") {
            format!("{database_url}?mode=rwc")
        } else {
            database_url.to_owned()
        };

        let pool = SqlitePool::connect(&connection_options)
            .await
            .map_err(|e| AppError::database(format!("Failed to connect to database: {e}")))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get a reference to the database pool for advanced operations
    #[must_use]
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Run all pending database migrations
    ///
    /// Migrations are embedded at compile time from `./migrations`, so they
    /// are available regardless of working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if any migration fails or the connection is lost.
    pub async fn migrate(&self) -> AppResult<()> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Migration failed: {e}")))?;
        info!("Database migrations completed successfully");
        Ok(())
    }
}

/// Parse an RFC 3339 column value, tolerating legacy rows by falling back
/// to the minimum timestamp rather than failing the whole query
pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map_or_else(|_| DateTime::<Utc>::MIN_UTC, |dt| dt.with_timezone(&Utc))
}
