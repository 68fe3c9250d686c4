// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Temp-file database setup, raw activity builders, and a mock provider
//
// SPDX-License-Identifier: MIT OR Apache-2.0
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Once;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use tokio::time::sleep;
use uuid::Uuid;

use stride_sync::config::SyncConfig;
use stride_sync::database::Database;
use stride_sync::errors::{AppError, AppResult};
use stride_sync::models::{HrZoneSummary, Platform, RawActivity, RawLap, RawSplits};
use stride_sync::providers::FitnessProvider;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_test_writer()
            .init();
    });
}

/// Standard test database setup: a unique temp directory per test for
/// isolation, kept past the tempdir guard so the pool outlives this call
pub async fn create_test_database() -> Database {
    init_test_logging();
    let dir = tempfile::tempdir()
        .expect("Failed to create temp dir")
        .keep();
    let database_url = format!("sqlite:{}", dir.join("stride_test.db").display());
    Database::new(&database_url)
        .await
        .expect("Failed to create test database")
}

/// Fast test configuration: no backfill pacing delay
pub fn test_config() -> SyncConfig {
    SyncConfig {
        backfill_delay_ms: 0,
        ..SyncConfig::default()
    }
}

/// A workout morning on a fixed date, offset by `offset_secs`
pub fn start_at(offset_secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 7, 0, 0).unwrap() + chrono::Duration::seconds(offset_secs)
}

/// Build a raw provider activity with the given summary metrics
pub fn raw_activity(
    external_id: &str,
    start_offset_secs: i64,
    distance_meters: f64,
    duration_seconds: f64,
) -> RawActivity {
    RawActivity {
        external_id: external_id.to_owned(),
        activity_name: Some("Morning Run".to_owned()),
        activity_type: Some("running".to_owned()),
        start_time: start_at(start_offset_secs),
        distance_meters: Some(distance_meters),
        duration_seconds: Some(duration_seconds),
        moving_duration_seconds: Some(duration_seconds - 20.0),
        elevation_gain_meters: Some(85.0),
        elevation_loss_meters: Some(82.0),
        avg_hr: Some(148),
        max_hr: Some(176),
        calories: Some(640),
        avg_cadence: Some(172.0),
        max_cadence: Some(188.0),
        payload: json!({"id": external_id, "device": "test"}),
    }
}

/// Three evenly split laps summing to the given totals
pub fn three_lap_splits(distance_meters: f64, duration_seconds: f64) -> RawSplits {
    let laps = (0..3)
        .map(|i| RawLap {
            distance_meters: Some(distance_meters / 3.0),
            duration_seconds: Some(duration_seconds / 3.0),
            avg_hr: Some(145 + i),
            max_hr: Some(170 + i),
            avg_pace: None,
            intensity_type: Some("active".to_owned()),
            compliance_score: None,
        })
        .collect();
    RawSplits { laps }
}

/// Configurable in-memory provider for driving the engine in tests
#[derive(Default)]
pub struct MockProvider {
    pub platform: Option<Platform>,
    pub activities: Vec<RawActivity>,
    pub splits: HashMap<String, RawSplits>,
    pub hr_zones: HashMap<String, HrZoneSummary>,
    pub fail_fetch_with_auth: bool,
    pub fail_detail: bool,
    pub fetch_delay_ms: u64,
}

impl MockProvider {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform: Some(platform),
            ..Self::default()
        }
    }

    pub fn with_activities(mut self, activities: Vec<RawActivity>) -> Self {
        self.activities = activities;
        self
    }

    pub fn with_splits(mut self, external_id: &str, splits: RawSplits) -> Self {
        self.splits.insert(external_id.to_owned(), splits);
        self
    }

    pub fn with_hr_zones(mut self, external_id: &str, zones: HrZoneSummary) -> Self {
        self.hr_zones.insert(external_id.to_owned(), zones);
        self
    }

    pub fn failing_auth(mut self) -> Self {
        self.fail_fetch_with_auth = true;
        self
    }

    pub fn failing_detail(mut self) -> Self {
        self.fail_detail = true;
        self
    }

    pub fn with_fetch_delay(mut self, delay_ms: u64) -> Self {
        self.fetch_delay_ms = delay_ms;
        self
    }
}

#[async_trait]
impl FitnessProvider for MockProvider {
    fn platform(&self) -> Platform {
        self.platform.unwrap_or(Platform::Garmin)
    }

    async fn get_activities(
        &self,
        _athlete_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> AppResult<Vec<RawActivity>> {
        if self.fetch_delay_ms > 0 {
            sleep(Duration::from_millis(self.fetch_delay_ms)).await;
        }
        if self.fail_fetch_with_auth {
            return Err(AppError::provider_auth(
                self.platform().as_str(),
                "token expired",
            ));
        }
        Ok(self
            .activities
            .iter()
            .filter(|a| a.start_time >= start && a.start_time <= end)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn get_activity_splits(&self, external_id: &str) -> AppResult<Option<RawSplits>> {
        if self.fail_detail {
            return Err(AppError::provider(
                self.platform().as_str(),
                "detail endpoint unavailable",
            ));
        }
        Ok(self.splits.get(external_id).cloned())
    }

    async fn get_activity_hr_zones(&self, external_id: &str) -> AppResult<Option<HrZoneSummary>> {
        if self.fail_detail {
            return Err(AppError::provider(
                self.platform().as_str(),
                "detail endpoint unavailable",
            ));
        }
        Ok(self.hr_zones.get(external_id).cloned())
    }
}
