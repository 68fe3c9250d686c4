// ABOUTME: Per-activity lap and HR-zone detail backfill worker
// ABOUTME: Idempotent lap upserts; failures are logged and absorbed, never propagated
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::database::Database;
use crate::errors::AppResult;
use crate::models::{Lap, RawLap};
use crate::providers::FitnessProvider;

/// Fetches per-lap splits and HR-zone summaries for activities and upserts
/// them into the canonical store.
///
/// Losing lap detail must never roll back or block the summary-level sync,
/// so [`BackfillWorker::backfill`] absorbs every internal failure: it logs
/// at `warn!` and reports zero laps instead of returning an error.
pub struct BackfillWorker<'a> {
    db: &'a Database,
    provider: Arc<dyn FitnessProvider>,
    config: &'a SyncConfig,
}

impl<'a> BackfillWorker<'a> {
    /// Create a worker bound to one provider for the duration of a sync run
    pub fn new(
        db: &'a Database,
        provider: Arc<dyn FitnessProvider>,
        config: &'a SyncConfig,
    ) -> Self {
        Self {
            db,
            provider,
            config,
        }
    }

    /// Backfill detail for one activity; returns the number of genuinely
    /// new lap rows written. Never fails: any provider or persistence error
    /// yields zero.
    pub async fn backfill(&self, activity_id: i64, external_id: &str) -> u64 {
        match self.backfill_inner(activity_id, external_id).await {
            Ok(laps_inserted) => laps_inserted,
            Err(e) => {
                warn!(
                    activity_id,
                    external_id, "Detail backfill failed, continuing without laps: {e}"
                );
                0
            }
        }
    }

    /// Backfill a batch strictly sequentially, pausing between provider
    /// calls to respect the platform's rate limits. Returns total new laps.
    pub async fn backfill_batch(&self, items: &[(i64, String)]) -> u64 {
        let mut total = 0;
        for (index, (activity_id, external_id)) in items.iter().enumerate() {
            if index > 0 {
                sleep(Duration::from_millis(self.config.backfill_delay_ms)).await;
            }
            total += self.backfill(*activity_id, external_id).await;
        }
        total
    }

    async fn backfill_inner(&self, activity_id: i64, external_id: &str) -> AppResult<u64> {
        let splits = self.provider.get_activity_splits(external_id).await?;
        let hr_zones = self.provider.get_activity_hr_zones(external_id).await?;

        let laps_inserted = match splits {
            Some(splits) if !splits.laps.is_empty() => {
                let laps: Vec<Lap> = splits
                    .laps
                    .iter()
                    .enumerate()
                    .map(|(index, raw)| map_lap(activity_id, index as i64, raw))
                    .collect();
                self.db.upsert_laps(activity_id, &laps).await?
            }
            // No split data is a valid answer, not an error
            _ => 0,
        };

        self.db
            .mark_detail_synced(activity_id, self.provider.platform(), hr_zones.as_ref())
            .await?;

        debug!(activity_id, laps_inserted, "Backfilled activity detail");
        Ok(laps_inserted)
    }
}

fn map_lap(activity_id: i64, lap_index: i64, raw: &RawLap) -> Lap {
    Lap {
        activity_id,
        lap_index,
        distance_meters: raw.distance_meters,
        duration_seconds: raw.duration_seconds,
        avg_hr: raw.avg_hr,
        max_hr: raw.max_hr,
        avg_pace: raw.avg_pace.or_else(|| derived_pace(raw)),
        intensity_type: raw.intensity_type.clone(),
        compliance_score: raw.compliance_score,
    }
}

/// Seconds per kilometer derived from distance and duration when the
/// provider reports no pace
fn derived_pace(raw: &RawLap) -> Option<f64> {
    match (raw.distance_meters, raw.duration_seconds) {
        (Some(distance), Some(duration)) if distance > 0.0 => {
            Some(duration / (distance / 1000.0))
        }
        _ => None,
    }
}
