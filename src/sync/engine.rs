// ABOUTME: The sync-lock-guarded reconciliation loop
// ABOUTME: Exact-id skip, pre-insert merge, insert, post-insert re-scan, tie-break, backfill
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Reconciliation Loop
//!
//! Per fetched raw activity the loop moves through a small state machine:
//! `Unseen -> ExactMatch | PreInsertMerged | Inserted`, and from `Inserted`
//! to `AutoMerged | FlaggedForReview | Standalone`. Processing is strictly
//! sequential: the lowest-id-wins tie-break depends on deterministic
//! insert ordering, and provider rate limits forbid fan-out anyway.
//!
//! Which row survives a merge is decided by id: the candidate with the
//! lower (older) id is always the merge target. When a post-insert re-scan
//! finds a high-confidence counterpart with a HIGHER id than the row just
//! inserted, the merge is skipped this round and both rows stay standalone
//! until a later run or a reviewer reconciles them.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{
    MergeCandidate, Platform, PreferredDataSource, RawActivity, SyncOutcome, SyncReport,
};
use crate::providers::ProviderRegistry;
use crate::sync::backfill::BackfillWorker;
use crate::sync::matcher::{best_rescan_candidate, find_existing_match};
use crate::sync::merge::merge_fields;

/// How one raw activity resolved inside the loop
enum ItemOutcome {
    /// An activity with this external id already exists; optionally queue
    /// it for legacy backfill
    ExactMatch { needs_backfill: Option<i64> },
    /// Merged into an existing counterpart before inserting anything
    PreInsertMerged { target_id: i64 },
    /// Inserted and auto-merged into an older counterpart
    AutoMerged { survivor_id: i64 },
    /// Inserted and flagged for human review against a weaker candidate
    FlaggedForReview { inserted_id: i64 },
    /// Inserted with no counterpart found (or tie-break deferred the merge)
    Standalone { inserted_id: i64 },
}

/// The cross-platform activity reconciliation engine.
///
/// One instance serves any number of athletes; concurrency across athletes
/// is fine, while per-athlete mutual exclusion is enforced by the sync
/// lock inside [`SyncEngine::run_sync`].
pub struct SyncEngine {
    db: Database,
    registry: ProviderRegistry,
    config: SyncConfig,
}

impl SyncEngine {
    /// Create an engine over the canonical store and provider registry
    #[must_use]
    pub fn new(db: Database, registry: ProviderRegistry, config: SyncConfig) -> Self {
        Self {
            db,
            registry,
            config,
        }
    }

    /// The canonical store this engine writes to
    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.db
    }

    /// Sync one platform's activities for one athlete over
    /// `[start, end]`.
    ///
    /// Acquires the per-athlete sync lock first; when another run holds it
    /// the call returns [`SyncOutcome::AlreadyRunning`] without touching
    /// any rows. The lock is released on every exit path, including
    /// provider failures mid-run; rows committed before such a failure
    /// stay committed.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for an invalid date range (checked
    /// before the lock), and propagates provider/auth failures as terminal
    /// run errors.
    pub async fn run_sync(
        &self,
        platform: Platform,
        athlete_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: Option<u32>,
    ) -> AppResult<SyncOutcome> {
        if start >= end {
            return Err(AppError::validation(
                "Sync date range is empty: start must precede end",
            ));
        }
        let limit = limit.unwrap_or(self.config.default_fetch_limit);
        if limit == 0 {
            return Err(AppError::validation("Fetch limit must be positive"));
        }

        if !self
            .db
            .acquire_sync_lock(athlete_id, self.config.lock_ttl_secs)
            .await?
        {
            info!(%athlete_id, %platform, "Sync already in progress, rejecting");
            return Ok(SyncOutcome::AlreadyRunning);
        }

        // Guaranteed-release: run the whole job, then release before
        // surfacing its result, whatever that result is.
        let result = self
            .run_locked(platform, athlete_id, start, end, limit)
            .await;
        if let Err(e) = self.db.release_sync_lock(athlete_id).await {
            warn!(%athlete_id, "Failed to release sync lock: {e}");
        }

        result.map(SyncOutcome::Completed)
    }

    async fn run_locked(
        &self,
        platform: Platform,
        athlete_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> AppResult<SyncReport> {
        let provider = self.registry.get(platform)?;

        // Fetch failure (incl. auth) is terminal; nothing is committed yet.
        let raw_activities = provider
            .get_activities(athlete_id, start, end, limit)
            .await?;
        info!(
            %athlete_id,
            %platform,
            fetched = raw_activities.len(),
            "Fetched activities for reconciliation"
        );

        let preference = self.db.get_preferred_data_source(athlete_id).await?;

        let mut report = SyncReport::default();
        // Always backfilled: rows this run inserted or merged
        let mut fresh_backfills: Vec<(i64, String)> = Vec::new();
        // Capped per run: pre-existing rows that predate detail capture
        let mut legacy_backfills: Vec<(i64, String)> = Vec::new();

        for raw in &raw_activities {
            match self
                .reconcile_one(platform, athlete_id, raw, preference)
                .await
            {
                Ok(ItemOutcome::ExactMatch { needs_backfill }) => {
                    report.synced += 1;
                    if let Some(id) = needs_backfill {
                        if legacy_backfills.len() < self.config.legacy_backfill_cap {
                            legacy_backfills.push((id, raw.external_id.clone()));
                        }
                    }
                }
                Ok(ItemOutcome::PreInsertMerged { target_id }) => {
                    report.merged += 1;
                    fresh_backfills.push((target_id, raw.external_id.clone()));
                }
                Ok(ItemOutcome::AutoMerged { survivor_id }) => {
                    report.merged += 1;
                    fresh_backfills.push((survivor_id, raw.external_id.clone()));
                }
                Ok(ItemOutcome::FlaggedForReview { inserted_id }) => {
                    report.synced += 1;
                    report.pending_review += 1;
                    fresh_backfills.push((inserted_id, raw.external_id.clone()));
                }
                Ok(ItemOutcome::Standalone { inserted_id }) => {
                    report.synced += 1;
                    fresh_backfills.push((inserted_id, raw.external_id.clone()));
                }
                // Provider-class failures are terminal for the run
                Err(e) if e.is_fatal_for_run() => return Err(e),
                // Per-item persistence errors never abort the run
                Err(e) => {
                    warn!(
                        %athlete_id,
                        external_id = %raw.external_id,
                        "Skipping activity after persistence error: {e}"
                    );
                    report.skipped += 1;
                }
            }
        }

        // Fill any remaining legacy quota with detail-less rows that
        // predate this batch entirely (synced before detail capture).
        if legacy_backfills.len() < self.config.legacy_backfill_cap {
            let queued: std::collections::HashSet<i64> = fresh_backfills
                .iter()
                .chain(&legacy_backfills)
                .map(|(id, _)| *id)
                .collect();
            let fetch = (self.config.legacy_backfill_cap + queued.len()) as u32;
            let remaining = self.config.legacy_backfill_cap - legacy_backfills.len();
            let extra = self
                .db
                .activities_missing_detail(athlete_id, platform, fetch)
                .await?
                .into_iter()
                .filter(|(id, _)| !queued.contains(id))
                .take(remaining);
            legacy_backfills.extend(extra);
        }

        let worker = BackfillWorker::new(&self.db, provider, &self.config);
        report.laps_inserted += worker.backfill_batch(&fresh_backfills).await;
        report.laps_inserted += worker.backfill_batch(&legacy_backfills).await;

        info!(
            %athlete_id,
            %platform,
            synced = report.synced,
            merged = report.merged,
            pending_review = report.pending_review,
            skipped = report.skipped,
            laps_inserted = report.laps_inserted,
            "Sync run complete"
        );
        Ok(report)
    }

    /// Run one raw activity through the reconciliation state machine
    async fn reconcile_one(
        &self,
        platform: Platform,
        athlete_id: Uuid,
        raw: &RawActivity,
        preference: PreferredDataSource,
    ) -> AppResult<ItemOutcome> {
        // 1. Exact match: this platform already reported this activity.
        if let Some(existing) = self
            .db
            .find_by_external_id(athlete_id, platform, &raw.external_id)
            .await?
        {
            debug!(activity_id = existing.id, "Exact external-id match, skipping insert");
            let needs_backfill = (!existing.has_detail_data).then_some(existing.id);
            return Ok(ItemOutcome::ExactMatch { needs_backfill });
        }

        // 2. Pre-insert merge: a confident counterpart from the other
        //    source already exists, so update it in place instead of
        //    inserting a duplicate.
        if let Some(candidate) =
            find_existing_match(&self.db, athlete_id, raw, platform, &self.config).await?
        {
            let update = merge_fields(platform, raw, preference, Some(candidate.confidence_score));
            self.db.apply_merge(candidate.existing.id, &update).await?;
            info!(
                target_id = candidate.existing.id,
                score = candidate.confidence_score,
                "Pre-insert merge into existing counterpart"
            );
            return Ok(ItemOutcome::PreInsertMerged {
                target_id: candidate.existing.id,
            });
        }

        // 3. Insert a new canonical row.
        let inserted_id = self.db.insert_activity(athlete_id, platform, raw).await?;
        let inserted = self
            .db
            .get_activity(inserted_id)
            .await?
            .ok_or_else(|| AppError::database("Inserted activity row disappeared"))?;

        // 4. Post-insert re-scan: pre-insert only merges complete-metric
        //    pairs, so a counterpart relying on missing-metric credit (or
        //    one slipped in by a concurrent run) surfaces here instead.
        let candidate =
            best_rescan_candidate(&self.db, athlete_id, &inserted, platform, &self.config).await?;

        match candidate {
            Some(candidate) if candidate.should_auto_merge() => {
                self.resolve_auto_merge(platform, raw, preference, inserted_id, candidate)
                    .await
            }
            // 6. Below the auto-merge threshold: flag for human review,
            //    keep the new row standalone.
            Some(candidate) => {
                self.db
                    .insert_merge_flag(
                        athlete_id,
                        inserted_id,
                        candidate.existing.id,
                        candidate.confidence,
                        candidate.confidence_score,
                    )
                    .await?;
                self.db
                    .mark_pending_review(inserted_id, candidate.confidence_score)
                    .await?;
                info!(
                    inserted_id,
                    potential_match_id = candidate.existing.id,
                    confidence = %candidate.confidence.as_str(),
                    "Merge candidate flagged for review"
                );
                Ok(ItemOutcome::FlaggedForReview { inserted_id })
            }
            // 7. No candidate at all.
            None => Ok(ItemOutcome::Standalone { inserted_id }),
        }
    }

    /// Step 5: apply (or conservatively defer) a high-confidence merge
    /// found by the post-insert re-scan.
    async fn resolve_auto_merge(
        &self,
        platform: Platform,
        raw: &RawActivity,
        preference: PreferredDataSource,
        inserted_id: i64,
        candidate: MergeCandidate,
    ) -> AppResult<ItemOutcome> {
        // Lowest id wins: only merge when the existing row is the older
        // one. Otherwise leave both standalone; a concurrent run may be
        // mid-flight on the other row, and double-deletion must never
        // happen.
        if candidate.existing.id >= inserted_id {
            debug!(
                inserted_id,
                candidate_id = candidate.existing.id,
                "Deferring auto-merge: existing candidate is not the older row"
            );
            return Ok(ItemOutcome::Standalone { inserted_id });
        }

        let survivor_id = candidate.existing.id;
        let update = merge_fields(platform, raw, preference, Some(candidate.confidence_score));
        // Delete first: until the new row is gone, attaching its external id
        // to the survivor would collide with the unique key on
        // (athlete_id, external id). Losing the delete-to-merge window is
        // harmless; the next run re-fetches the record and merges it then.
        self.db.delete_activity(inserted_id).await?;
        self.db.apply_merge(survivor_id, &update).await?;
        info!(
            survivor_id,
            deleted_id = inserted_id,
            score = candidate.confidence_score,
            "Auto-merged post-insert counterpart"
        );
        Ok(ItemOutcome::AutoMerged { survivor_id })
    }
}
