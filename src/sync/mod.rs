// ABOUTME: The reconciliation engine module tree
// ABOUTME: Sync loop, fuzzy matcher, field-merge policy, and detail backfill worker
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Cross-Platform Activity Reconciliation
//!
//! A sync run is a discrete, lock-guarded batch job over a bounded date
//! range: fetch one platform's activities, reconcile each against the
//! canonical store (exact-id skip, pre-insert merge, insert plus post-insert
//! re-scan), then backfill lap detail for a rate-limited subset.
//!
//! Both dedup checkpoints call the same scoring function in [`matcher`], so
//! thresholds can never diverge between the two paths.

/// Rate-limited per-activity lap and HR-zone backfill
pub mod backfill;
/// The sync-lock-guarded reconciliation loop
pub mod engine;
/// Confidence-scored fuzzy merge-candidate detection
pub mod matcher;
/// Field-merge policy for records that merge
pub mod merge;

pub use backfill::BackfillWorker;
pub use engine::SyncEngine;
pub use matcher::{best_rescan_candidate, find_existing_match, score_pair, MatchFields};
pub use merge::{merge_fields, FieldUpdate};
