// ABOUTME: Confidence-scored fuzzy matching of cross-platform activity pairs
// ABOUTME: Time/distance/duration deltas combined into a 0-100 score with classification
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Fuzzy Merge-Candidate Detector
//!
//! Two independent platforms describing the same workout disagree on clocks
//! and units, so matching is scored rather than exact. The score combines
//! three deltas, each contributing a bounded number of points that decays
//! linearly as the delta grows:
//!
//! - start-time delta, weighted most heavily (time proximity is the most
//!   discriminating signal between independent reports of one workout)
//! - relative distance delta
//! - relative duration delta
//!
//! A metric missing on either side (indoor or manual entries often omit
//! distance) degrades the score with flat partial credit instead of
//! eliminating the pair. Pairs beyond the rescan window or scoring under
//! the candidate floor are not candidates at all.
//!
//! Both the pre-insert matcher and the post-insert re-scan delegate here,
//! so the two dedup checkpoints can never disagree on thresholds.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::database::Database;
use crate::errors::AppResult;
use crate::models::{Activity, MergeCandidate, MergeConfidence, Platform, RawActivity};

/// Points available to the start-time component
const TIME_WEIGHT: f64 = 60.0;
/// Points available to each of the distance and duration components
const METRIC_WEIGHT: f64 = 20.0;
/// Start-time delta at which the time component reaches zero
const TIME_DECAY_SECS: f64 = 3600.0;
/// Relative metric divergence at which a metric component reaches zero
const METRIC_DECAY_RATIO: f64 = 0.5;
/// Flat credit for a metric missing on either side
const MISSING_METRIC_CREDIT: f64 = METRIC_WEIGHT / 2.0;

/// The minimal activity shape the scorer needs
#[derive(Debug, Clone, Copy)]
pub struct MatchFields {
    /// Workout start instant
    pub start_time: DateTime<Utc>,
    /// Total distance in meters, if reported
    pub distance_meters: Option<f64>,
    /// Elapsed duration in seconds, if reported
    pub duration_seconds: Option<f64>,
}

impl From<&Activity> for MatchFields {
    fn from(activity: &Activity) -> Self {
        Self {
            start_time: activity.start_time,
            distance_meters: activity.distance_meters,
            duration_seconds: activity.duration_seconds,
        }
    }
}

impl From<&RawActivity> for MatchFields {
    fn from(raw: &RawActivity) -> Self {
        Self {
            start_time: raw.start_time,
            distance_meters: raw.distance_meters,
            duration_seconds: raw.duration_seconds,
        }
    }
}

/// A scored pair, before it is attached to a concrete candidate row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchScore {
    /// Combined score in `[0, 100]`
    pub confidence_score: f64,
    /// Classification against the configured thresholds
    pub confidence: MergeConfidence,
}

/// Score two activity-shaped records as potential reports of the same
/// physical workout.
///
/// Returns `None` when the pair is not a candidate at all: start times
/// further apart than the rescan window, or a combined score under the
/// configured floor. The score is monotonic — it never increases as any
/// delta grows.
#[must_use]
pub fn score_pair(a: &MatchFields, b: &MatchFields, config: &SyncConfig) -> Option<MatchScore> {
    let delta_t = (a.start_time - b.start_time).num_seconds().unsigned_abs() as f64;
    if delta_t > config.rescan_window().num_seconds() as f64 {
        return None;
    }

    let time_points = TIME_WEIGHT * (1.0 - delta_t / TIME_DECAY_SECS).max(0.0);
    let distance_points = metric_points(a.distance_meters, b.distance_meters);
    let duration_points = metric_points(a.duration_seconds, b.duration_seconds);

    let confidence_score = (time_points + distance_points + duration_points).min(100.0);
    if confidence_score < config.candidate_floor {
        return None;
    }

    let confidence = if confidence_score >= config.auto_merge_threshold {
        MergeConfidence::High
    } else if confidence_score >= config.medium_confidence_threshold {
        MergeConfidence::Medium
    } else {
        MergeConfidence::Low
    };

    Some(MatchScore {
        confidence_score,
        confidence,
    })
}

fn metric_points(a: Option<f64>, b: Option<f64>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) if a.max(b) > 0.0 => {
            let relative_delta = (a - b).abs() / a.max(b);
            METRIC_WEIGHT * (1.0 - relative_delta / METRIC_DECAY_RATIO).max(0.0)
        }
        // Both zero: trivially identical
        (Some(_), Some(_)) => METRIC_WEIGHT,
        // Missing on either side degrades, but does not eliminate, the pair
        _ => MISSING_METRIC_CREDIT,
    }
}

/// Pre-insert dedup matcher.
///
/// Searches the athlete's canonical activities that do not yet carry an id
/// from the incoming platform, within the rescan window around the incoming
/// start time, and returns the best-scoring counterpart only when it clears
/// the auto-merge threshold with distance and duration present on both
/// sides. Pre-insert merging updates a row in place with no review step, so
/// a score propped up by missing-metric credit does not qualify; such pairs
/// are left for the post-insert re-scan, whose tie-break can still merge or
/// flag them. Purely a query; no side effects.
///
/// # Errors
///
/// Returns an error if the candidate query fails.
pub async fn find_existing_match(
    db: &Database,
    athlete_id: Uuid,
    incoming: &RawActivity,
    incoming_platform: Platform,
    config: &SyncConfig,
) -> AppResult<Option<MergeCandidate>> {
    let incoming_fields = MatchFields::from(incoming);
    let best =
        best_candidate_in_window(db, athlete_id, incoming_platform, &incoming_fields, config)
            .await?;

    Ok(best.filter(|candidate| {
        candidate.should_auto_merge()
            && has_complete_metrics(&incoming_fields)
            && has_complete_metrics(&MatchFields::from(&candidate.existing))
    }))
}

const fn has_complete_metrics(fields: &MatchFields) -> bool {
    fields.distance_meters.is_some() && fields.duration_seconds.is_some()
}

/// Post-insert re-scan.
///
/// Same search and scoring as the pre-insert matcher, but keeps the single
/// best candidate at any confidence at or above the floor; the caller
/// decides between auto-merge and flagging. The just-inserted row carries
/// the incoming platform's external id, so the unlinked-candidates query
/// can never return it.
///
/// # Errors
///
/// Returns an error if the candidate query fails.
pub async fn best_rescan_candidate(
    db: &Database,
    athlete_id: Uuid,
    inserted: &Activity,
    incoming_platform: Platform,
    config: &SyncConfig,
) -> AppResult<Option<MergeCandidate>> {
    best_candidate_in_window(
        db,
        athlete_id,
        incoming_platform,
        &MatchFields::from(inserted),
        config,
    )
    .await
}

async fn best_candidate_in_window(
    db: &Database,
    athlete_id: Uuid,
    incoming_platform: Platform,
    fields: &MatchFields,
    config: &SyncConfig,
) -> AppResult<Option<MergeCandidate>> {
    let candidates = db
        .find_unlinked_candidates(
            athlete_id,
            incoming_platform,
            fields.start_time,
            config.rescan_window(),
        )
        .await?;

    let mut best: Option<MergeCandidate> = None;
    for existing in candidates {
        let Some(score) = score_pair(fields, &MatchFields::from(&existing), config) else {
            continue;
        };
        let better = best
            .as_ref()
            .is_none_or(|b| score.confidence_score > b.confidence_score);
        if better {
            best = Some(MergeCandidate {
                existing,
                confidence: score.confidence,
                confidence_score: score.confidence_score,
            });
        }
    }
    Ok(best)
}
