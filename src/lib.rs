// ABOUTME: Main library entry point for the stride_sync reconciliation engine
// ABOUTME: Merges Garmin and Strava activity feeds into one canonical history per athlete
//
// SPDX-License-Identifier: MIT OR Apache-2.0

#![deny(unsafe_code)]

//! # Stride Sync
//!
//! A cross-platform workout activity reconciliation engine. Two independent
//! fitness platforms (Garmin, a watch vendor, and Strava, a social-fitness
//! network) report the same physical workouts with different identifiers,
//! clocks, and units. This crate ingests both feeds into a single canonical
//! activity history per athlete without producing duplicates, regardless of
//! arrival order.
//!
//! ## Architecture
//!
//! - **Providers**: the [`providers::FitnessProvider`] trait is the contract
//!   external platform adapters implement (OAuth and HTTP paging live there,
//!   not here)
//! - **Database**: canonical Activity/Lap/WorkoutFlag storage on `SQLite`
//!   via `sqlx`, with embedded migrations
//! - **Sync**: the reconciliation loop, fuzzy matcher, field-merge policy,
//!   and rate-limited lap backfill worker
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chrono::{TimeZone, Utc};
//! use uuid::Uuid;
//! use stride_sync::database::Database;
//! use stride_sync::config::SyncConfig;
//! use stride_sync::models::Platform;
//! use stride_sync::providers::ProviderRegistry;
//! use stride_sync::sync::SyncEngine;
//!
//! # async fn example(registry: ProviderRegistry) -> stride_sync::errors::AppResult<()> {
//! let db = Database::new("sqlite:stride.db").await?;
//! let engine = SyncEngine::new(db, registry, SyncConfig::from_env());
//!
//! let outcome = engine
//!     .run_sync(
//!         Platform::Garmin,
//!         Uuid::new_v4(),
//!         Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
//!         Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap(),
//!         None,
//!     )
//!     .await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

/// Tunable reconciliation parameters (match windows, thresholds, rate limits)
pub mod config;

/// Canonical database storage for activities, laps, flags, and sync locks
pub mod database;

/// Unified error handling for the reconciliation engine
pub mod errors;

/// Structured logging initialization
pub mod logging;

/// Common data models for canonical and provider-shaped fitness data
pub mod models;

/// Fitness provider contract and registry
pub mod providers;

/// The reconciliation engine: sync loop, matcher, merge policy, backfill
pub mod sync;
