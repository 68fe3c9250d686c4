// ABOUTME: Fitness provider contract and the per-platform provider registry
// ABOUTME: Adapters for Garmin and Strava implement FitnessProvider; the engine only sees the trait
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Fitness Data Provider Contract
//!
//! The reconciliation engine treats each platform as an opaque source of
//! [`RawActivity`] records plus two optional detail endpoints. OAuth token
//! acquisition/refresh and HTTP paging are the adapter's job; by the time a
//! provider method is called it must already be authenticated, and it raises
//! [`AppError::ProviderAuth`] when that is no longer true.
//!
//! `None` from a detail endpoint is a valid "no detail available" answer,
//! not an error; indoor and manual entries frequently have no splits.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{HrZoneSummary, Platform, RawActivity, RawSplits};

/// Contract implemented by each platform adapter
#[async_trait]
pub trait FitnessProvider: Send + Sync {
    /// Which platform this adapter speaks to
    fn platform(&self) -> Platform;

    /// Fetch the athlete's activities within `[start, end]`, newest page
    /// first, at most `limit` records
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ProviderAuth`] when credentials are rejected and
    /// [`AppError::Provider`] for any other upstream failure. Both are fatal
    /// for the sync run.
    async fn get_activities(
        &self,
        athlete_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> AppResult<Vec<RawActivity>>;

    /// Fetch per-lap splits for one activity; `None` when the platform has
    /// no split data for it
    ///
    /// # Errors
    ///
    /// Returns an error on upstream failure; the backfill worker absorbs it.
    async fn get_activity_splits(&self, external_id: &str) -> AppResult<Option<RawSplits>>;

    /// Fetch the heart-rate-zone summary for one activity; `None` when the
    /// platform has none
    ///
    /// # Errors
    ///
    /// Returns an error on upstream failure; the backfill worker absorbs it.
    async fn get_activity_hr_zones(&self, external_id: &str) -> AppResult<Option<HrZoneSummary>>;
}

/// Registry mapping each platform to its adapter
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<Platform, Arc<dyn FitnessProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own platform
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn FitnessProvider>) -> Self {
        self.providers.insert(provider.platform(), provider);
        self
    }

    /// Look up the adapter for a platform
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] when no adapter is registered for
    /// `platform`.
    pub fn get(&self, platform: Platform) -> AppResult<Arc<dyn FitnessProvider>> {
        self.providers.get(&platform).cloned().ok_or_else(|| {
            AppError::validation(format!("No provider registered for {platform}"))
        })
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("platforms", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}
