// ABOUTME: Unified error types for the reconciliation engine
// ABOUTME: AppError taxonomy with constructor helpers and the AppResult alias
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

/// Result alias used throughout the crate
pub type AppResult<T> = Result<T, AppError>;

/// Error taxonomy for a sync run.
///
/// A sync-lock conflict is deliberately NOT an error variant: another run
/// being in progress is a normal outcome, surfaced as
/// [`crate::models::SyncOutcome::AlreadyRunning`]. Per-activity persistence
/// failures and backfill failures are absorbed into the run's aggregate
/// counts and never reach the caller as an `Err`.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Provider returned an error while fetching activities or detail
    #[error("Provider error ({platform}): {message}")]
    Provider {
        /// Platform the failing call targeted
        platform: String,
        /// Provider-reported failure detail
        message: String,
    },

    /// Provider rejected our credentials; fatal for the run
    #[error("Provider authentication failed ({platform}): {message}")]
    ProviderAuth {
        /// Platform that rejected authentication
        platform: String,
        /// Provider-reported failure detail
        message: String,
    },

    /// Request rejected before any work began
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a provider error
    pub fn provider(platform: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Provider {
            platform: platform.into(),
            message: msg.into(),
        }
    }

    /// Create a provider authentication error
    pub fn provider_auth(platform: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ProviderAuth {
            platform: platform.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error aborts the whole sync run
    ///
    /// Auth and provider fetch failures are terminal; everything else is
    /// handled per item inside the loop.
    #[must_use]
    pub const fn is_fatal_for_run(&self) -> bool {
        matches!(self, Self::ProviderAuth { .. } | Self::Provider { .. })
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON serialization failed: {err}"))
    }
}
