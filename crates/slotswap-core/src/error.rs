// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for slotswap-core.

use thiserror::Error;

/// Deployment errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// The ledger could not be read or written.
    #[error("Ledger error: {0}")]
    Ledger(#[from] crate::ledger::LedgerError),

    /// The release feed failed.
    #[error("Release feed error: {0}")]
    Release(#[from] crate::release::ReleaseError),

    /// Staging the new release failed.
    #[error("Staging error: {0}")]
    Stage(#[from] crate::staging::StageError),

    /// The cutover did not complete.
    #[error("Cutover error: {0}")]
    Cutover(#[from] crate::cutover::CutoverError),

    /// The rollback did not complete.
    #[error("Rollback error: {0}")]
    Rollback(#[from] crate::cutover::RollbackError),

    /// The health gate could not be set up.
    #[error("Health check error: {0}")]
    Health(#[from] crate::health::HealthError),
}

/// Result type using slotswap-core Error.
pub type Result<T> = std::result::Result<T, Error>;
