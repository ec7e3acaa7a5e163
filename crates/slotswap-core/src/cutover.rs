// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cutover and rollback.
//!
//! Both operations commit in the same order:
//!
//! 1. write the new ledger (temp file + rename)
//! 2. rename a fresh link over the live entry point
//! 3. run the post-deploy hook, best effort
//!
//! The entry point rename is the commit point. If it fails the previous
//! ledger is written back, so the ledger is never behind the entry point.
//! When even that write fails the ledger is ahead of the entry point until
//! the next startup reconciles it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::entry_point::{self, EntryPointError};
use crate::health::{HealthError, HealthGate};
use crate::hooks::HookRunner;
use crate::ledger::{LedgerError, LedgerStore, SlotLedger};
use crate::slot::Slot;
use crate::staging::{StageStatus, StagedRelease};

/// Errors from a cutover.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CutoverError {
    /// The staged release did not finish staging.
    #[error("release {version} in slot {slot} is not ready (status: {status})")]
    NotReady {
        /// Release tag.
        version: String,
        /// Slot it was staged into.
        slot: Slot,
        /// Its status.
        status: StageStatus,
    },

    /// The health gate never passed.
    #[error("health check failed: {0}")]
    HealthCheckTimeout(#[from] HealthError),

    /// The ledger could not be written; nothing changed.
    #[error("failed to persist ledger: {0}")]
    Persistence(LedgerError),

    /// The entry point could not be switched; nothing changed.
    #[error("failed to switch entry point: {0}")]
    EntryPoint(EntryPointError),
}

/// Errors from a rollback.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RollbackError {
    /// The slot to roll back to holds no completed install.
    #[error("cannot roll back to slot {slot} at {path}: {reason}")]
    InvalidRollbackTarget {
        /// Rollback target slot.
        slot: Slot,
        /// Its directory.
        path: PathBuf,
        /// Why the slot is not a valid target.
        reason: &'static str,
    },

    /// The ledger could not be written; nothing changed.
    #[error("failed to persist ledger: {0}")]
    Persistence(LedgerError),

    /// The entry point could not be switched; nothing changed.
    #[error("failed to switch entry point: {0}")]
    EntryPoint(EntryPointError),
}

enum CommitError {
    Persistence(LedgerError),
    EntryPoint(EntryPointError),
}

impl From<CommitError> for CutoverError {
    fn from(e: CommitError) -> Self {
        match e {
            CommitError::Persistence(e) => CutoverError::Persistence(e),
            CommitError::EntryPoint(e) => CutoverError::EntryPoint(e),
        }
    }
}

impl From<CommitError> for RollbackError {
    fn from(e: CommitError) -> Self {
        match e {
            CommitError::Persistence(e) => RollbackError::Persistence(e),
            CommitError::EntryPoint(e) => RollbackError::EntryPoint(e),
        }
    }
}

/// Moves the live entry point between slots and keeps the ledger in step.
pub struct SlotSwitcher {
    entry_point: PathBuf,
    install_dir: PathBuf,
    store: LedgerStore,
    hooks: Arc<dyn HookRunner>,
    health: Option<HealthGate>,
    post_deploy: Option<String>,
}

impl SlotSwitcher {
    /// Create a switcher without health gate or post-deploy hook.
    pub fn new(
        entry_point: impl Into<PathBuf>,
        install_dir: impl Into<PathBuf>,
        store: LedgerStore,
        hooks: Arc<dyn HookRunner>,
    ) -> Self {
        Self {
            entry_point: entry_point.into(),
            install_dir: install_dir.into(),
            store,
            hooks,
            health: None,
            post_deploy: None,
        }
    }

    /// Gate cutovers on `health`.
    pub fn with_health_gate(mut self, health: Option<HealthGate>) -> Self {
        self.health = health;
        self
    }

    /// Run `command` after every successful switch.
    pub fn with_post_deploy(mut self, command: Option<String>) -> Self {
        self.post_deploy = command.filter(|c| !c.trim().is_empty());
        self
    }

    /// Live entry point path.
    pub fn entry_point(&self) -> &Path {
        &self.entry_point
    }

    /// Make `staged` live and return the committed ledger.
    ///
    /// On error the entry point and the ledger are as they were before.
    pub async fn cutover(
        &self,
        staged: &StagedRelease,
        ledger: &SlotLedger,
    ) -> Result<SlotLedger, CutoverError> {
        if !staged.is_ready() {
            return Err(CutoverError::NotReady {
                version: staged.version.clone(),
                slot: staged.slot,
                status: staged.status,
            });
        }

        if let Some(gate) = &self.health {
            gate.wait_healthy().await?;
        }

        let next = ledger.with_deployed(staged.slot, staged.version.clone());
        self.commit(ledger, &next, &staged.slot_dir).await?;

        info!(
            tag = %staged.version,
            slot = %staged.slot,
            previous_slot = %ledger.active_slot,
            previous_version = %ledger.active_version(),
            "Cutover complete"
        );

        self.run_post_deploy().await;
        Ok(next)
    }

    /// Switch back to the inactive slot and return the committed ledger.
    ///
    /// Each call flips slots; nothing is re-staged.
    pub async fn rollback(&self, ledger: &SlotLedger) -> Result<SlotLedger, RollbackError> {
        let target = ledger.inactive_slot();
        let target_dir = target.dir_in(&self.install_dir);

        let is_dir = tokio::fs::metadata(&target_dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(RollbackError::InvalidRollbackTarget {
                slot: target,
                path: target_dir,
                reason: "directory does not exist",
            });
        }

        // A directory without a recorded version is a leftover from a failed staging attempt.
        if ledger.version_of(target).is_empty() {
            return Err(RollbackError::InvalidRollbackTarget {
                slot: target,
                path: target_dir,
                reason: "no release was ever deployed there",
            });
        }

        let next = ledger.with_active(target);
        self.commit(ledger, &next, &target_dir).await?;

        info!(
            slot = %target,
            tag = %next.active_version(),
            from_slot = %ledger.active_slot,
            from_version = %ledger.active_version(),
            "Rollback complete"
        );

        self.run_post_deploy().await;

        if let Some(gate) = &self.health {
            if let Err(e) = gate.wait_healthy().await {
                warn!(slot = %target, error = %e, "Health check failed after rollback");
            }
        }

        Ok(next)
    }

    async fn commit(
        &self,
        previous: &SlotLedger,
        next: &SlotLedger,
        target_dir: &Path,
    ) -> Result<(), CommitError> {
        self.store.save(next).await.map_err(CommitError::Persistence)?;

        if let Err(e) = entry_point::switch(&self.entry_point, target_dir).await {
            if let Err(restore) = self.store.save(previous).await {
                error!(
                    entry_point = %self.entry_point.display(),
                    ledger = %self.store.path().display(),
                    ledger_slot = %next.active_slot,
                    error = %restore,
                    "Ledger ahead of entry point; it will be reconciled on next start"
                );
            }
            return Err(CommitError::EntryPoint(e));
        }

        Ok(())
    }

    async fn run_post_deploy(&self) {
        let Some(command) = &self.post_deploy else {
            return;
        };

        info!(command = %command, "Running post-deploy hook");
        if let Err(e) = self.hooks.run(Path::new("/"), command).await {
            warn!(command = %command, error = %e, "Post-deploy hook failed");
        }
    }
}
