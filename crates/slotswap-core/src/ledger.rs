// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Slot ledger.
//!
//! The ledger is the durable record of which slot is active and which version
//! each slot last received. It is stored as a small YAML document:
//!
//! ```yaml
//! active_slot: green
//! blue_version: v1.0.0
//! green_version: v1.1.0
//! ```
//!
//! Writes go to a sibling temporary file which is fsynced and renamed over the
//! ledger path, so a reader never observes a partially written ledger.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::entry_point;
use crate::slot::Slot;

/// Errors from ledger persistence.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Reading or writing the ledger file failed.
    #[error("ledger I/O error at {path}: {source}")]
    Io {
        /// Ledger (or temporary) file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The ledger file exists but could not be parsed.
    #[error("failed to parse ledger {path}: {source}")]
    Parse {
        /// Ledger file path.
        path: PathBuf,
        /// Underlying YAML error.
        source: serde_yaml::Error,
    },

    /// The ledger could not be serialized.
    #[error("failed to serialize ledger: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

/// Which slot is live and what each slot holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotLedger {
    /// Slot currently reachable through the entry point.
    pub active_slot: Slot,
    /// Version last installed into the blue slot ("" if never).
    #[serde(default)]
    pub blue_version: String,
    /// Version last installed into the green slot ("" if never).
    #[serde(default)]
    pub green_version: String,
}

impl SlotLedger {
    /// The staging target: complement of the active slot.
    pub fn inactive_slot(&self) -> Slot {
        self.active_slot.other()
    }

    /// Version recorded for a slot.
    pub fn version_of(&self, slot: Slot) -> &str {
        match slot {
            Slot::Blue => &self.blue_version,
            Slot::Green => &self.green_version,
        }
    }

    /// Version served by the active slot.
    pub fn active_version(&self) -> &str {
        self.version_of(self.active_slot)
    }

    /// Ledger after `version` went live in `slot`.
    ///
    /// The other slot's recorded version is left unchanged.
    pub fn with_deployed(&self, slot: Slot, version: impl Into<String>) -> Self {
        let mut next = self.clone();
        match slot {
            Slot::Blue => next.blue_version = version.into(),
            Slot::Green => next.green_version = version.into(),
        }
        next.active_slot = slot;
        next
    }

    /// Ledger with a different active slot and unchanged versions.
    pub fn with_active(&self, slot: Slot) -> Self {
        Self {
            active_slot: slot,
            ..self.clone()
        }
    }
}

/// File-backed ledger storage.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    path: PathBuf,
}

impl LedgerStore {
    /// Create a store for the ledger at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the ledger file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the ledger, or the default ledger if none has been written yet.
    pub async fn load(&self) -> Result<SlotLedger, LedgerError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No ledger file, using default");
                return Ok(SlotLedger::default());
            }
            Err(source) => {
                return Err(LedgerError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_yaml::from_str(&content).map_err(|source| LedgerError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Durably write the ledger, creating parent directories as needed.
    pub async fn save(&self, ledger: &SlotLedger) -> Result<(), LedgerError> {
        let content = serde_yaml::to_string(ledger)?;

        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| LedgerError::Io {
                path: parent.to_path_buf(),
                source,
            })?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "state.yaml".to_string());
        let tmp = self.path.with_file_name(format!(
            ".{}.{}.tmp",
            file_name,
            uuid::Uuid::new_v4().simple()
        ));

        let write_result = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(content.as_bytes()).await?;
            file.sync_all().await
        }
        .await;
        if let Err(source) = write_result {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(LedgerError::Io { path: tmp, source });
        }

        if let Err(source) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(LedgerError::Io {
                path: self.path.clone(),
                source,
            });
        }

        // Persist the rename itself.
        if let Ok(dir) = tokio::fs::File::open(parent).await {
            dir.sync_all().await.ok();
        }

        debug!(
            path = %self.path.display(),
            active_slot = %ledger.active_slot,
            "Ledger saved"
        );
        Ok(())
    }

    /// Align the ledger's active slot with the live entry point.
    ///
    /// The entry point rename is the commit point of a cutover or rollback,
    /// so when it resolves to the other slot the ledger is corrected and
    /// saved. A missing link, or one pointing outside `install_dir`, leaves
    /// the ledger as it is.
    pub async fn reconcile(
        &self,
        ledger: SlotLedger,
        entry_point: &Path,
        install_dir: &Path,
    ) -> Result<SlotLedger, LedgerError> {
        let Some(target) = entry_point::resolve(entry_point).await else {
            debug!(
                entry_point = %entry_point.display(),
                "Entry point does not exist yet, nothing to reconcile"
            );
            return Ok(ledger);
        };

        match slot_for_target(&target, install_dir).await {
            Some(live) if live == ledger.active_slot => Ok(ledger),
            Some(live) => {
                warn!(
                    ledger_slot = %ledger.active_slot,
                    live_slot = %live,
                    live_version = %ledger.version_of(live),
                    "Ledger disagrees with entry point, trusting the entry point"
                );
                let corrected = ledger.with_active(live);
                self.save(&corrected).await?;
                info!(active_slot = %live, "Ledger reconciled");
                Ok(corrected)
            }
            None => {
                warn!(
                    entry_point = %entry_point.display(),
                    target = %target.display(),
                    "Entry point does not resolve to a slot directory"
                );
                Ok(ledger)
            }
        }
    }
}

/// Map a link target back to the slot whose directory it names.
async fn slot_for_target(target: &Path, install_dir: &Path) -> Option<Slot> {
    let absolute_target = std::path::absolute(target).ok()?;
    for slot in [Slot::Blue, Slot::Green] {
        if std::path::absolute(slot.dir_in(install_dir)).ok()? == absolute_target {
            return Some(slot);
        }
    }

    let target = tokio::fs::canonicalize(target).await.ok()?;
    for slot in [Slot::Blue, Slot::Green] {
        if let Ok(dir) = tokio::fs::canonicalize(slot.dir_in(install_dir)).await {
            if dir == target {
                return Some(slot);
            }
        }
    }
    None
}
