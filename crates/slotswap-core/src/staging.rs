// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Staging pipeline.
//!
//! Materializes one release into the inactive slot's directory:
//!
//! 1. select the asset matching the configured suffix
//! 2. create the slot directory and download the asset into it
//! 3. verify the asset against its checksum manifest (when enabled)
//! 4. extract the archive into the slot directory
//! 5. run the install hook with the slot directory as working directory
//!
//! Only the inactive slot's directory is ever written. A failure at any step
//! leaves the directory as it was at that point for inspection.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::archive::{self, ArchiveError, ArchiveKind};
use crate::checksum::{self, ChecksumError};
use crate::hooks::{HookError, HookRunner};
use crate::release::{Release, ReleaseAsset, ReleaseError, ReleaseSource};
use crate::slot::Slot;

/// Errors from staging a release.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StageError {
    /// No asset of the release matches the configured suffix.
    #[error("no asset matching suffix '{suffix}' in release {tag}")]
    NoMatchingAsset {
        /// Release tag.
        tag: String,
        /// Configured suffix.
        suffix: String,
    },

    /// Downloading an asset failed.
    #[error("failed to download {asset}: {source}")]
    Download {
        /// Asset name.
        asset: String,
        /// Underlying feed error.
        source: ReleaseError,
    },

    /// Verification was requested but cannot be performed.
    #[error("checksum verification required for {asset} but {reason}")]
    ChecksumPolicyViolation {
        /// Asset name.
        asset: String,
        /// Why verification is impossible.
        reason: String,
    },

    /// The downloaded asset does not match its published digest.
    #[error("integrity check failed for {asset}: expected {expected}, got {actual}")]
    IntegrityFailure {
        /// Asset name.
        asset: String,
        /// Digest from the manifest.
        expected: String,
        /// Digest of the downloaded file.
        actual: String,
    },

    /// Reading the manifest or hashing the asset failed.
    #[error("checksum error: {0}")]
    Checksum(ChecksumError),

    /// The archive could not be unpacked.
    #[error("failed to extract {asset}: {source}")]
    Extract {
        /// Asset name.
        asset: String,
        /// Underlying archive error.
        source: ArchiveError,
    },

    /// The install hook failed.
    #[error("install hook '{command}' failed: {source}")]
    InstallHookFailure {
        /// Configured install command.
        command: String,
        /// Underlying hook error.
        source: HookError,
    },

    /// Preparing the slot directory failed.
    #[error("failed to prepare slot directory {path}: {source}")]
    Io {
        /// Slot directory.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Progress of a staging attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// Asset download in progress.
    Downloading,
    /// Checksum verification in progress.
    Verifying,
    /// Archive extraction in progress.
    Extracting,
    /// Install hook running.
    Installing,
    /// Fully installed; eligible for cutover.
    Ready,
    /// A step failed; never eligible for cutover.
    Failed,
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StageStatus::Downloading => "downloading",
            StageStatus::Verifying => "verifying",
            StageStatus::Extracting => "extracting",
            StageStatus::Installing => "installing",
            StageStatus::Ready => "ready",
            StageStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// A release being installed into a slot.
#[derive(Debug, Clone)]
pub struct StagedRelease {
    /// Release tag.
    pub version: String,
    /// Target slot.
    pub slot: Slot,
    /// Target slot directory.
    pub slot_dir: PathBuf,
    /// Selected asset.
    pub asset: ReleaseAsset,
    /// Local path of the downloaded asset.
    pub asset_path: PathBuf,
    /// Current status.
    pub status: StageStatus,
    /// When staging started.
    pub staged_at: DateTime<Utc>,
}

impl StagedRelease {
    fn advance(&mut self, status: StageStatus) {
        debug!(
            tag = %self.version,
            slot = %self.slot,
            from = %self.status,
            to = %status,
            "Staging status changed"
        );
        self.status = status;
    }

    /// Whether the release may be cut over to.
    pub fn is_ready(&self) -> bool {
        self.status == StageStatus::Ready
    }
}

/// Downloads, verifies, extracts and installs releases into a slot directory.
pub struct StagingPipeline {
    source: Arc<dyn ReleaseSource>,
    hooks: Arc<dyn HookRunner>,
    asset_suffix: String,
    verify_checksums: bool,
    install_command: Option<String>,
}

impl StagingPipeline {
    /// Create a pipeline that selects assets ending with `asset_suffix`.
    pub fn new(
        source: Arc<dyn ReleaseSource>,
        hooks: Arc<dyn HookRunner>,
        asset_suffix: impl Into<String>,
    ) -> Self {
        Self {
            source,
            hooks,
            asset_suffix: asset_suffix.into(),
            verify_checksums: false,
            install_command: None,
        }
    }

    /// Require checksum verification.
    pub fn with_checksum_verification(mut self, enabled: bool) -> Self {
        self.verify_checksums = enabled;
        self
    }

    /// Run `command` in the slot directory after extraction.
    pub fn with_install_command(mut self, command: Option<String>) -> Self {
        self.install_command = command.filter(|c| !c.trim().is_empty());
        self
    }

    /// Select the asset this pipeline would stage from `release`.
    pub fn select_asset<'a>(&self, release: &'a Release) -> Result<&'a ReleaseAsset, StageError> {
        release
            .find_asset_with_suffix(&self.asset_suffix)
            .ok_or_else(|| StageError::NoMatchingAsset {
                tag: release.tag_name.clone(),
                suffix: self.asset_suffix.clone(),
            })
    }

    /// Stage `release` into `slot_dir`, the directory of the inactive `slot`.
    pub async fn stage(
        &self,
        release: &Release,
        slot: Slot,
        slot_dir: &Path,
    ) -> Result<StagedRelease, StageError> {
        let asset = self.select_asset(release)?.clone();

        tokio::fs::create_dir_all(slot_dir)
            .await
            .map_err(|source| StageError::Io {
                path: slot_dir.to_path_buf(),
                source,
            })?;

        let mut staged = StagedRelease {
            version: release.tag_name.clone(),
            slot,
            slot_dir: slot_dir.to_path_buf(),
            asset_path: slot_dir.join(&asset.name),
            asset,
            status: StageStatus::Downloading,
            staged_at: Utc::now(),
        };

        info!(
            tag = %staged.version,
            slot = %slot,
            asset = %staged.asset.name,
            path = %slot_dir.display(),
            "Staging release"
        );

        match self.run_steps(release, &mut staged).await {
            Ok(()) => {
                staged.advance(StageStatus::Ready);
                info!(tag = %staged.version, slot = %slot, "Release staged");
                Ok(staged)
            }
            Err(e) => {
                let failed_at = staged.status;
                staged.advance(StageStatus::Failed);
                warn!(
                    tag = %staged.version,
                    slot = %slot,
                    step = %failed_at,
                    error = %e,
                    "Staging failed"
                );
                Err(e)
            }
        }
    }

    async fn run_steps(&self, release: &Release, staged: &mut StagedRelease) -> Result<(), StageError> {
        self.source
            .download(&staged.asset, &staged.asset_path)
            .await
            .map_err(|source| StageError::Download {
                asset: staged.asset.name.clone(),
                source,
            })?;

        if self.verify_checksums {
            staged.advance(StageStatus::Verifying);
            self.verify(release, staged).await?;
        }

        staged.advance(StageStatus::Extracting);
        let kind = archive::extract(&staged.asset_path, &staged.slot_dir)
            .await
            .map_err(|source| StageError::Extract {
                asset: staged.asset.name.clone(),
                source,
            })?;
        if kind == ArchiveKind::Raw {
            debug!(asset = %staged.asset.name, "Asset is not an archive, kept as-is");
        }

        if let Some(command) = &self.install_command {
            staged.advance(StageStatus::Installing);
            info!(tag = %staged.version, slot = %staged.slot, command = %command, "Running install hook");
            self.hooks
                .run(&staged.slot_dir, command)
                .await
                .map_err(|source| StageError::InstallHookFailure {
                    command: command.clone(),
                    source,
                })?;
        }

        Ok(())
    }

    async fn verify(&self, release: &Release, staged: &StagedRelease) -> Result<(), StageError> {
        let asset_name = staged.asset.name.clone();
        let manifest = checksum::find_manifest(release, &staged.asset).ok_or_else(|| {
            StageError::ChecksumPolicyViolation {
                asset: asset_name.clone(),
                reason: "the release has no checksum manifest".to_string(),
            }
        })?;

        let manifest_path = staged.slot_dir.join(&manifest.name);
        self.source
            .download(manifest, &manifest_path)
            .await
            .map_err(|source| StageError::Download {
                asset: manifest.name.clone(),
                source,
            })?;

        let digests = checksum::parse_manifest(&manifest_path)
            .await
            .map_err(StageError::Checksum)?;
        let expected = digests.get(&asset_name).ok_or_else(|| {
            StageError::ChecksumPolicyViolation {
                asset: asset_name.clone(),
                reason: format!("{} has no entry for it", manifest.name),
            }
        })?;

        match checksum::verify_file(&staged.asset_path, expected).await {
            Ok(()) => {
                info!(asset = %asset_name, manifest = %manifest.name, "Checksum verified");
                Ok(())
            }
            Err(ChecksumError::Mismatch { expected, actual }) => Err(StageError::IntegrityFailure {
                asset: asset_name,
                expected,
                actual,
            }),
            Err(e) => Err(StageError::Checksum(e)),
        }
    }
}
