// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Live entry point.
//!
//! The entry point is a symbolic link that consumers resolve to reach the
//! active slot. It is only ever replaced by renaming a freshly created link
//! over it, so a reader sees either the old target or the new one.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors from entry point operations.
#[derive(Debug, Error)]
pub enum EntryPointError {
    /// The link's parent directory could not be created.
    #[error("failed to create parent directory for {path}: {source}")]
    CreateParent {
        /// Parent directory path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The target path could not be made absolute.
    #[error("failed to resolve target {path}: {source}")]
    Target {
        /// Target path as given.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The temporary link could not be created.
    #[error("failed to create temporary link {path}: {source}")]
    CreateLink {
        /// Temporary link path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The temporary link could not be renamed over the entry point.
    #[error("failed to move link into place at {path}: {source}")]
    Rename {
        /// Entry point path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Atomically repoint `link` at `target`.
///
/// A uniquely named symlink is created next to `link` and renamed over it.
/// If the rename fails the temporary link is removed and `link` is untouched.
///
/// A relative `target` is resolved against the working directory before
/// linking; the link always stores an absolute path.
pub async fn switch(link: &Path, target: &Path) -> Result<(), EntryPointError> {
    let target = std::path::absolute(target).map_err(|source| EntryPointError::Target {
        path: target.to_path_buf(),
        source,
    })?;

    let parent = link
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|source| EntryPointError::CreateParent {
            path: parent.to_path_buf(),
            source,
        })?;

    let tmp_link = temp_link_path(link);
    tokio::fs::symlink(&target, &tmp_link)
        .await
        .map_err(|source| EntryPointError::CreateLink {
            path: tmp_link.clone(),
            source,
        })?;

    if let Err(source) = tokio::fs::rename(&tmp_link, link).await {
        let _ = tokio::fs::remove_file(&tmp_link).await;
        return Err(EntryPointError::Rename {
            path: link.to_path_buf(),
            source,
        });
    }

    debug!(
        link = %link.display(),
        target = %target.display(),
        "Entry point switched"
    );

    Ok(())
}

/// Read the entry point's target, if it is a symlink.
///
/// A relative target is joined onto the link's parent directory, which is
/// where the kernel resolves it from.
pub async fn resolve(link: &Path) -> Option<PathBuf> {
    let target = tokio::fs::read_link(link).await.ok()?;
    if target.is_absolute() {
        return Some(target);
    }
    let parent = link.parent().unwrap_or_else(|| Path::new(""));
    Some(parent.join(target))
}

fn temp_link_path(link: &Path) -> PathBuf {
    let name = link
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "current".to_string());
    link.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
}
