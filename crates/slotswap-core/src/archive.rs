// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Release archive extraction.
//!
//! The archive format is chosen from the asset's file name. Assets that are
//! not archives (a bare binary, for instance) are left in place and made
//! executable.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors from archive extraction.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// I/O failure while reading the archive or writing entries.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The zip container is malformed.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// An entry would be written outside the destination directory.
    #[error("archive entry escapes destination: {0}")]
    UnsafePath(String),
}

/// Archive format family, derived from the file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// `.tar.gz` / `.tgz`
    TarGz,
    /// `.zip`
    Zip,
    /// Anything else; not unpacked.
    Raw,
}

impl ArchiveKind {
    /// Detect the archive kind from a file name.
    pub fn from_name(name: &str) -> Self {
        if ends_with_ignore_case(name, ".tar.gz") || ends_with_ignore_case(name, ".tgz") {
            ArchiveKind::TarGz
        } else if ends_with_ignore_case(name, ".zip") {
            ArchiveKind::Zip
        } else {
            ArchiveKind::Raw
        }
    }

    /// File name with this kind's extension removed.
    ///
    /// `app.tar.gz` → `app`, `app.zip` → `app`, `app.bin` → `app`.
    pub fn stem(name: &str) -> &str {
        for ext in [".tar.gz", ".tgz", ".zip"] {
            if ends_with_ignore_case(name, ext) {
                return &name[..name.len() - ext.len()];
            }
        }
        match name.rfind('.') {
            Some(idx) if idx > 0 => &name[..idx],
            _ => name,
        }
    }
}

fn ends_with_ignore_case(name: &str, ext: &str) -> bool {
    name.len() >= ext.len()
        && name
            .get(name.len() - ext.len()..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(ext))
}

impl std::fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveKind::TarGz => write!(f, "tar.gz"),
            ArchiveKind::Zip => write!(f, "zip"),
            ArchiveKind::Raw => write!(f, "raw"),
        }
    }
}

/// Unpack `archive` into `dest`, picking the format from the file name.
///
/// Runs on the blocking thread pool.
pub async fn extract(archive: &Path, dest: &Path) -> Result<ArchiveKind, ArchiveError> {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || extract_blocking(&archive, &dest))
        .await
        .map_err(|e| ArchiveError::Io(std::io::Error::other(e)))?
}

/// Synchronous variant of [`extract`].
pub fn extract_blocking(archive: &Path, dest: &Path) -> Result<ArchiveKind, ArchiveError> {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let kind = ArchiveKind::from_name(&name);

    std::fs::create_dir_all(dest)?;
    match kind {
        ArchiveKind::TarGz => extract_tar_gz(archive, dest)?,
        ArchiveKind::Zip => extract_zip(archive, dest)?,
        ArchiveKind::Raw => mark_executable(archive)?,
    }

    debug!(
        archive = %archive.display(),
        dest = %dest.display(),
        kind = %kind,
        "Archive extracted"
    );
    Ok(kind)
}

fn extract_tar_gz(archive: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let file = File::open(archive)?;
    let decoder: Box<dyn Read> = Box::new(flate2::read::GzDecoder::new(file));
    let mut tar = tar::Archive::new(decoder);

    for entry in tar.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?.display().to_string();
        if !entry.unpack_in(dest)? {
            return Err(ArchiveError::UnsafePath(entry_path));
        }
    }
    Ok(())
}

fn extract_zip(archive: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let file = File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let relative: PathBuf = entry
            .enclosed_name()
            .ok_or_else(|| ArchiveError::UnsafePath(entry.name().to_string()))?;
        let target = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        std::io::copy(&mut entry, &mut out)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&target, std::fs::Permissions::from_mode(mode & 0o777))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
