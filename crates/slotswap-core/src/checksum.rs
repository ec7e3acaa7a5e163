// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Checksum manifests and SHA-256 verification.
//!
//! Manifests use the `sha256sum` layout: one `<hex digest>  <file name>` pair
//! per line. Binary-mode markers (`*name`) are accepted.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

use crate::archive::ArchiveKind;
use crate::release::{Release, ReleaseAsset};

/// Errors from checksum verification.
#[derive(Debug, Error)]
pub enum ChecksumError {
    /// Reading the manifest or the file to hash failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file's digest differs from the expected one.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    Mismatch {
        /// Digest listed in the manifest.
        expected: String,
        /// Digest of the downloaded file.
        actual: String,
    },
}

/// Well-known manifest names used when no asset-specific manifest exists.
const GENERIC_MANIFESTS: [&str; 3] = ["checksums.txt", "SHA256SUMS", "sha256sums.txt"];

/// Parse a checksum manifest into `file name -> hex digest`.
pub fn parse_manifest_str(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let digest = parts.next()?;
            let name = parts.next()?;
            Some((
                name.trim_start_matches('*').to_string(),
                digest.to_string(),
            ))
        })
        .collect()
}

/// Read and parse a checksum manifest file.
pub async fn parse_manifest(path: &Path) -> Result<HashMap<String, String>, ChecksumError> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(parse_manifest_str(&content))
}

/// Hex-encoded SHA-256 of a file.
pub async fn sha256_file(path: &Path) -> Result<String, ChecksumError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<String, ChecksumError> {
        let mut file = std::fs::File::open(&path)?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    })
    .await
    .map_err(|e| ChecksumError::Io(std::io::Error::other(e)))?
}

/// Verify a file against an expected hex digest (case-insensitive).
pub async fn verify_file(path: &Path, expected_hex: &str) -> Result<(), ChecksumError> {
    let actual = sha256_file(path).await?;
    if actual.eq_ignore_ascii_case(expected_hex.trim()) {
        Ok(())
    } else {
        Err(ChecksumError::Mismatch {
            expected: expected_hex.to_string(),
            actual,
        })
    }
}

/// Locate the checksum manifest published for `asset`.
///
/// Prefers an asset whose name starts with the primary asset's stem and
/// mentions `checksums`, then falls back to well-known manifest names.
pub fn find_manifest<'a>(release: &'a Release, asset: &ReleaseAsset) -> Option<&'a ReleaseAsset> {
    let stem = ArchiveKind::stem(&asset.name);
    release
        .assets
        .iter()
        .filter(|a| a.name != asset.name)
        .find(|a| a.name.starts_with(stem) && a.name.to_lowercase().contains("checksums"))
        .or_else(|| {
            release
                .assets
                .iter()
                .find(|a| GENERIC_MANIFESTS.contains(&a.name.as_str()))
        })
}
