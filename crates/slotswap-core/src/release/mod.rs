// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Release feed.
//!
//! The deployer only needs two things from a release feed: the newest release
//! descriptor, and a way to download one of its assets to a local path.

pub mod github;
pub mod mock;

pub use github::GitHubReleaseSource;
pub use mock::MockReleaseSource;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors from release feed operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReleaseError {
    /// The feed refused the request because of rate limiting.
    #[error("rate limited by release feed")]
    RateLimited,

    /// The feed answered with an unexpected status.
    #[error("release feed returned {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body (possibly truncated).
        body: String,
    },

    /// The release descriptor could not be decoded.
    #[error("failed to decode release: {0}")]
    Decode(String),

    /// Transport-level failure.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Writing the downloaded asset failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested asset is unknown to the feed.
    #[error("asset not found: {0}")]
    AssetNotFound(String),
}

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    /// File name, e.g. `app-linux-amd64.tar.gz`.
    pub name: String,
    /// Locator used to fetch the asset.
    pub browser_download_url: String,
}

/// The newest release published by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Version tag, e.g. `v1.2.3`.
    pub tag_name: String,
    /// Attached assets.
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    /// First asset whose name ends with `suffix`.
    pub fn find_asset_with_suffix(&self, suffix: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|a| a.name.ends_with(suffix))
    }

    /// Asset with exactly this name.
    pub fn asset_named(&self, name: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|a| a.name == name)
    }
}

/// Source of releases.
///
/// Implementations must make `download` atomic: the destination path either
/// holds the complete asset or does not exist.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Source type identifier (e.g., "github", "mock").
    fn source_type(&self) -> &'static str;

    /// Fetch the newest release of `repo`.
    async fn latest(&self, repo: &str) -> Result<Release, ReleaseError>;

    /// Download `asset` to `dest`.
    async fn download(&self, asset: &ReleaseAsset, dest: &Path) -> Result<(), ReleaseError>;
}
