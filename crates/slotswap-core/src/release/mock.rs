// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock release source for testing.
//!
//! Serves a configurable release and in-memory asset bodies without touching
//! the network, and counts how often it was asked.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{Release, ReleaseAsset, ReleaseError, ReleaseSource};

/// Mock release source for testing.
#[derive(Default)]
pub struct MockReleaseSource {
    release: Mutex<Option<Release>>,
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    latest_calls: AtomicUsize,
    download_calls: AtomicUsize,
}

impl MockReleaseSource {
    /// Create a source with no release published.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a release with the given tag and no assets.
    pub fn with_release(self, tag: &str) -> Self {
        self.publish(tag);
        self
    }

    /// Attach an asset with the given body to the current release.
    pub fn with_asset(self, name: &str, body: impl Into<Vec<u8>>) -> Self {
        self.add_asset(name, body);
        self
    }

    /// Replace the published release tag, keeping the assets.
    pub fn publish(&self, tag: &str) {
        let mut release = self.release.lock().unwrap_or_else(|e| e.into_inner());
        match release.as_mut() {
            Some(r) => r.tag_name = tag.to_string(),
            None => {
                *release = Some(Release {
                    tag_name: tag.to_string(),
                    assets: Vec::new(),
                });
            }
        }
    }

    /// Attach (or replace) an asset.
    pub fn add_asset(&self, name: &str, body: impl Into<Vec<u8>>) {
        let mut release = self.release.lock().unwrap_or_else(|e| e.into_inner());
        let release = release.get_or_insert_with(|| Release {
            tag_name: String::new(),
            assets: Vec::new(),
        });
        if release.asset_named(name).is_none() {
            release.assets.push(ReleaseAsset {
                name: name.to_string(),
                browser_download_url: format!("mock://{}", name),
            });
        }
        self.bodies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), body.into());
    }

    /// Number of `latest` calls so far.
    pub fn latest_calls(&self) -> usize {
        self.latest_calls.load(Ordering::SeqCst)
    }

    /// Number of `download` calls so far.
    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReleaseSource for MockReleaseSource {
    fn source_type(&self) -> &'static str {
        "mock"
    }

    async fn latest(&self, _repo: &str) -> Result<Release, ReleaseError> {
        self.latest_calls.fetch_add(1, Ordering::SeqCst);
        self.release
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(ReleaseError::Http {
                status: 404,
                body: "no release published".to_string(),
            })
    }

    async fn download(&self, asset: &ReleaseAsset, dest: &Path) -> Result<(), ReleaseError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        let body = self
            .bodies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&asset.name)
            .cloned()
            .ok_or_else(|| ReleaseError::AssetNotFound(asset.name.clone()))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let part = dest.with_extension("part");
        tokio::fs::write(&part, body).await?;
        tokio::fs::rename(&part, dest).await?;
        Ok(())
    }
}
