// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for slotswap-core integration tests.
//!
//! Provides TestContext with a temporary install directory, a mock release
//! feed, a recording hook runner, and fixture archive builders.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tempfile::TempDir;

use slotswap_core::{
    Deployer, DeployerBuilder, LedgerStore, MockHookRunner, MockReleaseSource, Slot, SlotLedger,
};

/// Test context holding a temporary deployment root.
pub struct TestContext {
    pub install_dir: PathBuf,
    pub link: PathBuf,
    pub state_file: PathBuf,
    pub source: Arc<MockReleaseSource>,
    pub hooks: Arc<MockHookRunner>,
    _temp_dir: TempDir,
}

impl TestContext {
    /// Create a context with an empty feed and hooks that always succeed.
    pub fn new() -> Self {
        Self::with_hooks(MockHookRunner::new())
    }

    /// Create a context with a specific hook runner.
    pub fn with_hooks(hooks: MockHookRunner) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let install_dir = temp_dir.path().join("app");
        Self {
            link: temp_dir.path().join("current"),
            state_file: install_dir.join("state.yaml"),
            install_dir,
            source: Arc::new(MockReleaseSource::new()),
            hooks: Arc::new(hooks),
            _temp_dir: temp_dir,
        }
    }

    /// Builder wired to this context's feed, hooks and paths.
    pub fn builder(&self) -> DeployerBuilder {
        Deployer::builder()
            .repo("owner/app")
            .install_dir(&self.install_dir)
            .entry_point(&self.link)
            .state_file(&self.state_file)
            .release_source(self.source.clone())
            .hook_runner(self.hooks.clone())
            .asset_suffix(".tar.gz")
    }

    /// Build a deployer with default settings.
    pub async fn deployer(&self) -> Deployer {
        self.builder().build().await.expect("Failed to build deployer")
    }

    pub fn store(&self) -> LedgerStore {
        LedgerStore::new(&self.state_file)
    }

    pub fn slot_dir(&self, slot: Slot) -> PathBuf {
        slot.dir_in(&self.install_dir)
    }

    /// Simulate an existing install: populate `slot`, point the link at it,
    /// and write the ledger.
    pub async fn seed(&self, ledger: &SlotLedger) {
        for slot in [Slot::Blue, Slot::Green] {
            if !ledger.version_of(slot).is_empty() {
                let dir = self.slot_dir(slot);
                std::fs::create_dir_all(&dir).unwrap();
                std::fs::write(dir.join("VERSION"), ledger.version_of(slot)).unwrap();
            }
        }
        slotswap_core::entry_point::switch(&self.link, &self.slot_dir(ledger.active_slot))
            .await
            .unwrap();
        self.store().save(ledger).await.unwrap();
    }

    /// Raw ledger bytes, for byte-identical comparisons.
    pub fn ledger_bytes(&self) -> Option<Vec<u8>> {
        std::fs::read(&self.state_file).ok()
    }

    /// Current entry point target.
    pub fn link_target(&self) -> Option<PathBuf> {
        std::fs::read_link(&self.link).ok()
    }
}

/// Ledger with `blue` active.
pub fn blue_ledger(blue: &str, green: &str) -> SlotLedger {
    SlotLedger {
        active_slot: Slot::Blue,
        blue_version: blue.to_string(),
        green_version: green.to_string(),
    }
}

/// Build a `.tar.gz` holding the given files.
pub fn tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, name, data.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Build a `.zip` holding the given files.
pub fn zip(files: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, data) in files {
        zip.start_file(*name, options).unwrap();
        zip.write_all(data.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// `sha256sum`-style manifest line.
pub fn manifest_line(name: &str, data: &[u8]) -> String {
    format!("{}  {}\n", sha256_hex(data), name)
}

pub fn read_to_string(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}
