// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Slotswap Core - Blue/Green Deployment Agent
//!
//! This crate watches a release feed and deploys new releases to one of two
//! environment slots, switching a live symlink between them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   latest / download   ┌────────────────────┐
//! │   Deployer   │──────────────────────►│   ReleaseSource    │
//! │  (scheduler) │                       │  (GitHub, mock)    │
//! └──────┬───────┘                       └────────────────────┘
//!        │ stage into inactive slot
//!        ▼
//! ┌──────────────────┐  verify / extract / install hook
//! │ StagingPipeline  │──────────────────────────────────► <install_dir>/<slot>/
//! └──────┬───────────┘
//!        │ ready
//!        ▼
//! ┌──────────────────┐  1. health gate
//! │   SlotSwitcher   │  2. ledger (write-ahead)
//! │ cutover/rollback │  3. entry point rename (commit)
//! └──────────────────┘  4. post-deploy hook
//! ```
//!
//! # Slots
//!
//! | Slot | Directory | Role |
//! |------|-----------|------|
//! | `blue` | `<install_dir>/blue` | Initially active |
//! | `green` | `<install_dir>/green` | Initially the staging target |
//!
//! Exactly one slot is active: the one the entry point resolves to. New
//! releases are always staged into the other one.
//!
//! # Ledger
//!
//! The ledger (`state.yaml` by default) records the active slot and the
//! version installed in each slot:
//!
//! ```yaml
//! active_slot: green
//! blue_version: v1.0.0
//! green_version: v1.1.0
//! ```
//!
//! # Modules
//!
//! - [`slot`]: The two slot identifiers
//! - [`ledger`]: Durable slot/version record
//! - [`entry_point`]: Atomic symlink switching
//! - [`release`]: Release feed trait, GitHub client and mock
//! - [`archive`]: tar.gz / zip extraction
//! - [`checksum`]: SHA-256 manifests and verification
//! - [`hooks`]: Install and post-deploy hook runners
//! - [`health`]: HTTP health gate
//! - [`staging`]: Download, verify, extract, install
//! - [`cutover`]: Cutover and rollback
//! - [`deployer`]: Check cycles and the scheduler loop
//! - [`config`]: YAML configuration
//! - [`error`]: Error types

#![deny(missing_docs)]

pub mod archive;
pub mod checksum;
pub mod config;
pub mod cutover;
pub mod deployer;
pub mod entry_point;
pub mod error;
pub mod health;
pub mod hooks;
pub mod ledger;
pub mod release;
pub mod slot;
pub mod staging;

pub use config::{Config, ConfigError, LoggingConfig};
pub use cutover::{CutoverError, RollbackError, SlotSwitcher};
pub use deployer::{CycleOutcome, DeployError, Deployer, DeployerBuilder, RollbackOutcome};
pub use error::{Error, Result};
pub use health::{HealthError, HealthGate};
pub use hooks::{HookError, HookRunner, MockHookRunner, ShellHookRunner};
pub use ledger::{LedgerError, LedgerStore, SlotLedger};
pub use release::{
    GitHubReleaseSource, MockReleaseSource, Release, ReleaseAsset, ReleaseError, ReleaseSource,
};
pub use slot::Slot;
pub use staging::{StageError, StageStatus, StagedRelease, StagingPipeline};
