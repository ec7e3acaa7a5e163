// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Deployment orchestrator.
//!
//! A [`Deployer`] runs deployment check cycles: ask the release feed for the
//! newest release, compare it to the active slot's version, and stage plus
//! cut over to the inactive slot when they differ. Cycles run one at a time
//! on a fixed interval until shutdown is signalled.
//!
//! ```text
//!   start ──► Cycle-Running ──► Idle ──(tick)──► Cycle-Running ...
//!                                 │
//!                             shutdown
//!                                 ▼
//!                            Terminated
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::config::{Config, ConfigError, DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_STATE_FILE};
use crate::cutover::SlotSwitcher;
use crate::health::HealthGate;
use crate::hooks::{HookRunner, ShellHookRunner};
use crate::ledger::{LedgerStore, SlotLedger};
use crate::release::{GitHubReleaseSource, ReleaseSource};
use crate::slot::Slot;
use crate::staging::StagingPipeline;

/// Errors surfaced by the deployer.
pub type DeployError = crate::error::Error;

/// Result of one deployment check cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The active slot already runs the newest release.
    UpToDate {
        /// Active version.
        version: String,
    },
    /// A new release exists but dry-run suppressed the deployment.
    DryRun {
        /// Release tag that would be deployed.
        version: String,
        /// Slot it would be deployed to.
        slot: Slot,
    },
    /// The new release is live.
    Deployed {
        /// Deployed release tag.
        version: String,
        /// Slot now active.
        slot: Slot,
    },
}

/// Result of a rollback request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// Dry-run suppressed the rollback.
    DryRun {
        /// Slot that would become active.
        slot: Slot,
    },
    /// The previous slot is live again.
    RolledBack {
        /// Slot now active.
        slot: Slot,
        /// Version recorded for that slot.
        version: String,
    },
}

/// Builder for creating a [`Deployer`].
pub struct DeployerBuilder {
    repo: Option<String>,
    install_dir: Option<PathBuf>,
    entry_point: Option<PathBuf>,
    state_file: Option<PathBuf>,
    release_source: Option<Arc<dyn ReleaseSource>>,
    hook_runner: Option<Arc<dyn HookRunner>>,
    health_gate: Option<HealthGate>,
    asset_suffix: String,
    install_command: Option<String>,
    post_deploy_command: Option<String>,
    verify_checksums: bool,
    poll_interval: Duration,
    dry_run: bool,
}

impl Default for DeployerBuilder {
    fn default() -> Self {
        Self {
            repo: None,
            install_dir: None,
            entry_point: None,
            state_file: None,
            release_source: None,
            hook_runner: None,
            health_gate: None,
            asset_suffix: String::new(),
            install_command: None,
            post_deploy_command: None,
            verify_checksums: false,
            poll_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            dry_run: false,
        }
    }
}

impl DeployerBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder wired to the GitHub feed, shell hooks and health gate described
    /// by `config`.
    pub fn from_config(config: &Config) -> Result<Self, DeployError> {
        let mut source = GitHubReleaseSource::new(config.github_token.clone())?;
        if let Some(api_url) = &config.github_api_url {
            source = source.with_api_base(api_url.as_str());
        }

        let health_gate = config
            .health_check_url
            .as_ref()
            .map(|url| HealthGate::new(url.as_str(), config.health_check_timeout()))
            .transpose()?;

        Ok(Self::new()
            .repo(config.repo.as_str())
            .install_dir(&config.install_dir)
            .entry_point(&config.current_symlink)
            .state_file(config.state_file())
            .release_source(Arc::new(source))
            .hook_runner(Arc::new(
                ShellHookRunner::new().with_timeout(config.hook_timeout()),
            ))
            .health_gate(health_gate)
            .asset_suffix(config.asset_suffix.as_str())
            .install_command(config.run_command.clone())
            .post_deploy_command(config.post_deploy_script.clone())
            .verify_checksums(config.verify_checksums)
            .poll_interval(config.check_interval()))
    }

    /// Set the release feed repository (required).
    pub fn repo(mut self, repo: impl Into<String>) -> Self {
        self.repo = Some(repo.into());
        self
    }

    /// Set the directory holding the slot directories (required).
    pub fn install_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.install_dir = Some(path.into());
        self
    }

    /// Set the live entry point symlink (required).
    pub fn entry_point(mut self, path: impl Into<PathBuf>) -> Self {
        self.entry_point = Some(path.into());
        self
    }

    /// Set the ledger path.
    ///
    /// Default: `<install_dir>/state.yaml`
    pub fn state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_file = Some(path.into());
        self
    }

    /// Set the release feed (required).
    pub fn release_source(mut self, source: Arc<dyn ReleaseSource>) -> Self {
        self.release_source = Some(source);
        self
    }

    /// Set the hook runner.
    ///
    /// Default: [`ShellHookRunner`] without timeout
    pub fn hook_runner(mut self, runner: Arc<dyn HookRunner>) -> Self {
        self.hook_runner = Some(runner);
        self
    }

    /// Gate cutovers on a health endpoint.
    pub fn health_gate(mut self, gate: Option<HealthGate>) -> Self {
        self.health_gate = gate;
        self
    }

    /// Set the suffix selecting the asset to deploy.
    pub fn asset_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.asset_suffix = suffix.into();
        self
    }

    /// Set the install command run inside the staged slot.
    pub fn install_command(mut self, command: Option<String>) -> Self {
        self.install_command = command;
        self
    }

    /// Set the command run after each switch.
    pub fn post_deploy_command(mut self, command: Option<String>) -> Self {
        self.post_deploy_command = command;
        self
    }

    /// Require checksum verification.
    pub fn verify_checksums(mut self, enabled: bool) -> Self {
        self.verify_checksums = enabled;
        self
    }

    /// Set the interval between check cycles.
    ///
    /// Default: 5 minutes
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Check and announce without mutating anything.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Load and reconcile the ledger, then build the deployer.
    pub async fn build(self) -> Result<Deployer, DeployError> {
        let repo = self.repo.ok_or(ConfigError::Missing("repo"))?;
        let install_dir = self.install_dir.ok_or(ConfigError::Missing("install_dir"))?;
        let entry_point = self
            .entry_point
            .ok_or(ConfigError::Missing("current_symlink"))?;
        let source = self
            .release_source
            .ok_or(ConfigError::Missing("release_source"))?;
        let hooks = self
            .hook_runner
            .unwrap_or_else(|| Arc::new(ShellHookRunner::new()));
        let store = LedgerStore::new(
            self.state_file
                .unwrap_or_else(|| install_dir.join(DEFAULT_STATE_FILE)),
        );

        let loaded = store.load().await?;
        let ledger = if self.dry_run {
            loaded
        } else {
            store.reconcile(loaded, &entry_point, &install_dir).await?
        };

        info!(
            repo = %repo,
            active_slot = %ledger.active_slot,
            active_version = %ledger.active_version(),
            ledger = %store.path().display(),
            source = source.source_type(),
            hooks = hooks.runner_type(),
            health_check = self.health_gate.as_ref().map(HealthGate::url).unwrap_or("none"),
            dry_run = self.dry_run,
            "Deployer initialized"
        );

        let pipeline = StagingPipeline::new(source.clone(), hooks.clone(), self.asset_suffix)
            .with_checksum_verification(self.verify_checksums)
            .with_install_command(self.install_command);
        let switcher = SlotSwitcher::new(&entry_point, &install_dir, store.clone(), hooks)
            .with_health_gate(self.health_gate)
            .with_post_deploy(self.post_deploy_command);

        Ok(Deployer {
            repo,
            install_dir,
            source,
            pipeline,
            switcher,
            ledger,
            poll_interval: self.poll_interval,
            dry_run: self.dry_run,
            shutdown: Arc::new(Notify::new()),
        })
    }
}

/// Drives deployment check cycles and rollbacks.
///
/// Owns the in-memory ledger; only cutover and rollback replace it.
pub struct Deployer {
    repo: String,
    install_dir: PathBuf,
    source: Arc<dyn ReleaseSource>,
    pipeline: StagingPipeline,
    switcher: SlotSwitcher,
    ledger: SlotLedger,
    poll_interval: Duration,
    dry_run: bool,
    shutdown: Arc<Notify>,
}

impl Deployer {
    /// Create a builder.
    pub fn builder() -> DeployerBuilder {
        DeployerBuilder::new()
    }

    /// Current ledger.
    pub fn ledger(&self) -> &SlotLedger {
        &self.ledger
    }

    /// Live entry point path.
    pub fn entry_point(&self) -> &Path {
        self.switcher.entry_point()
    }

    /// Get a handle that can be used to signal shutdown.
    ///
    /// Use `notify_one` so a signal sent mid-cycle is not lost.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Run one deployment check cycle.
    pub async fn check_and_deploy(&mut self) -> Result<CycleOutcome, DeployError> {
        let release = self.source.latest(&self.repo).await?;
        let current = self.ledger.active_version().to_string();

        if release.tag_name == current {
            debug!(tag = %current, slot = %self.ledger.active_slot, "Already up to date");
            return Ok(CycleOutcome::UpToDate { version: current });
        }

        let target = self.ledger.inactive_slot();
        info!(
            tag = %release.tag_name,
            current = %current,
            slot = %target,
            "New release available"
        );

        if self.dry_run {
            let asset = self
                .pipeline
                .select_asset(&release)
                .map(|a| a.name.clone())
                .unwrap_or_else(|_| "<no matching asset>".to_string());
            info!(
                tag = %release.tag_name,
                slot = %target,
                asset = %asset,
                "DRY RUN: Would deploy release"
            );
            return Ok(CycleOutcome::DryRun {
                version: release.tag_name,
                slot: target,
            });
        }

        let slot_dir = target.dir_in(&self.install_dir);
        let staged = self.pipeline.stage(&release, target, &slot_dir).await?;

        match self.switcher.cutover(&staged, &self.ledger).await {
            Ok(next) => {
                self.ledger = next;
                Ok(CycleOutcome::Deployed {
                    version: staged.version,
                    slot: target,
                })
            }
            Err(e) => {
                warn!(
                    tag = %staged.version,
                    slot = %target,
                    error = %e,
                    "Cutover aborted, previous slot keeps serving"
                );
                Err(e.into())
            }
        }
    }

    /// Switch back to the previously active slot.
    pub async fn rollback(&mut self) -> Result<RollbackOutcome, DeployError> {
        let target = self.ledger.inactive_slot();

        if self.dry_run {
            info!(
                from_slot = %self.ledger.active_slot,
                from_version = %self.ledger.active_version(),
                slot = %target,
                tag = %self.ledger.version_of(target),
                "DRY RUN: Would roll back"
            );
            return Ok(RollbackOutcome::DryRun { slot: target });
        }

        let next = self.switcher.rollback(&self.ledger).await?;
        self.ledger = next;
        Ok(RollbackOutcome::RolledBack {
            slot: target,
            version: self.ledger.active_version().to_string(),
        })
    }

    /// Run the scheduler loop.
    ///
    /// Checks immediately, then once per poll interval. Cycle errors are
    /// logged and the loop continues. Exits when the shutdown handle is
    /// notified; a cycle in progress always finishes first.
    pub async fn run(&mut self) {
        info!(
            repo = %self.repo,
            poll_interval_secs = self.poll_interval.as_secs(),
            "Deployer started"
        );

        let shutdown = self.shutdown.clone();
        self.run_cycle().await;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.notified() => {
                    info!("Deployer received shutdown signal");
                    break;
                }

                _ = tokio::time::sleep(self.poll_interval) => {
                    self.run_cycle().await;
                }
            }
        }

        info!("Deployer stopped");
    }

    async fn run_cycle(&mut self) {
        match self.check_and_deploy().await {
            Ok(CycleOutcome::Deployed { version, slot }) => {
                info!(tag = %version, slot = %slot, "Deployment cycle completed");
            }
            Ok(outcome) => {
                debug!(outcome = ?outcome, "Deployment cycle completed");
            }
            Err(e) => {
                error!(
                    active_slot = %self.ledger.active_slot,
                    active_version = %self.ledger.active_version(),
                    error = %e,
                    "Deployment cycle failed"
                );
            }
        }
    }
}
