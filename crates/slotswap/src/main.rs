// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Slotswap - Blue/Green Deployment Agent
//!
//! Watches a GitHub repository for new releases and deploys them to the
//! inactive of two slots, then atomically switches the live symlink.
//!
//! Commands:
//! - (none): run the scheduler until SIGINT/SIGTERM
//! - `check`: run a single check cycle
//! - `rollback`: switch back to the previous slot
//! - `status`: print the ledger and the live symlink target

mod logging;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, error, info};

use slotswap_core::{
    Config, CycleOutcome, DeployerBuilder, LedgerStore, RollbackOutcome, Slot, entry_point,
};

#[derive(Parser, Debug)]
#[command(name = "slotswap")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "SLOTSWAP_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    /// Check for releases and announce actions without changing anything
    #[arg(long)]
    dry_run: bool,

    /// Run a single check cycle and exit
    #[arg(long)]
    once: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single check cycle and exit
    Check,
    /// Switch back to the previously active slot
    Rollback,
    /// Print the ledger and the live symlink target
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;

    logging::init(&config.logging);
    if let Err(e) = dotenv {
        debug!("No .env file loaded: {}", e);
    }

    match cli.command {
        Some(Command::Status) => status(&config).await,
        Some(Command::Rollback) => rollback(&config, cli.dry_run).await,
        Some(Command::Check) => check(&config, cli.dry_run).await,
        None if cli.once => check(&config, cli.dry_run).await,
        None => serve(&config, cli.dry_run).await,
    }
}

async fn serve(config: &Config, dry_run: bool) -> anyhow::Result<()> {
    info!(
        repo = %config.repo,
        install_dir = %config.install_dir.display(),
        entry_point = %config.current_symlink.display(),
        check_interval_secs = config.check_interval_seconds,
        dry_run = dry_run,
        "Starting slotswap"
    );

    let mut deployer = DeployerBuilder::from_config(config)?
        .dry_run(dry_run)
        .build()
        .await?;

    let shutdown = deployer.shutdown_handle();
    tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(()) => {
                info!("Shutdown signal received, finishing current cycle");
                shutdown.notify_one();
            }
            Err(e) => error!(error = %e, "Failed to listen for shutdown signals"),
        }
    });

    deployer.run().await;

    info!("Slotswap shut down");
    Ok(())
}

async fn check(config: &Config, dry_run: bool) -> anyhow::Result<()> {
    let mut deployer = DeployerBuilder::from_config(config)?
        .dry_run(dry_run)
        .build()
        .await?;

    match deployer.check_and_deploy().await? {
        CycleOutcome::UpToDate { version } => println!("Up to date: {}", version),
        CycleOutcome::DryRun { version, slot } => {
            println!("DRY RUN: would deploy {} to slot {}", version, slot)
        }
        CycleOutcome::Deployed { version, slot } => {
            println!("Deployed {} to slot {}", version, slot)
        }
    }
    Ok(())
}

async fn rollback(config: &Config, dry_run: bool) -> anyhow::Result<()> {
    let mut deployer = DeployerBuilder::from_config(config)?
        .dry_run(dry_run)
        .build()
        .await?;

    match deployer.rollback().await? {
        RollbackOutcome::DryRun { slot } => println!("DRY RUN: would roll back to slot {}", slot),
        RollbackOutcome::RolledBack { slot, version } => {
            println!("Rolled back to slot {} ({})", slot, display_version(&version))
        }
    }
    Ok(())
}

async fn status(config: &Config) -> anyhow::Result<()> {
    let store = LedgerStore::new(config.state_file());
    let ledger = store.load().await?;
    let target = entry_point::resolve(&config.current_symlink).await;

    println!("Active slot:   {}", ledger.active_slot);
    println!("Blue version:  {}", display_version(ledger.version_of(Slot::Blue)));
    println!("Green version: {}", display_version(ledger.version_of(Slot::Green)));
    match target {
        Some(target) => println!(
            "Entry point:   {} -> {}",
            config.current_symlink.display(),
            target.display()
        ),
        None => println!("Entry point:   {} (missing)", config.current_symlink.display()),
    }
    println!("Ledger:        {}", store.path().display());
    Ok(())
}

fn display_version(version: &str) -> &str {
    if version.is_empty() { "(none)" } else { version }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = sigterm.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
