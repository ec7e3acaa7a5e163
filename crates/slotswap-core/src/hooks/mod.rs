// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Hook execution.
//!
//! Install and post-deploy hooks are shell command lines run in a working
//! directory. Runners only execute; deciding whether a failure is fatal is
//! left to the caller.

pub mod mock;
pub mod shell;

pub use mock::MockHookRunner;
pub use shell::ShellHookRunner;

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors from hook execution.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HookError {
    /// The hook could not be started.
    #[error("failed to start hook: {0}")]
    Spawn(#[source] std::io::Error),

    /// The hook exited with a non-zero status.
    #[error("hook exited with code {exit_code}")]
    ExitCode {
        /// Exit code, or -1 when terminated by a signal.
        exit_code: i32,
    },

    /// The hook ran longer than its timeout and was killed.
    #[error("hook timed out after {0:?}")]
    Timeout(Duration),

    /// Waiting for the hook failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for hook runners.
#[async_trait]
pub trait HookRunner: Send + Sync {
    /// Runner type identifier (e.g., "shell", "mock").
    fn runner_type(&self) -> &'static str;

    /// Run `command` with `working_dir` as its current directory.
    async fn run(&self, working_dir: &Path, command: &str) -> Result<(), HookError>;
}
