// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Host shell hook runner.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{HookError, HookRunner};

/// Runs hooks through `sh -c`, inheriting stdout and stderr.
#[derive(Debug, Clone, Default)]
pub struct ShellHookRunner {
    timeout: Option<Duration>,
}

impl ShellHookRunner {
    /// Create a runner without a timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill hooks that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl HookRunner for ShellHookRunner {
    fn runner_type(&self) -> &'static str {
        "shell"
    }

    async fn run(&self, working_dir: &Path, command: &str) -> Result<(), HookError> {
        debug!(
            working_dir = %working_dir.display(),
            command = %command,
            "Running hook"
        );

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(HookError::Spawn)?;

        let status = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    warn!(command = %command, timeout_secs = timeout.as_secs(), "Hook timed out, killing it");
                    let _ = child.kill().await;
                    return Err(HookError::Timeout(timeout));
                }
            },
            None => child.wait().await?,
        };

        if status.success() {
            Ok(())
        } else {
            Err(HookError::ExitCode {
                exit_code: status.code().unwrap_or(-1),
            })
        }
    }
}
