// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock hook runner for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{HookError, HookRunner};

/// Records every invocation instead of running anything.
#[derive(Default)]
pub struct MockHookRunner {
    invocations: Mutex<Vec<(PathBuf, String)>>,
    /// Commands containing this substring fail with exit code 1.
    pub fail_matching: Option<String>,
}

impl MockHookRunner {
    /// Create a runner where every hook succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a runner where hooks containing `pattern` fail.
    pub fn failing_on(pattern: impl Into<String>) -> Self {
        Self {
            invocations: Mutex::new(Vec::new()),
            fail_matching: Some(pattern.into()),
        }
    }

    /// All `(working_dir, command)` pairs run so far.
    pub fn invocations(&self) -> Vec<(PathBuf, String)> {
        self.invocations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl HookRunner for MockHookRunner {
    fn runner_type(&self) -> &'static str {
        "mock"
    }

    async fn run(&self, working_dir: &Path, command: &str) -> Result<(), HookError> {
        self.invocations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((working_dir.to_path_buf(), command.to_string()));

        match &self.fail_matching {
            Some(pattern) if command.contains(pattern.as_str()) => {
                Err(HookError::ExitCode { exit_code: 1 })
            }
            _ => Ok(()),
        }
    }
}
