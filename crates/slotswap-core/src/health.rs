// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP health gate.
//!
//! Polls an endpoint until it answers with a success or redirect status, or
//! until the overall deadline passes.

use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

/// Interval between health probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Timeout for a single probe.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from the health gate.
#[derive(Debug, Error)]
pub enum HealthError {
    /// The endpoint never reported healthy before the deadline.
    #[error("health check {url} did not succeed within {timeout:?}")]
    Timeout {
        /// Probed URL.
        url: String,
        /// Overall deadline.
        timeout: Duration,
    },

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Polls a health endpoint until it succeeds or a deadline passes.
#[derive(Debug, Clone)]
pub struct HealthGate {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    poll_interval: Duration,
}

impl HealthGate {
    /// Create a gate for `url` with an overall `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, HealthError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Override the probe interval.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Probed URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Wait until the endpoint reports healthy.
    pub async fn wait_healthy(&self) -> Result<(), HealthError> {
        info!(url = %self.url, timeout_secs = self.timeout.as_secs(), "Waiting for health check");
        let deadline = Instant::now() + self.timeout;

        loop {
            match self.client.get(&self.url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() || status.is_redirection() {
                        info!(url = %self.url, status = status.as_u16(), "Health check passed");
                        return Ok(());
                    }
                    debug!(url = %self.url, status = status.as_u16(), "Health check not ready");
                }
                Err(e) => {
                    debug!(url = %self.url, error = %e, "Health probe failed");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(HealthError::Timeout {
                    url: self.url.clone(),
                    timeout: self.timeout,
                });
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}
