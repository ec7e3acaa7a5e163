// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tracing subscriber setup.

use std::fs::OpenOptions;
use std::sync::Mutex;

use slotswap_core::LoggingConfig;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `logging.level`. When `logging.file` is set, output
/// is appended there; if it cannot be opened, logs go to stdout instead.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(default_directives(&config.level))
            .unwrap_or_else(|_| EnvFilter::new(default_directives("info")))
    });

    let Some(path) = &config.file else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return;
    };

    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        Err(e) => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            warn!(
                path = %path.display(),
                error = %e,
                "Failed to open log file, logging to stdout"
            );
        }
    }
}

fn default_directives(level: &str) -> String {
    format!("slotswap={level},slotswap_core={level}")
}
