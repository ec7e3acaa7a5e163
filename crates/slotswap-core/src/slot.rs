// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Environment slots.
//!
//! There are exactly two slots. One is live behind the entry point, the other
//! is the staging target for the next release.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One of the two fixed deployment slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    /// Slot "A".
    #[default]
    Blue,
    /// Slot "B".
    Green,
}

impl Slot {
    /// The complementary slot.
    pub fn other(self) -> Self {
        match self {
            Slot::Blue => Slot::Green,
            Slot::Green => Slot::Blue,
        }
    }

    /// Lowercase name, also used as the slot's directory name.
    pub fn as_str(self) -> &'static str {
        match self {
            Slot::Blue => "blue",
            Slot::Green => "green",
        }
    }

    /// Directory holding this slot's installed release.
    pub fn dir_in(self, install_dir: &Path) -> PathBuf {
        install_dir.join(self.as_str())
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Slot {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blue" => Ok(Slot::Blue),
            "green" => Ok(Slot::Green),
            _ => Err(format!("Unknown slot: {}", s)),
        }
    }
}
