//! Persistent application settings (`tourplay.json`).
//!
//! Missing fields take their defaults (`#[serde(default)]`), so older files
//! keep loading after new settings are added.

use crate::core::preloader::PreloadOptions;
use crate::core::tour::TourOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SETTINGS_FILE: &str = "tourplay.json";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TourSettings {
    // Synthetic progress
    pub progress_min_ms: u64, // Shortest loading animation (default 3000)
    pub progress_max_ms: u64, // Longest loading animation (default 5000)
    pub tick_interval_ms: u64, // Host loop interval (default 30)

    // Preloading
    pub probe_bytes: u64,      // Bytes requested by the existence probe
    pub asset_timeout_ms: u64, // Per-asset buffering bound (default 15 s)
    pub connect_timeout_ms: u64,
    pub max_wait_ms: u64,      // Loading phase cap, 0 = wait forever
    pub workers_override: u32, // 0 = one thread per asset pair

    // Catalog
    pub catalog_path: Option<PathBuf>, // None = built-in tour

    // REST API Server
    pub api_server_enabled: bool,
    pub api_server_port: u16,
}

impl Default for TourSettings {
    fn default() -> Self {
        Self {
            progress_min_ms: 3000,
            progress_max_ms: 5000,
            tick_interval_ms: 30,
            probe_bytes: 1024,
            asset_timeout_ms: 15_000,
            connect_timeout_ms: 5_000,
            max_wait_ms: 60_000,
            workers_override: 0,
            catalog_path: None,
            api_server_enabled: true,
            api_server_port: 9877,
        }
    }
}

impl TourSettings {
    /// Load from `path`; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let settings = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))?;
        log::info!("Settings loaded from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings: {}", path.display()))?;
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Bound on one preload attempt, also used for HTTP socket reads
    pub fn asset_timeout(&self) -> Duration {
        Duration::from_millis(self.asset_timeout_ms.max(1))
    }

    /// Worker threads for `pairs` preload attempts
    pub fn worker_count(&self, pairs: usize) -> usize {
        match self.workers_override {
            0 => pairs,
            n => n as usize,
        }
    }

    /// Engine options; `fixed_duration` overrides the random range.
    pub fn tour_options(&self, fixed_duration: Option<Duration>) -> TourOptions {
        TourOptions {
            progress_min: Duration::from_millis(self.progress_min_ms),
            progress_max: Duration::from_millis(self.progress_max_ms),
            progress_fixed: fixed_duration,
            max_wait: (self.max_wait_ms > 0).then(|| Duration::from_millis(self.max_wait_ms)),
            preload: PreloadOptions {
                probe_bytes: self.probe_bytes.max(1),
                asset_timeout: self.asset_timeout(),
            },
        }
    }
}
