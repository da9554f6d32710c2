//! Config and data file locations.
//!
//! Resolution order for both directories:
//! 1. `--config-dir` CLI argument
//! 2. `TOURPLAY_CONFIG_DIR` environment variable
//! 3. Current directory, if it already holds tourplay files
//! 4. Platform directory from dirs-next
//!
//! Platform paths:
//! - Linux: `~/.config/tourplay` (config), `~/.local/share/tourplay` (data)
//! - macOS: `~/Library/Application Support/tourplay`
//! - Windows: `%APPDATA%\tourplay`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "tourplay";

/// Files whose presence in the working directory makes it the app directory
const LOCAL_MARKERS: &[&str] = &["tourplay.json", "catalog.json", "tourplay.log"];

/// Configuration for overriding default application paths
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    /// Custom config directory (from CLI or ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Priority: CLI args → ENV var (TOURPLAY_CONFIG_DIR) → None (use defaults)
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| std::env::var("TOURPLAY_CONFIG_DIR").ok().map(PathBuf::from));
        Self { config_dir }
    }
}

/// Path to a configuration file (settings, catalog)
pub fn config_file(name: &str, config: &PathConfig) -> PathBuf {
    resolve_dir(config, dirs_next::config_dir()).join(name)
}

/// Path to a data file (logs)
pub fn data_file(name: &str, config: &PathConfig) -> PathBuf {
    resolve_dir(config, dirs_next::data_dir()).join(name)
}

/// Create config and data directories if missing.
pub fn ensure_dirs(config: &PathConfig) -> Result<()> {
    let config_dir = resolve_dir(config, dirs_next::config_dir());
    let data_dir = resolve_dir(config, dirs_next::data_dir());

    for dir in [&config_dir, &data_dir] {
        if !dir.exists() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
    }
    Ok(())
}

fn has_local_files(dir: &Path) -> bool {
    LOCAL_MARKERS.iter().any(|f| dir.join(f).exists())
}

fn resolve_dir(config: &PathConfig, platform: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }

    if let Ok(current) = std::env::current_dir()
        && has_local_files(&current)
    {
        return current;
    }

    platform
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
}
