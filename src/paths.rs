//! Application path management for portable and installed modes.
//!
//! - **Portable mode**: a `.portable` marker next to the executable keeps the
//!   config and logs in the executable's directory.
//! - **Installed mode** (default): data lives in the platform data directory
//!   under `T5 Bridge` (e.g. `%APPDATA%\T5 Bridge`, `~/.local/share/T5 Bridge`).

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::AppConfig;

/// Application name used for directories in installed mode
const APP_NAME: &str = "T5 Bridge";

/// Config file name in every mode
const CONFIG_FILE: &str = "t5-bridge.yaml";

/// Application paths for config and logs.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config: PathBuf,
    pub logs_dir: PathBuf,
    /// Whether running in portable mode (config next to exe)
    pub is_portable: bool,
}

impl AppPaths {
    /// Detect the appropriate paths based on environment.
    ///
    /// In debug builds a config file in the current working directory wins,
    /// so `cargo run` picks up the project's copy.
    ///
    /// Called before logging is initialized, so diagnostics go to stderr.
    pub fn detect() -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));

        #[cfg(debug_assertions)]
        {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            if cwd.join(CONFIG_FILE).exists() {
                eprintln!("[paths] Running in DEV mode ({} found in {})", CONFIG_FILE, cwd.display());
                return Self::portable_in(&cwd);
            }
        }

        if exe_dir.join(".portable").exists() {
            #[cfg(debug_assertions)]
            eprintln!("[paths] Running in PORTABLE mode (.portable marker found)");
            return Self::portable_in(&exe_dir);
        }

        let app_data = dirs::data_dir()
            .unwrap_or_else(|| {
                eprintln!("[paths] WARNING: no data directory, falling back to exe dir");
                exe_dir.clone()
            })
            .join(APP_NAME);

        #[cfg(debug_assertions)]
        eprintln!("[paths] Running in INSTALLED mode (data dir: {})", app_data.display());

        Self {
            config: app_data.join(CONFIG_FILE),
            logs_dir: app_data.join("logs"),
            is_portable: false,
        }
    }

    fn portable_in(dir: &Path) -> Self {
        Self {
            config: dir.join(CONFIG_FILE),
            logs_dir: dir.join("logs"),
            is_portable: true,
        }
    }

    /// Get the base directory (for displaying in logs)
    pub fn base_dir(&self) -> PathBuf {
        self.config
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Create the logs and config directories, and write a default config
    /// when none exists yet
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        if !self.logs_dir.exists() {
            debug!("Creating logs directory: {}", self.logs_dir.display());
            std::fs::create_dir_all(&self.logs_dir)
                .with_context(|| format!("Failed to create {}", self.logs_dir.display()))?;
        }

        let base = self.base_dir();
        if !base.exists() {
            debug!("Creating config directory: {}", base.display());
            std::fs::create_dir_all(&base)
                .with_context(|| format!("Failed to create {}", base.display()))?;
        }

        if !self.config.exists() {
            self.write_default_config()?;
        }

        Ok(())
    }

    fn write_default_config(&self) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(&AppConfig::default())
            .context("Failed to serialize default config")?;
        std::fs::write(&self.config, yaml)
            .with_context(|| format!("Failed to write default config to {}", self.config.display()))?;
        info!("Default config written to {}", self.config.display());
        Ok(())
    }
}
