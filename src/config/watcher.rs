//! Configuration file watcher for hot-reload support

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::AppConfig;

/// Time left for editors to finish writing before the file is re-read
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Watches the config file and yields every successfully reloaded config
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    path: PathBuf,
    rx: mpsc::Receiver<AppConfig>,
}

impl ConfigWatcher {
    /// Load the config at `config_path` and start watching it
    ///
    /// # Returns
    /// The watcher and the initially loaded configuration
    pub async fn new(config_path: String) -> Result<(Self, AppConfig)> {
        let (tx, rx) = mpsc::channel(10);

        let initial_config = AppConfig::load(&config_path)
            .await
            .context("Failed to load initial config")?;

        // notify invokes the callback on its own thread, outside the runtime
        let runtime = Handle::current();
        let reload_path = config_path.clone();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| match res {
            Ok(event) if matches!(event.kind, EventKind::Modify(_)) => {
                debug!("Config file modified: {:?}", event.paths);
                runtime.spawn(reload(reload_path.clone(), tx.clone()));
            }
            Ok(_) => {}
            Err(e) => error!("Watch error: {}", e),
        })?;

        watcher
            .watch(Path::new(&config_path), RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config file: {}", config_path))?;

        info!("Config file watcher started for: {}", config_path);

        Ok((
            Self {
                _watcher: watcher,
                path: PathBuf::from(config_path),
                rx,
            },
            initial_config,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the next config update
    ///
    /// Returns `None` once the watcher has been dropped
    pub async fn next_config(&mut self) -> Option<AppConfig> {
        self.rx.recv().await
    }
}

async fn reload(path: String, tx: mpsc::Sender<AppConfig>) {
    tokio::time::sleep(DEBOUNCE).await;

    match AppConfig::load(&path).await {
        Ok(config) => {
            info!("Configuration reloaded successfully");
            if let Err(e) = tx.send(config).await {
                error!("Failed to send config update: {}", e);
            }
        }
        Err(e) => warn!("Failed to reload config (keeping old config): {:#}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_watcher_reloads() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("t5-bridge.yaml");

        fs::write(
            &config_path,
            "display:\n  fov_degrees: 60.0\nsession:\n  poll_interval_secs: 2.0\n",
        )?;

        let (mut watcher, config) = ConfigWatcher::new(config_path.to_string_lossy().to_string()).await?;
        assert_eq!(config.display.fov_degrees, 60.0);
        assert_eq!(config.session.poll_interval_secs, 2.0);
        assert_eq!(watcher.path(), config_path.as_path());

        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::write(&config_path, "display:\n  fov_degrees: 75.0\n")?;

        let reloaded = tokio::time::timeout(Duration::from_secs(2), watcher.next_config()).await?;

        if let Some(reloaded) = reloaded {
            assert_eq!(reloaded.display.fov_degrees, 75.0);
            assert_eq!(reloaded.session.poll_interval_secs, 1.0);
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_config_watcher_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("missing.yaml");
        let result = ConfigWatcher::new(config_path.to_string_lossy().to_string()).await;
        assert!(result.is_err());
    }
}
