//! Configuration file watcher for hot-reload support

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use super::TouchpadConfig;

/// Delay between a modify event and the reload, so partial writes settle
const RELOAD_DEBOUNCE: Duration = Duration::from_millis(100);

/// Config watcher that monitors file changes and yields reloaded configs
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<TouchpadConfig>,
}

impl ConfigWatcher {
    /// Load the config file and start watching it
    pub async fn new(config_path: impl Into<PathBuf>) -> Result<(Self, Arc<TouchpadConfig>)> {
        let config_path = config_path.into();
        let (tx, rx) = mpsc::channel(10);

        let initial_config = TouchpadConfig::load(&config_path)
            .await
            .context("Failed to load initial config")?;
        let initial_config = Arc::new(initial_config);
        let current = Arc::new(Mutex::new((*initial_config).clone()));

        // notify callbacks run on their own OS thread, outside the Tokio context
        let runtime_handle = tokio::runtime::Handle::current();
        let reload_path = config_path.clone();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Modify(_)) {
                        return;
                    }
                    debug!("Config file modified: {:?}", event.paths);

                    let path = reload_path.clone();
                    let tx = tx.clone();
                    let current = Arc::clone(&current);

                    runtime_handle.spawn(async move {
                        tokio::time::sleep(RELOAD_DEBOUNCE).await;

                        // Held across the load so bursts of events reload one at a time
                        let mut current = current.lock().await;

                        match TouchpadConfig::load(&path).await {
                            Ok(new_config) => {
                                let changes = current.changed_settings(&new_config);
                                if changes.is_empty() {
                                    debug!("Config file rewritten without changes, nothing to apply");
                                    return;
                                }

                                for change in &changes {
                                    info!("Config change: {}", change);
                                }
                                *current = new_config.clone();

                                if let Err(e) = tx.send(new_config).await {
                                    error!("Failed to send config update: {}", e);
                                }
                            }
                            Err(e) => {
                                warn!("Failed to reload config (keeping old config): {:#}", e);
                            }
                        }
                    });
                }
                Err(e) => {
                    error!("Watch error: {}", e);
                }
            }
        })?;

        watcher
            .watch(Path::new(&config_path), RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config file: {}", config_path.display()))?;

        info!("Config file watcher started for: {}", config_path.display());

        Ok((
            Self {
                _watcher: watcher,
                rx,
            },
            initial_config,
        ))
    }

    /// Wait for the next config update.
    /// Returns None if the watcher has been closed.
    pub async fn next_config(&mut self) -> Option<TouchpadConfig> {
        self.rx.recv().await
    }
}
