//! Hot reload of the configuration file.
//!
//! The parent directory is watched rather than the file itself: editors that
//! save by renaming a temp file over the original, and mounted config maps
//! that swap a `..data` symlink, replace the inode a file watch would follow.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::GatekeeperConfig;

/// Reloads the config file on change and forwards configs that differ from
/// the last one seen.
pub struct ConfigWatcher {
    path: PathBuf,
    file_name: OsString,
    current: GatekeeperConfig,
    update_tx: mpsc::UnboundedSender<GatekeeperConfig>,
}

impl ConfigWatcher {
    /// `current` is the config already in effect; reloads equal to it are
    /// dropped.
    pub fn new(
        path: &Path,
        current: GatekeeperConfig,
    ) -> (Self, mpsc::UnboundedReceiver<GatekeeperConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            file_name: path.file_name().map(OsString::from).unwrap_or_default(),
            current,
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching. The returned handle must be kept alive.
    pub fn run(mut self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = watch_dir(&self.path);
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => self.handle_event(&event),
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, dir = ?dir, "Config watcher started");
        Ok(watcher)
    }

    fn handle_event(&mut self, event: &Event) {
        if !(event.kind.is_modify() || event.kind.is_create()) {
            return;
        }
        if !event.paths.iter().any(|p| self.concerns(p)) {
            return;
        }

        let reloaded = match load_config(&self.path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, path = ?self.path, "Config reload rejected, keeping the active config");
                return;
            }
        };

        if reloaded == self.current {
            tracing::debug!(path = ?self.path, "Config file touched without changes");
            return;
        }

        tracing::info!(path = ?self.path, "Config change detected");
        if self.update_tx.send(reloaded.clone()).is_err() {
            tracing::debug!("Config update receiver dropped");
        }
        self.current = reloaded;
    }

    /// The config file itself, or a `..`-prefixed entry from an atomic
    /// symlink swap in the same directory.
    fn concerns(&self, changed: &Path) -> bool {
        match changed.file_name() {
            Some(name) => {
                name == self.file_name.as_os_str()
                    || name.to_string_lossy().starts_with("..")
            }
            None => false,
        }
    }
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
