//! Hot reload of the guard configuration file.
//!
//! The parent directory is watched rather than the file itself: editors
//! that save by rename replace the inode, which a file watch would lose.
//! Events for other files in that directory are ignored. A reload is sent
//! only when the file parses, validates and differs from the last config
//! sent (or the one the watcher was started with).

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::GuardConfig;

/// What happened to one reload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// A new config was sent to the receiver.
    Sent,
    /// The file is valid but matches the current config.
    Unchanged,
    /// The file could not be loaded or failed validation.
    Rejected,
    /// The event was not a write to the watched file.
    Ignored,
}

struct ReloadState {
    path: PathBuf,
    current: Mutex<GuardConfig>,
    updates: mpsc::UnboundedSender<GuardConfig>,
}

impl ReloadState {
    fn handle(&self, event: &Event) -> ReloadOutcome {
        if !(event.kind.is_modify() || event.kind.is_create()) {
            return ReloadOutcome::Ignored;
        }
        let touches_file = event
            .paths
            .iter()
            .any(|changed| changed.file_name() == self.path.file_name());
        if !touches_file {
            return ReloadOutcome::Ignored;
        }
        self.reload()
    }

    fn reload(&self) -> ReloadOutcome {
        let config = match load_config(&self.path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    "Config reload rejected, keeping current configuration"
                );
                return ReloadOutcome::Rejected;
            }
        };

        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if *current == config {
            tracing::debug!(path = %self.path.display(), "Config file touched, contents unchanged");
            return ReloadOutcome::Unchanged;
        }
        if self.updates.send(config.clone()).is_err() {
            tracing::debug!("Config receiver dropped, reload not delivered");
            return ReloadOutcome::Ignored;
        }
        tracing::info!(
            path = %self.path.display(),
            max_retries = config.retries.max_retries,
            "Config reloaded"
        );
        *current = config;
        ReloadOutcome::Sent
    }
}

/// Follows one config file and sends each validated change.
pub struct ConfigWatcher {
    state: Arc<ReloadState>,
}

impl ConfigWatcher {
    /// Create a watcher for `path`. `current` is the config already in
    /// use; identical reloads are not sent.
    pub fn new(path: &Path, current: GuardConfig) -> (Self, mpsc::UnboundedReceiver<GuardConfig>) {
        let (updates, rx) = mpsc::unbounded_channel();
        let state = Arc::new(ReloadState {
            path: path.to_path_buf(),
            current: Mutex::new(current),
            updates,
        });
        (Self { state }, rx)
    }

    /// Re-read the file now.
    pub fn reload(&self) -> ReloadOutcome {
        self.state.reload()
    }

    /// Process one filesystem event as the running watcher would.
    pub fn handle_event(&self, event: &Event) -> ReloadOutcome {
        self.state.handle(event)
    }

    /// Start watching. Keep the returned handle alive for as long as
    /// updates are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let state = Arc::clone(&self.state);
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    state.handle(&event);
                }
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default(),
        )?;

        let directory = match self.state.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        watcher.watch(directory, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %self.state.path.display(), "Config watcher started");
        Ok(watcher)
    }
}
