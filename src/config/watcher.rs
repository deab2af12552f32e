//! File watcher that invalidates caches.
//!
//! With `environments.watch` enabled, any change below the config, common or
//! secrets directory clears the parsed-file cache and the compiled
//! templates, so the next request reads the files from disk again.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

/// Watches directories and runs a callback when something changes.
pub struct CacheWatcher {
    paths: Vec<PathBuf>,
    on_change: Arc<dyn Fn() + Send + Sync>,
}

impl CacheWatcher {
    pub fn new(paths: Vec<PathBuf>, on_change: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            paths,
            on_change: Arc::new(on_change),
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Starts watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let on_change = self.on_change.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove() {
                        tracing::debug!(paths = ?event.paths, "File change detected, clearing caches");
                        on_change();
                    }
                }
                Err(e) => tracing::error!(error = %e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        for path in &self.paths {
            watcher.watch(path, RecursiveMode::Recursive)?;
        }

        tracing::info!(paths = ?self.paths, "Cache watcher started");
        Ok(watcher)
    }
}
