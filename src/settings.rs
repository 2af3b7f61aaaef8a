use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, TsujiError};

/// Shared live view of the runtime settings. Every operation snapshots the
/// settings at its start; a change applies from the next operation on.
#[derive(Clone)]
pub struct SettingsStore {
    inner: Arc<RwLock<Config>>,
    path: Option<PathBuf>,
}

impl SettingsStore {
    /// Open a store backed by a config file. A missing file starts from
    /// defaults and is created by the first persisted change.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let config = if path.exists() {
            Config::from_file(&path)?
        } else {
            info!(
                "no settings file at {}, starting from defaults",
                path.display()
            );
            Config::default()
        };

        Ok(Self {
            inner: Arc::new(RwLock::new(config)),
            path: Some(path),
        })
    }

    /// A store without a backing file; changes live only in memory
    pub fn in_memory(config: Config) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
            path: None,
        }
    }

    pub async fn snapshot(&self) -> Config {
        self.inner.read().await.clone()
    }

    pub async fn apply(&self, config: Config) {
        *self.inner.write().await = config;
    }

    /// Re-read the backing file. On a read or parse failure the in-memory
    /// settings stay as they were.
    pub async fn reload_from_disk(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let config = Config::from_file(path)?;
        self.apply(config).await;
        debug!("settings reloaded from {}", path.display());
        Ok(())
    }

    /// Count one successful translation, returning the new total. The
    /// write-back is best effort; under concurrent editors the persisted
    /// count is an approximation where the last writer wins.
    pub async fn increment_translation_count(&self) -> u64 {
        let mut config = self.inner.write().await;
        config.translate.translation_count += 1;
        let count = config.translate.translation_count;

        if let Some(path) = &self.path {
            if let Err(e) = config.save_to_file(path) {
                warn!("failed to persist translation count: {}", e);
            }
        }

        count
    }
}

/// Watch the backing settings file, reloading on every outside edit and
/// forwarding a change notification. Our own persisted writes echo through
/// here as well; the reload is idempotent so the echo is harmless. The
/// returned watcher must be kept alive.
pub fn watch(store: SettingsStore) -> Result<(RecommendedWatcher, mpsc::UnboundedReceiver<()>)> {
    let Some(path) = store.path.clone() else {
        return Err(TsujiError::Config(
            "settings store has no backing file to watch".to_string(),
        ));
    };

    let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<()>();
    let (change_tx, change_rx) = mpsc::unbounded_channel::<()>();

    let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
        match event {
            Ok(event) if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) => {
                let _ = raw_tx.send(());
            }
            Ok(_) => {}
            Err(e) => warn!("settings watcher error: {}", e),
        }
    })
    .map_err(|e| TsujiError::Config(format!("Failed to create settings watcher: {}", e)))?;

    watcher
        .watch(&path, RecursiveMode::NonRecursive)
        .map_err(|e| TsujiError::Config(format!("Failed to watch settings file: {}", e)))?;

    tokio::spawn(async move {
        while raw_rx.recv().await.is_some() {
            if let Err(e) = store.reload_from_disk().await {
                warn!("settings reload failed, keeping previous values: {}", e);
            }
            if change_tx.send(()).is_err() {
                break;
            }
        }
        debug!("settings watch task finished");
    });

    Ok((watcher, change_rx))
}
