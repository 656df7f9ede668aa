//! In-memory metric storage with JSON snapshot persistence.
//!
//! A read-write lock guards the two maps. With a non-zero store interval a
//! background task snapshots on a ticker until [`MemoryStorage::wait`] drains
//! it; with a zero interval every write snapshots synchronously before
//! returning.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info};

use pulse_core::{Metric, MetricKind, PulseError, Result};

use super::Repository;

/// Configuration of the in-memory backend.
#[derive(Debug, Clone)]
pub struct MemoryStorageConfig {
    /// Interval between background snapshots; zero means synchronous
    /// snapshot on every write.
    pub store_interval: Duration,
    /// Snapshot file path.
    pub store_file: Option<PathBuf>,
    /// Load the snapshot file at start when true.
    pub restore: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Maps {
    gauges: HashMap<String, f64>,
    counters: HashMap<String, i64>,
}

/// Snapshotting map-pair store.
#[derive(Debug)]
pub struct MemoryStorage {
    maps: Arc<RwLock<Maps>>,
    config: MemoryStorageConfig,
    shutdown: watch::Sender<bool>,
    saver: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryStorage {
    /// Create the storage, restoring the snapshot when configured, and start
    /// the background saver when the store interval is non-zero.
    ///
    /// Restore or a background saver require a file path; a missing path is
    /// an invalid configuration.
    pub fn new(config: MemoryStorageConfig) -> Result<Self> {
        if (config.restore || !config.store_interval.is_zero()) && config.store_file.is_none() {
            return Err(PulseError::InvalidConfig {
                reason: "snapshot file path required when restore or store interval is set"
                    .to_string(),
            });
        }

        let maps = if config.restore {
            let path = config.store_file.as_deref().expect("checked above");
            load_snapshot(path)?
        } else {
            Maps::default()
        };

        let maps = Arc::new(RwLock::new(maps));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let saver = if config.store_interval.is_zero() {
            None
        } else {
            Some(spawn_saver(
                Arc::clone(&maps),
                config.store_file.clone().expect("checked above"),
                config.store_interval,
                shutdown_rx,
            ))
        };

        Ok(Self { maps, config, shutdown, saver: Mutex::new(saver) })
    }

    /// Write a snapshot now.
    pub async fn save(&self) -> Result<()> {
        let maps = self.maps.read().await;
        self.save_locked(&maps)
    }

    /// Signal the background saver and wait for it to exit.
    pub async fn wait(&self) {
        let _ = self.shutdown.send(true);

        if let Some(handle) = self.saver.lock().await.take() {
            let _ = handle.await;
        }
    }

    fn save_locked(&self, maps: &Maps) -> Result<()> {
        match &self.config.store_file {
            Some(path) => write_snapshot(maps, path),
            None => Ok(()),
        }
    }

    /// Snapshot synchronously when the interval is zero, holding the lock so
    /// the file never interleaves concurrent writes out of order.
    fn save_on_write(&self, maps: &Maps) -> Result<()> {
        if self.config.store_interval.is_zero() {
            self.save_locked(maps)?;
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for MemoryStorage {
    async fn update_gauge(&self, name: &str, value: f64) -> Result<()> {
        let mut maps = self.maps.write().await;
        maps.gauges.insert(name.to_string(), value);
        self.save_on_write(&maps)
    }

    async fn update_counter(&self, name: &str, delta: i64) -> Result<()> {
        let mut maps = self.maps.write().await;
        *maps.counters.entry(name.to_string()).or_insert(0) += delta;
        self.save_on_write(&maps)
    }

    async fn gauge(&self, name: &str) -> Result<f64> {
        let maps = self.maps.read().await;
        maps.gauges
            .get(name)
            .copied()
            .ok_or_else(|| PulseError::GaugeNotFound { name: name.to_string() })
    }

    async fn counter(&self, name: &str) -> Result<i64> {
        let maps = self.maps.read().await;
        maps.counters
            .get(name)
            .copied()
            .ok_or_else(|| PulseError::CounterNotFound { name: name.to_string() })
    }

    async fn updates(&self, metrics: &[Metric]) -> Result<()> {
        let mut maps = self.maps.write().await;

        for m in metrics {
            match m.kind {
                MetricKind::Counter => {
                    *maps.counters.entry(m.id.clone()).or_insert(0) += m.delta.unwrap_or_default();
                }
                MetricKind::Gauge => {
                    maps.gauges.insert(m.id.clone(), m.value.unwrap_or_default());
                }
            }
        }

        self.save_on_write(&maps)
    }

    async fn gauges(&self) -> Result<Vec<(String, f64)>> {
        let maps = self.maps.read().await;
        Ok(maps.gauges.iter().map(|(k, v)| (k.clone(), *v)).collect())
    }

    async fn counters(&self) -> Result<Vec<(String, i64)>> {
        let maps = self.maps.read().await;
        Ok(maps.counters.iter().map(|(k, v)| (k.clone(), *v)).collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

fn spawn_saver(
    maps: Arc<RwLock<Maps>>,
    path: PathBuf,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let maps = maps.read().await;
                    if let Err(e) = write_snapshot(&maps, &path) {
                        error!(error = %e, "background snapshot failed");
                    } else {
                        debug!(path = %path.display(), "snapshot written");
                    }
                }
                _ = shutdown.changed() => {
                    info!("snapshot saver drained");
                    return;
                }
            }
        }
    })
}

fn write_snapshot(maps: &Maps, path: &Path) -> Result<()> {
    let data = serde_json::to_vec_pretty(maps)?;
    std::fs::write(path, data)
        .map_err(|source| PulseError::Snapshot { path: path.to_path_buf(), source })
}

fn load_snapshot(path: &Path) -> Result<Maps> {
    let content = match std::fs::read(path) {
        Ok(content) => content,
        // A missing file is a fresh start, not an error.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Maps::default()),
        Err(source) => return Err(PulseError::Snapshot { path: path.to_path_buf(), source }),
    };

    Ok(serde_json::from_slice(&content)?)
}
