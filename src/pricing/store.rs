use crate::pricing::record::{CacheSnapshot, PricingMap};
use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Process-wide holder of the current pricing snapshot
///
/// Readers get an `Arc` to whichever snapshot was current when they asked
/// and keep using it even if a newer one is published meanwhile. Publishing
/// is a single pointer swap, so a snapshot is never visible half-built.
pub struct CacheStore {
    current: ArcSwapOption<CacheSnapshot>,
    data_path: Option<PathBuf>,
}

impl CacheStore {
    /// An empty, not-ready store without durable persistence
    pub fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
            data_path: None,
        }
    }

    /// An empty, not-ready store that persists to `data_path`
    pub fn with_persistence(data_path: impl Into<PathBuf>) -> Self {
        Self {
            current: ArcSwapOption::empty(),
            data_path: Some(data_path.into()),
        }
    }

    /// Open a store backed by `data_path`, seeding it from the file if present
    ///
    /// Runs synchronously so the store is seeded before any query is served.
    /// A missing or unreadable file leaves the store not ready.
    pub fn open(data_path: impl Into<PathBuf>) -> Self {
        let store = Self::with_persistence(data_path);
        let Some(path) = store.data_path.as_deref() else {
            return store;
        };

        match read_snapshot(path) {
            Ok(Some(snapshot)) => {
                info!(
                    "Loaded {} pricing records from {}",
                    snapshot.size(),
                    path.display()
                );
                store.publish(snapshot);
            }
            Ok(None) => {
                info!("No pricing snapshot at {}, cache starts empty", path.display());
            }
            Err(e) => {
                warn!("Ignoring unreadable pricing snapshot: {}", e);
            }
        }

        store
    }

    /// Most recently published snapshot, or `None` before the first one
    pub fn get_snapshot(&self) -> Option<Arc<CacheSnapshot>> {
        self.current.load_full()
    }

    /// Atomically replace the current snapshot
    pub fn publish(&self, snapshot: CacheSnapshot) -> Arc<CacheSnapshot> {
        let snapshot = Arc::new(snapshot);
        self.current.store(Some(snapshot.clone()));
        snapshot
    }

    pub fn is_ready(&self) -> bool {
        self.current.load().is_some()
    }

    pub fn data_path(&self) -> Option<&Path> {
        self.data_path.as_deref()
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a persisted snapshot; `Ok(None)` when the file does not exist
///
/// The file only holds the mapping, so `generated_at` comes from its
/// modification time.
pub fn read_snapshot(path: &Path) -> Result<Option<CacheSnapshot>, StoreError> {
    let content = match std::fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };

    let mut records: PricingMap = serde_json::from_slice(&content)?;
    for (model_id, record) in records.iter_mut() {
        if record.model_id.is_empty() {
            record.model_id.clone_from(model_id);
        }
    }

    let generated_at = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

    Ok(Some(CacheSnapshot::new(records, generated_at)))
}

/// Overwrite the persisted mapping wholesale
///
/// Writes to a sibling temp file and renames it over the target, so a
/// crash mid-write never leaves a truncated snapshot behind.
pub async fn write_snapshot(path: &Path, records: &PricingMap) -> Result<(), StoreError> {
    let content = serde_json::to_vec_pretty(records)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e))?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, &content)
        .await
        .map_err(|e| StoreError::io(&tmp_path, e))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| StoreError::io(path, e))?;

    Ok(())
}
