use crate::error::StoreError;
use crate::storage::sync_dir;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Crash-safe key → integer store.
///
/// A value passed to `set_int` only survives power loss once `commit`
/// has returned successfully. `commit` consumes the staged values whether it
/// succeeds or fails, so after a failed commit reads see the last durable
/// value again.
#[async_trait::async_trait]
pub trait CounterStore: Send + Sync {
    /// Read a value; uncommitted sets made through this handle are visible
    async fn get_int(&self, key: &str) -> Result<Option<i32>, StoreError>;

    /// Stage a value for the next commit
    async fn set_int(&mut self, key: &str, value: i32) -> Result<(), StoreError>;

    /// Make every staged value durable, discarding them on failure
    async fn commit(&mut self) -> Result<(), StoreError>;
}

/// JSON-file counter store committed by write-to-temp, fsync, rename
pub struct FileCounterStore {
    path: PathBuf,
    committed: BTreeMap<String, i32>,
    pending: BTreeMap<String, i32>,
}

impl FileCounterStore {
    /// Open the store, treating a missing file as an empty store
    pub async fn open<P: Into<PathBuf>>(path: P) -> Result<Self, StoreError> {
        let path = path.into();

        let committed = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<BTreeMap<String, i32>>(&bytes).map_err(|e| {
                StoreError::Corrupt {
                    path: path.clone(),
                    details: e.to_string(),
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Counter store {} not found, starting empty", path.display());
                BTreeMap::new()
            }
            Err(e) => return Err(StoreError::Io { path, source: e }),
        };

        debug!(
            "Opened counter store {} with {} keys",
            path.display(),
            committed.len()
        );

        Ok(Self {
            path,
            committed,
            pending: BTreeMap::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait::async_trait]
impl CounterStore for FileCounterStore {
    async fn get_int(&self, key: &str) -> Result<Option<i32>, StoreError> {
        Ok(self
            .pending
            .get(key)
            .or_else(|| self.committed.get(key))
            .copied())
    }

    async fn set_int(&mut self, key: &str, value: i32) -> Result<(), StoreError> {
        self.pending.insert(key.to_string(), value);
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return Ok(());
        }

        let mut merged = self.committed.clone();
        merged.extend(pending.iter().map(|(k, v)| (k.clone(), *v)));

        let contents = serde_json::to_vec_pretty(&merged)
            .map_err(|e| StoreError::Rejected(format!("Failed to serialize counters: {}", e)))?;

        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&parent)
            .await
            .map_err(|e| self.io_error(e))?;

        let temp_path = self.temp_path();
        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| self.io_error(e))?;
        file.write_all(&contents)
            .await
            .map_err(|e| self.io_error(e))?;
        file.sync_all().await.map_err(|e| self.io_error(e))?;
        drop(file);

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        // Persist the rename itself
        sync_dir(&parent).await.map_err(|e| self.io_error(e))?;

        debug!(
            "Committed {} counter(s) to {}",
            pending.len(),
            self.path.display()
        );
        self.committed = merged;
        Ok(())
    }
}
