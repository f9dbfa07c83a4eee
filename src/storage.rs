use crate::{
    config::{Naming, StorageConfig},
    error::CaptureError,
    index::CaptureIndex,
};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, trace};

pub const IMAGE_PREFIX: &str = "file_";
pub const IMAGE_EXTENSION: &str = "jpg";
pub const DESCRIPTOR_PREFIX: &str = "descriptor_";
pub const DESCRIPTOR_EXTENSION: &str = "bin";
pub const SINGLE_SLOT_IMAGE: &str = "picture.jpg";
pub const SINGLE_SLOT_DESCRIPTOR: &str = "descriptor.bin";

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_regular_file: bool,
}

/// File-oriented persistence medium holding image and descriptor files
#[async_trait::async_trait]
pub trait BulkStorage: Send + Sync {
    /// Root directory of the medium
    fn mount_point(&self) -> &Path;

    /// Create or truncate `path` and make `bytes` durable before returning
    async fn write_file(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()>;

    /// Non-recursive listing of `dir`
    async fn list_entries(&self, dir: &Path) -> std::io::Result<Vec<DirEntry>>;
}

/// True iff `dir` holds no regular file. Subdirectories are not descended into.
pub async fn is_empty(storage: &dyn BulkStorage, dir: &Path) -> Result<bool, CaptureError> {
    let entries = storage.list_entries(dir).await.map_err(|e| {
        CaptureError::storage_unavailable(format!("Failed to enumerate {}: {}", dir.display(), e))
    })?;

    let empty = !entries.iter().any(|entry| entry.is_regular_file);
    debug!(
        "Storage at {} has {} entries, empty: {}",
        dir.display(),
        entries.len(),
        empty
    );
    Ok(empty)
}

/// Flush directory entries (creations, renames) of `dir` to the medium
pub(crate) async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    let handle = fs::File::open(dir).await?;
    handle.sync_all().await
}

/// Deterministic artifact names for a capture index
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    mount_point: PathBuf,
    naming: Naming,
}

impl ArtifactLayout {
    pub fn new<P: Into<PathBuf>>(mount_point: P, naming: Naming) -> Self {
        Self {
            mount_point: mount_point.into(),
            naming,
        }
    }

    pub fn naming(&self) -> Naming {
        self.naming
    }

    pub fn image_file_name(&self, index: CaptureIndex) -> String {
        match self.naming {
            Naming::Indexed => format!("{}{}.{}", IMAGE_PREFIX, index, IMAGE_EXTENSION),
            Naming::SingleSlot => SINGLE_SLOT_IMAGE.to_string(),
        }
    }

    pub fn descriptor_file_name(&self, index: CaptureIndex) -> String {
        match self.naming {
            Naming::Indexed => format!("{}{}.{}", DESCRIPTOR_PREFIX, index, DESCRIPTOR_EXTENSION),
            Naming::SingleSlot => SINGLE_SLOT_DESCRIPTOR.to_string(),
        }
    }

    pub fn image_path(&self, index: CaptureIndex) -> PathBuf {
        self.mount_point.join(self.image_file_name(index))
    }

    pub fn descriptor_path(&self, index: CaptureIndex) -> PathBuf {
        self.mount_point.join(self.descriptor_file_name(index))
    }
}

/// Index encoded in an indexed image file name (`file_<n>.jpg`)
pub fn parse_image_name(name: &str) -> Option<CaptureIndex> {
    parse_indexed(name, IMAGE_PREFIX, IMAGE_EXTENSION)
}

/// Index encoded in an indexed descriptor file name (`descriptor_<n>.bin`)
pub fn parse_descriptor_name(name: &str) -> Option<CaptureIndex> {
    parse_indexed(name, DESCRIPTOR_PREFIX, DESCRIPTOR_EXTENSION)
}

fn parse_indexed(name: &str, prefix: &str, extension: &str) -> Option<CaptureIndex> {
    let digits = name
        .strip_prefix(prefix)?
        .strip_suffix(extension)?
        .strip_suffix('.')?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    CaptureIndex::new(digits.parse().ok()?)
}

/// Bulk storage backed by a mounted local filesystem
#[derive(Debug, Clone)]
pub struct FsStorage {
    mount_point: PathBuf,
}

impl FsStorage {
    /// Attach to the medium at `config.mount_point`
    pub async fn mount(config: &StorageConfig) -> Result<Self, CaptureError> {
        let mount_point = PathBuf::from(&config.mount_point);

        match fs::metadata(&mount_point).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(CaptureError::storage_unavailable(format!(
                    "{} is not a directory",
                    mount_point.display()
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && config.create_if_missing => {
                fs::create_dir_all(&mount_point).await.map_err(|e| {
                    CaptureError::storage_unavailable(format!(
                        "Failed to create {}: {}",
                        mount_point.display(),
                        e
                    ))
                })?;
                info!("Created storage directory: {}", mount_point.display());
            }
            Err(e) => {
                return Err(CaptureError::storage_unavailable(format!(
                    "Failed to mount {}: {}",
                    mount_point.display(),
                    e
                )));
            }
        }

        info!("Bulk storage mounted at {}", mount_point.display());
        Ok(Self { mount_point })
    }
}

#[async_trait::async_trait]
impl BulkStorage for FsStorage {
    fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    async fn write_file(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = fs::File::create(path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);

        // A freshly created name is only durable once its directory is synced
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            sync_dir(parent).await?;
        }
        trace!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    async fn list_entries(&self, dir: &Path) -> std::io::Result<Vec<DirEntry>> {
        let mut entries = fs::read_dir(dir).await?;
        let mut listing = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            listing.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_regular_file: file_type.is_file(),
            });
        }

        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage_config(path: &Path, create_if_missing: bool) -> StorageConfig {
        StorageConfig {
            mount_point: path.to_string_lossy().to_string(),
            create_if_missing,
            naming: Naming::Indexed,
        }
    }

    fn idx(value: u32) -> CaptureIndex {
        CaptureIndex::new(value).unwrap()
    }

    #[tokio::test]
    async fn test_mount_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let config = storage_config(&temp_dir.path().join("sdcard"), false);

        let result = FsStorage::mount(&config).await;
        assert!(matches!(result, Err(CaptureError::StorageUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_mount_creates_directory_when_allowed() {
        let temp_dir = TempDir::new().unwrap();
        let mount = temp_dir.path().join("sdcard");
        let config = storage_config(&mount, true);

        let storage = FsStorage::mount(&config).await.unwrap();
        assert_eq!(storage.mount_point(), mount.as_path());
        assert!(mount.is_dir());
    }

    #[tokio::test]
    async fn test_mount_rejects_regular_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("not_a_dir");
        std::fs::write(&path, b"x").unwrap();

        let result = FsStorage::mount(&storage_config(&path, true)).await;
        assert!(matches!(result, Err(CaptureError::StorageUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_emptiness_ignores_directories() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FsStorage::mount(&storage_config(temp_dir.path(), false))
            .await
            .unwrap();

        assert!(is_empty(&storage, temp_dir.path()).await.unwrap());

        std::fs::create_dir(temp_dir.path().join("System Volume Information")).unwrap();
        std::fs::write(
            temp_dir.path().join("System Volume Information").join("x"),
            b"x",
        )
        .unwrap();
        assert!(is_empty(&storage, temp_dir.path()).await.unwrap());

        storage
            .write_file(&temp_dir.path().join("notes.txt"), b"hello")
            .await
            .unwrap();
        assert!(!is_empty(&storage, temp_dir.path()).await.unwrap());
    }

    #[tokio::test]
    async fn test_emptiness_reports_enumeration_failure() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FsStorage::mount(&storage_config(temp_dir.path(), false))
            .await
            .unwrap();

        let result = is_empty(&storage, &temp_dir.path().join("gone")).await;
        assert!(matches!(result, Err(CaptureError::StorageUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_write_file_truncates() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FsStorage::mount(&storage_config(temp_dir.path(), false))
            .await
            .unwrap();
        let path = temp_dir.path().join("file_0.jpg");

        storage.write_file(&path, &[1, 2, 3, 4]).await.unwrap();
        storage.write_file(&path, &[9]).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![9]);
    }

    #[tokio::test]
    async fn test_write_file_syncs_into_existing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FsStorage::mount(&storage_config(temp_dir.path(), false))
            .await
            .unwrap();

        let path = temp_dir.path().join("descriptor_0.bin");
        storage.write_file(&path, &[1, 0, 0, 0]).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 0, 0, 0]);

        sync_dir(temp_dir.path()).await.unwrap();
        assert!(sync_dir(&temp_dir.path().join("gone")).await.is_err());

        let missing_parent = temp_dir.path().join("gone").join("file_0.jpg");
        assert!(storage.write_file(&missing_parent, &[1]).await.is_err());
    }

    #[test]
    fn test_layout_names() {
        let indexed = ArtifactLayout::new("/sdcard", Naming::Indexed);
        assert_eq!(indexed.image_path(idx(0)), PathBuf::from("/sdcard/file_0.jpg"));
        assert_eq!(
            indexed.descriptor_path(idx(12)),
            PathBuf::from("/sdcard/descriptor_12.bin")
        );

        let single = ArtifactLayout::new("/spiffs", Naming::SingleSlot);
        assert_eq!(single.image_path(idx(3)), PathBuf::from("/spiffs/picture.jpg"));
        assert_eq!(
            single.descriptor_path(idx(3)),
            PathBuf::from("/spiffs/descriptor.bin")
        );
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(parse_image_name("file_0.jpg"), Some(idx(0)));
        assert_eq!(parse_image_name("file_42.jpg"), Some(idx(42)));
        assert_eq!(parse_descriptor_name("descriptor_7.bin"), Some(idx(7)));
        assert_eq!(parse_image_name("file_.jpg"), None);
        assert_eq!(parse_image_name("file_-1.jpg"), None);
        assert_eq!(parse_image_name("file_3.png"), None);
        assert_eq!(parse_image_name("file_99999999999.jpg"), None);
        assert_eq!(parse_descriptor_name("descriptor.bin"), None);
    }
}
