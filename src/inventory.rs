//! Offline reader for the persisted capture layout.
//!
//! Pairs image and descriptor files by index. An image without its
//! descriptor is an incomplete capture, never corruption: the descriptor is
//! always written second.

use crate::{
    descriptor::{Descriptor, WORD_SIZE},
    error::{FieldcamError, Result},
    index::CaptureIndex,
    storage::{parse_descriptor_name, parse_image_name, SINGLE_SLOT_DESCRIPTOR, SINGLE_SLOT_IMAGE},
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Image and a whole-word descriptor are both present
    Complete,
    /// Image present, descriptor missing or torn
    Incomplete,
    /// Descriptor present without its image
    Orphaned,
}

/// Which naming scheme a stored record was found under
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "index")]
pub enum RecordSlot {
    Indexed(CaptureIndex),
    Single,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredRecord {
    pub slot: RecordSlot,
    pub image_path: Option<PathBuf>,
    pub image_bytes: Option<u64>,
    pub descriptor_path: Option<PathBuf>,
    pub descriptor_bytes: Option<u64>,
    pub status: RecordStatus,
}

impl StoredRecord {
    /// Descriptor length inferred from the file size
    pub fn descriptor_len(&self) -> Option<usize> {
        self.descriptor_bytes
            .filter(|bytes| *bytes as usize % WORD_SIZE == 0)
            .map(|bytes| bytes as usize / WORD_SIZE)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Inventory {
    pub mount_point: PathBuf,
    pub records: Vec<StoredRecord>,
    pub unrelated_files: usize,
}

impl Inventory {
    pub fn count(&self, status: RecordStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    /// Highest index with a complete pair on the medium
    pub fn highest_complete(&self) -> Option<CaptureIndex> {
        self.records
            .iter()
            .filter(|r| r.status == RecordStatus::Complete)
            .filter_map(|r| match r.slot {
                RecordSlot::Indexed(index) => Some(index),
                RecordSlot::Single => None,
            })
            .max()
    }

    pub fn find(&self, slot: RecordSlot) -> Option<&StoredRecord> {
        self.records.iter().find(|r| r.slot == slot)
    }
}

#[derive(Default)]
struct PartialRecord {
    image: Option<(PathBuf, u64)>,
    descriptor: Option<(PathBuf, u64)>,
}

/// Enumerate the capture artifacts at `mount_point` (non-recursive)
pub async fn scan(mount_point: &Path) -> Result<Inventory> {
    let mut entries = fs::read_dir(mount_point).await.map_err(|e| {
        FieldcamError::component(
            "inventory",
            format!("Failed to read {}: {}", mount_point.display(), e),
        )
    })?;

    let mut slots: BTreeMap<RecordSlot, PartialRecord> = BTreeMap::new();
    let mut unrelated_files = 0usize;

    while let Some(entry) = entries.next_entry().await.map_err(|e| {
        FieldcamError::component(
            "inventory",
            format!("Failed to read directory entry: {}", e),
        )
    })? {
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        let found = (entry.path(), metadata.len());

        if let Some(index) = parse_image_name(&name) {
            slots.entry(RecordSlot::Indexed(index)).or_default().image = Some(found);
        } else if let Some(index) = parse_descriptor_name(&name) {
            slots.entry(RecordSlot::Indexed(index)).or_default().descriptor = Some(found);
        } else if name == SINGLE_SLOT_IMAGE {
            slots.entry(RecordSlot::Single).or_default().image = Some(found);
        } else if name == SINGLE_SLOT_DESCRIPTOR {
            slots.entry(RecordSlot::Single).or_default().descriptor = Some(found);
        } else {
            debug!("Ignoring unrelated file {}", name);
            unrelated_files += 1;
        }
    }

    let records = slots
        .into_iter()
        .map(|(slot, partial)| {
            let status = match (&partial.image, &partial.descriptor) {
                (Some(_), Some((_, bytes))) if *bytes as usize % WORD_SIZE == 0 => {
                    RecordStatus::Complete
                }
                (Some(_), _) => RecordStatus::Incomplete,
                (None, _) => RecordStatus::Orphaned,
            };
            let (image_path, image_bytes) = partial.image.unzip();
            let (descriptor_path, descriptor_bytes) = partial.descriptor.unzip();
            StoredRecord {
                slot,
                image_path,
                image_bytes,
                descriptor_path,
                descriptor_bytes,
                status,
            }
        })
        .collect();

    Ok(Inventory {
        mount_point: mount_point.to_path_buf(),
        records,
        unrelated_files,
    })
}

/// Decode a descriptor file written as native-endian `i32` words
pub async fn read_descriptor(path: &Path) -> Result<Descriptor> {
    let bytes = fs::read(path).await?;
    Descriptor::from_bytes(&bytes).ok_or_else(|| {
        FieldcamError::component(
            "inventory",
            format!(
                "{} holds {} bytes, not a multiple of the {}-byte word size",
                path.display(),
                bytes.len(),
                WORD_SIZE
            ),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn idx(value: u32) -> CaptureIndex {
        CaptureIndex::new(value).unwrap()
    }

    fn write(dir: &Path, name: &str, bytes: &[u8]) {
        std::fs::write(dir.join(name), bytes).unwrap();
    }

    #[tokio::test]
    async fn test_scan_classifies_records() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let words = Descriptor::from_values(vec![1, 2, 3]).to_bytes();

        write(dir, "file_0.jpg", &[0u8; 64]);
        write(dir, "descriptor_0.bin", &words);
        write(dir, "file_1.jpg", &[0u8; 64]);
        write(dir, "file_2.jpg", &[0u8; 64]);
        write(dir, "descriptor_2.bin", &words[..5]);
        write(dir, "descriptor_3.bin", &words);
        write(dir, "notes.txt", b"hello");
        std::fs::create_dir(dir.join("file_9.jpg")).unwrap();

        let inventory = scan(dir).await.unwrap();

        assert_eq!(inventory.records.len(), 4);
        assert_eq!(inventory.unrelated_files, 1);
        assert_eq!(inventory.count(RecordStatus::Complete), 1);
        assert_eq!(inventory.count(RecordStatus::Incomplete), 2);
        assert_eq!(inventory.count(RecordStatus::Orphaned), 1);
        assert_eq!(inventory.highest_complete(), Some(idx(0)));

        let complete = inventory.find(RecordSlot::Indexed(idx(0))).unwrap();
        assert_eq!(complete.descriptor_len(), Some(3));
        assert_eq!(complete.image_bytes, Some(64));

        let torn = inventory.find(RecordSlot::Indexed(idx(2))).unwrap();
        assert_eq!(torn.status, RecordStatus::Incomplete);
        assert_eq!(torn.descriptor_len(), None);
    }

    #[tokio::test]
    async fn test_scan_orders_by_index() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        for n in [10, 2, 1] {
            write(dir, &format!("file_{}.jpg", n), b"x");
        }

        let inventory = scan(dir).await.unwrap();
        let order: Vec<_> = inventory.records.iter().map(|r| r.slot).collect();
        assert_eq!(
            order,
            vec![
                RecordSlot::Indexed(idx(1)),
                RecordSlot::Indexed(idx(2)),
                RecordSlot::Indexed(idx(10)),
            ]
        );
    }

    #[tokio::test]
    async fn test_scan_single_slot_names() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        write(dir, "picture.jpg", b"pixels");
        write(dir, "descriptor.bin", &Descriptor::from_values(vec![7]).to_bytes());

        let inventory = scan(dir).await.unwrap();
        let record = inventory.find(RecordSlot::Single).unwrap();
        assert_eq!(record.status, RecordStatus::Complete);
        assert_eq!(inventory.highest_complete(), None);
    }

    #[tokio::test]
    async fn test_scan_missing_mount_reports_component() {
        let temp_dir = TempDir::new().unwrap();
        let result = scan(&temp_dir.path().join("absent")).await;
        match result {
            Err(FieldcamError::Component { component, message }) => {
                assert_eq!(component, "inventory");
                assert!(message.contains("absent"));
            }
            other => panic!("Expected component error, got {:?}", other.map(|i| i.records.len())),
        }
    }

    #[tokio::test]
    async fn test_read_descriptor_rejects_partial_words() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let words = Descriptor::from_values(vec![5, -6]).to_bytes();
        write(dir, "descriptor_0.bin", &words);
        write(dir, "descriptor_1.bin", &words[..6]);

        let descriptor = read_descriptor(&dir.join("descriptor_0.bin")).await.unwrap();
        assert_eq!(descriptor.values(), &[5, -6]);

        assert!(read_descriptor(&dir.join("descriptor_1.bin")).await.is_err());
    }
}
