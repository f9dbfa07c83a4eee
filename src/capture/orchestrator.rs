use crate::{
    config::{Naming, OverflowPolicy},
    counter::CounterStore,
    descriptor::{extract_bounded, DescriptorExtractor},
    error::{CaptureError, FieldcamError, Result},
    frame::{FrameLease, FrameSource},
    index::{decode_stored, derive_next_index},
    storage::{self, ArtifactLayout, BulkStorage},
};
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::record::CaptureRecord;

/// Sequences one crash-consistent capture transaction per call.
///
/// Write order is image, then descriptor, then counter commit. A descriptor
/// on the medium therefore implies its image was written first, and a
/// committed index implies both files exist.
pub struct CaptureOrchestrator {
    storage: Box<dyn BulkStorage>,
    counter: Box<dyn CounterStore>,
    frames: Box<dyn FrameSource>,
    extractor: Box<dyn DescriptorExtractor>,
    layout: ArtifactLayout,
    counter_key: String,
    max_len: usize,
    overflow_policy: OverflowPolicy,
}

impl CaptureOrchestrator {
    /// Run one capture transaction.
    ///
    /// Takes `&mut self`, so the counter read/commit sequence cannot
    /// interleave with another capture on the same orchestrator.
    pub async fn run_capture(&mut self) -> std::result::Result<CaptureRecord, CaptureError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("capture", %run_id, index = tracing::field::Empty);

        let result = self.capture_transaction().instrument(span).await;
        match &result {
            Ok(record) => info!(
                "Capture {} complete in {}ms ({:.2} FPS)",
                record.index,
                record.elapsed_ms,
                record.frames_per_second()
            ),
            Err(e) => error!("Capture {} failed: {}", run_id, e),
        }
        result
    }

    async fn capture_transaction(&mut self) -> std::result::Result<CaptureRecord, CaptureError> {
        let started = Instant::now();

        let mount_point = self.storage.mount_point().to_path_buf();
        let storage_empty = storage::is_empty(self.storage.as_ref(), &mount_point).await?;

        let raw = self
            .counter
            .get_int(&self.counter_key)
            .await
            .map_err(|e| {
                CaptureError::storage_unavailable(format!(
                    "Failed to read counter '{}': {}",
                    self.counter_key, e
                ))
            })?;
        if raw.is_none() {
            info!("Counter '{}' is not initialized yet", self.counter_key);
        }
        if storage_empty {
            info!(
                "Storage at {} is empty, resetting capture index to 0",
                mount_point.display()
            );
        }

        let index = derive_next_index(storage_empty, decode_stored(raw))?;
        tracing::Span::current().record("index", index.value());

        // Released on every path out of this scope
        let lease = FrameLease::acquire(self.frames.as_ref()).await?;
        let frame = lease.frame();
        if !frame.validate_size() {
            return Err(CaptureError::frame_unavailable(format!(
                "Frame {} holds {} bytes, {}x{} needs {}",
                frame.id,
                frame.len(),
                frame.width,
                frame.height,
                frame.expected_size()
            )));
        }

        let descriptor = extract_bounded(
            self.extractor.as_ref(),
            frame.view(),
            self.max_len,
            self.overflow_policy,
        )?;

        let image_path = self.layout.image_path(index);
        self.storage
            .write_file(&image_path, &frame.data)
            .await
            .map_err(|source| CaptureError::WriteFailed {
                path: image_path.clone(),
                source,
            })?;
        info!(
            "Image saved to {} ({} bytes)",
            image_path.display(),
            frame.len()
        );

        let descriptor_path = self.layout.descriptor_path(index);
        self.storage
            .write_file(&descriptor_path, &descriptor.to_bytes())
            .await
            .map_err(|source| {
                warn!(
                    "Image {} left without descriptor, capture {} incomplete",
                    image_path.display(),
                    index
                );
                CaptureError::WriteFailed {
                    path: descriptor_path.clone(),
                    source,
                }
            })?;
        info!(
            "Descriptor saved to {} ({} integers)",
            descriptor_path.display(),
            descriptor.len()
        );

        let (width, height, image_bytes, captured_at) =
            (frame.width, frame.height, frame.len(), frame.timestamp);
        drop(lease);

        self.counter
            .set_int(&self.counter_key, index.as_stored())
            .await
            .map_err(|source| CaptureError::CommitFailed {
                index: index.value(),
                source,
            })?;
        self.counter
            .commit()
            .await
            .map_err(|source| CaptureError::CommitFailed {
                index: index.value(),
                source,
            })?;
        debug!("Committed counter '{}' = {}", self.counter_key, index);

        Ok(CaptureRecord {
            index,
            image_path,
            descriptor_path,
            image_bytes,
            descriptor_len: descriptor.len(),
            width,
            height,
            captured_at,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.overflow_policy
    }
}

/// Builder for [`CaptureOrchestrator`]
pub struct CaptureOrchestratorBuilder {
    storage: Option<Box<dyn BulkStorage>>,
    counter: Option<Box<dyn CounterStore>>,
    frames: Option<Box<dyn FrameSource>>,
    extractor: Option<Box<dyn DescriptorExtractor>>,
    naming: Naming,
    counter_key: String,
    max_len: usize,
    overflow_policy: OverflowPolicy,
}

impl CaptureOrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            storage: None,
            counter: None,
            frames: None,
            extractor: None,
            naming: Naming::Indexed,
            counter_key: "file_index".to_string(),
            max_len: 500,
            overflow_policy: OverflowPolicy::Truncate,
        }
    }

    pub fn storage(mut self, storage: Box<dyn BulkStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn counter(mut self, counter: Box<dyn CounterStore>) -> Self {
        self.counter = Some(counter);
        self
    }

    pub fn frame_source(mut self, frames: Box<dyn FrameSource>) -> Self {
        self.frames = Some(frames);
        self
    }

    pub fn extractor(mut self, extractor: Box<dyn DescriptorExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn naming(mut self, naming: Naming) -> Self {
        self.naming = naming;
        self
    }

    pub fn counter_key<S: Into<String>>(mut self, key: S) -> Self {
        self.counter_key = key.into();
        self
    }

    pub fn max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    pub fn build(self) -> Result<CaptureOrchestrator> {
        let storage = self
            .storage
            .ok_or_else(|| FieldcamError::system("Bulk storage must be specified"))?;
        let counter = self
            .counter
            .ok_or_else(|| FieldcamError::system("Counter store must be specified"))?;
        let frames = self
            .frames
            .ok_or_else(|| FieldcamError::system("Frame source must be specified"))?;
        let extractor = self
            .extractor
            .ok_or_else(|| FieldcamError::system("Descriptor extractor must be specified"))?;

        if self.max_len == 0 {
            return Err(FieldcamError::system("Descriptor max_len must be greater than 0"));
        }

        let layout = ArtifactLayout::new(storage.mount_point(), self.naming);

        Ok(CaptureOrchestrator {
            storage,
            counter,
            frames,
            extractor,
            layout,
            counter_key: self.counter_key,
            max_len: self.max_len,
            overflow_policy: self.overflow_policy,
        })
    }
}

impl Default for CaptureOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
