use crate::error::CaptureError;
use crate::frame::{Frame, FrameSource};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// Frame source that decodes a still image from disk into 8-bit luma
pub struct FileFrameSource {
    path: PathBuf,
    frame_counter: AtomicU64,
}

impl FileFrameSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            frame_counter: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait::async_trait]
impl FrameSource for FileFrameSource {
    async fn acquire_frame(&self) -> Result<Frame, CaptureError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            CaptureError::frame_unavailable(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
            .await
            .map_err(|e| CaptureError::frame_unavailable(format!("Decode task failed: {}", e)))?
            .map_err(|e| {
                CaptureError::frame_unavailable(format!(
                    "Failed to decode {}: {}",
                    self.path.display(),
                    e
                ))
            })?;

        let luma = decoded.to_luma8();
        let (width, height) = luma.dimensions();
        let frame_id = self.frame_counter.fetch_add(1, Ordering::Relaxed);

        debug!(
            "Loaded frame {} from {} ({}x{})",
            frame_id,
            self.path.display(),
            width,
            height
        );

        Ok(Frame::new(frame_id, luma.into_raw(), width, height))
    }

    fn release_frame(&self, frame: Frame) {
        trace!("Released file frame {}", frame.id);
    }

    fn source_name(&self) -> &str {
        "file"
    }
}
