use crate::error::CaptureError;
use crate::frame::{Frame, FrameSource};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{trace, warn};

/// Deterministic test-pattern source used when no sensor is attached
pub struct SyntheticFrameSource {
    resolution: (u32, u32),
    frame_counter: AtomicU64,
    outstanding: AtomicUsize,
}

impl SyntheticFrameSource {
    pub fn new(resolution: (u32, u32)) -> Self {
        Self {
            resolution,
            frame_counter: AtomicU64::new(0),
            outstanding: AtomicUsize::new(0),
        }
    }

    /// Frames handed out and not yet released
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Diagonal gradient shifted by the frame id so successive frames differ
    fn pattern(frame_id: u64, width: u32, height: u32) -> Vec<u8> {
        let shift = (frame_id % 256) as u32;
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                let value = (x.wrapping_mul(3) ^ y.wrapping_mul(5)).wrapping_add(shift) & 0xFF;
                data.push(value as u8);
            }
        }
        data
    }
}

#[async_trait::async_trait]
impl FrameSource for SyntheticFrameSource {
    async fn acquire_frame(&self) -> Result<Frame, CaptureError> {
        let (width, height) = self.resolution;
        if width == 0 || height == 0 {
            return Err(CaptureError::frame_unavailable(
                "synthetic source configured with zero resolution",
            ));
        }

        let frame_id = self.frame_counter.fetch_add(1, Ordering::Relaxed);
        let data = Self::pattern(frame_id, width, height);
        self.outstanding.fetch_add(1, Ordering::SeqCst);

        trace!(
            "Generated synthetic frame {} ({}x{}, {} bytes)",
            frame_id,
            width,
            height,
            data.len()
        );

        Ok(Frame::new(frame_id, data, width, height))
    }

    fn release_frame(&self, frame: Frame) {
        let previous = self
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if previous.is_err() {
            warn!("Synthetic frame {} released more than once", frame.id);
        }
    }

    fn source_name(&self) -> &str {
        "synthetic"
    }
}
