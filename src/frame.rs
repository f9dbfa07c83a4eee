use crate::error::CaptureError;
use chrono::{DateTime, Utc};
use tracing::trace;

/// Single-channel 8-bit grayscale frame produced by a [`FrameSource`]
#[derive(Debug, Clone, Default)]
pub struct Frame {
    /// Source-local frame identifier
    pub id: u64,
    /// When the frame was acquired
    pub timestamp: DateTime<Utc>,
    /// Pixel bytes, row-major, one byte per pixel
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl Frame {
    pub fn new(id: u64, data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            id,
            timestamp: Utc::now(),
            data,
            width,
            height,
        }
    }

    /// Length of the pixel buffer in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of bytes the declared dimensions require
    pub fn expected_size(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Check that the buffer covers the declared dimensions
    pub fn validate_size(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() >= self.expected_size()
    }

    /// Borrow the pixels together with their declared dimensions
    pub fn view(&self) -> FrameView<'_> {
        FrameView {
            pixels: &self.data,
            width: self.width,
            height: self.height,
        }
    }
}

/// Borrowed pixel buffer handed to descriptor extractors
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub pixels: &'a [u8],
    pub width: u32,
    pub height: u32,
}

impl FrameView<'_> {
    /// Pixel at (x, y), or `None` outside the buffer
    pub fn pixel(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = y as usize * self.width as usize + x as usize;
        self.pixels.get(offset).copied()
    }
}

/// Anything that can hand out one frame per request
#[async_trait::async_trait]
pub trait FrameSource: Send + Sync {
    /// Acquire one frame, or fail with `FrameUnavailable`
    async fn acquire_frame(&self) -> Result<Frame, CaptureError>;

    /// Give an acquired frame back to the source
    fn release_frame(&self, frame: Frame);

    /// Get the name of this source for logging
    fn source_name(&self) -> &str;
}

/// An acquired frame that goes back to its source when the lease is dropped
pub struct FrameLease<'a> {
    source: &'a dyn FrameSource,
    frame: Frame,
}

impl<'a> FrameLease<'a> {
    pub async fn acquire(source: &'a dyn FrameSource) -> Result<FrameLease<'a>, CaptureError> {
        let frame = source.acquire_frame().await?;
        trace!(
            "Leased frame {} from {} ({}x{}, {} bytes)",
            frame.id,
            source.source_name(),
            frame.width,
            frame.height,
            frame.len()
        );
        Ok(Self { source, frame })
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }
}

impl Drop for FrameLease<'_> {
    fn drop(&mut self) {
        let frame = std::mem::take(&mut self.frame);
        trace!("Returning frame {} to {}", frame.id, self.source.source_name());
        self.source.release_frame(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        acquired: AtomicUsize,
        released: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl FrameSource for CountingSource {
        async fn acquire_frame(&self) -> Result<Frame, CaptureError> {
            let id = self.acquired.fetch_add(1, Ordering::SeqCst) as u64;
            Ok(Frame::new(id, vec![7u8; 16], 4, 4))
        }

        fn release_frame(&self, _frame: Frame) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }

        fn source_name(&self) -> &str {
            "counting"
        }
    }

    #[test]
    fn test_frame_size_validation() {
        let frame = Frame::new(1, vec![0u8; 320 * 240], 320, 240);
        assert_eq!(frame.expected_size(), 320 * 240);
        assert!(frame.validate_size());

        let short = Frame::new(2, vec![0u8; 100], 320, 240);
        assert!(!short.validate_size());

        let degenerate = Frame::new(3, Vec::new(), 0, 0);
        assert!(!degenerate.validate_size());
    }

    #[test]
    fn test_view_pixel_bounds() {
        let frame = Frame::new(1, (0..12).collect(), 4, 3);
        let view = frame.view();
        assert_eq!(view.pixel(0, 0), Some(0));
        assert_eq!(view.pixel(3, 2), Some(11));
        assert_eq!(view.pixel(4, 0), None);
        assert_eq!(view.pixel(0, 3), None);
    }

    #[tokio::test]
    async fn test_lease_releases_on_drop() {
        let source = CountingSource {
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        };

        {
            let lease = FrameLease::acquire(&source).await.unwrap();
            assert_eq!(lease.frame().len(), 16);
            assert_eq!(source.released.load(Ordering::SeqCst), 0);
        }

        assert_eq!(source.acquired.load(Ordering::SeqCst), 1);
        assert_eq!(source.released.load(Ordering::SeqCst), 1);
    }
}
