use crate::config::CameraConfig;
use crate::error::CaptureError;
use crate::frame::{Frame, FrameSource};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, info, trace, warn};

use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;

/// GStreamer V4L2 camera delivering GRAY8 frames one at a time
pub struct CameraInterface {
    config: CameraConfig,
    frame_counter: AtomicU64,
    outstanding: AtomicUsize,
    pipeline: Pipeline,
    appsink: AppSink,
}

impl CameraInterface {
    /// Build the pipeline and start it so the sensor settles before the first pull
    pub fn new(config: CameraConfig) -> Result<Self, CaptureError> {
        info!(
            "Initializing GStreamer camera for device {} ({}x{} GRAY8)",
            config.index, config.resolution.0, config.resolution.1
        );

        gstreamer::init().map_err(|e| {
            CaptureError::frame_unavailable(format!("Failed to initialize GStreamer: {}", e))
        })?;

        let pipeline_desc = Self::build_pipeline_string(&config);
        info!("Creating GStreamer pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| {
                CaptureError::frame_unavailable(format!("Failed to create pipeline: {}", e))
            })?
            .downcast::<Pipeline>()
            .map_err(|_| CaptureError::frame_unavailable("Failed to downcast to Pipeline"))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| CaptureError::frame_unavailable("Pipeline has no appsink"))?
            .downcast::<AppSink>()
            .map_err(|_| CaptureError::frame_unavailable("Failed to downcast to AppSink"))?;

        pipeline.set_state(gstreamer::State::Playing).map_err(|e| {
            CaptureError::frame_unavailable(format!("Failed to start GStreamer pipeline: {}", e))
        })?;

        Ok(Self {
            config,
            frame_counter: AtomicU64::new(0),
            outstanding: AtomicUsize::new(0),
            pipeline,
            appsink,
        })
    }

    fn build_pipeline_string(config: &CameraConfig) -> String {
        let (width, height) = config.resolution;
        format!(
            "v4l2src device=/dev/video{} io-mode=mmap ! \
             videoconvert ! videoscale ! \
             video/x-raw,format=GRAY8,width={},height={} ! \
             appsink name=sink sync=false max-buffers=1 drop=true enable-last-sample=false emit-signals=false",
            config.index, width, height
        )
    }

    /// Copy a mapped GRAY8 buffer into a tightly packed frame
    fn sample_to_frame(&self, sample: gstreamer::Sample) -> Result<Frame, CaptureError> {
        let buffer = sample
            .buffer()
            .ok_or_else(|| CaptureError::frame_unavailable("No buffer in sample"))?;
        let caps = sample
            .caps()
            .ok_or_else(|| CaptureError::frame_unavailable("No caps in sample"))?;
        let video_info = VideoInfo::from_caps(caps).map_err(|e| {
            CaptureError::frame_unavailable(format!("Failed to get video info: {}", e))
        })?;

        let width = video_info.width();
        let height = video_info.height();
        let stride = video_info.stride()[0].max(0) as usize;

        let map = buffer.map_readable().map_err(|e| {
            CaptureError::frame_unavailable(format!("Failed to map buffer: {}", e))
        })?;
        let src = map.as_slice();

        let row = width as usize;
        if width == 0 || height == 0 {
            return Err(CaptureError::frame_unavailable("Sample has zero dimensions"));
        }
        if stride < row || src.len() < stride * (height as usize - 1) + row {
            return Err(CaptureError::frame_unavailable(format!(
                "Buffer of {} bytes too small for {}x{} (stride {})",
                src.len(),
                width,
                height,
                stride
            )));
        }

        let mut data = Vec::with_capacity(row * height as usize);
        for y in 0..height as usize {
            let start = y * stride;
            data.extend_from_slice(&src[start..start + row]);
        }

        let frame_id = self.frame_counter.fetch_add(1, Ordering::Relaxed);
        trace!(
            "Captured GRAY8 frame {} ({}x{}, stride {})",
            frame_id,
            width,
            height,
            stride
        );

        Ok(Frame::new(frame_id, data, width, height))
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl FrameSource for CameraInterface {
    async fn acquire_frame(&self) -> Result<Frame, CaptureError> {
        let appsink = self.appsink.clone();
        let timeout_ms = self.config.frame_timeout_ms;

        let sample = tokio::task::spawn_blocking(move || {
            appsink.try_pull_sample(gstreamer::ClockTime::from_mseconds(timeout_ms))
        })
        .await
        .map_err(|e| CaptureError::frame_unavailable(format!("Capture task failed: {}", e)))?
        .ok_or_else(|| {
            CaptureError::frame_unavailable(format!("No frame within {}ms", timeout_ms))
        })?;

        let frame = self.sample_to_frame(sample)?;
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        Ok(frame)
    }

    fn release_frame(&self, frame: Frame) {
        if self
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_err()
        {
            warn!("Camera frame {} released more than once", frame.id);
        }
    }

    fn source_name(&self) -> &str {
        "gstreamer"
    }
}

impl Drop for CameraInterface {
    fn drop(&mut self) {
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!("Failed to stop GStreamer pipeline: {}", e);
        } else {
            debug!("GStreamer pipeline stopped");
        }
    }
}
