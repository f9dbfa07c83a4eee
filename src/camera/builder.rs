use crate::config::{CameraConfig, FrameSourceKind};
use crate::error::CaptureError;
use crate::frame::FrameSource;
use tracing::info;

/// Builder that turns a camera configuration into a boxed frame source
pub struct FrameSourceBuilder {
    config: Option<CameraConfig>,
}

impl FrameSourceBuilder {
    pub fn new() -> Self {
        Self { config: None }
    }

    pub fn config(mut self, config: CameraConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<Box<dyn FrameSource>, CaptureError> {
        let config = self
            .config
            .ok_or_else(|| CaptureError::frame_unavailable("Camera configuration must be specified"))?;

        info!("Building {:?} frame source", config.source);

        match config.source {
            FrameSourceKind::Synthetic => Ok(Box::new(super::SyntheticFrameSource::new(
                config.resolution,
            ))),
            FrameSourceKind::File => Self::build_file_source(config),
            FrameSourceKind::Gstreamer => Self::build_camera_source(config),
        }
    }

    #[cfg(feature = "image_source")]
    fn build_file_source(config: CameraConfig) -> Result<Box<dyn FrameSource>, CaptureError> {
        let path = config
            .file_path
            .ok_or_else(|| CaptureError::frame_unavailable("Camera file_path must be specified"))?;
        Ok(Box::new(super::FileFrameSource::new(path)))
    }

    #[cfg(not(feature = "image_source"))]
    fn build_file_source(_config: CameraConfig) -> Result<Box<dyn FrameSource>, CaptureError> {
        Err(CaptureError::frame_unavailable(
            "File frame source requires the image_source feature",
        ))
    }

    #[cfg(all(target_os = "linux", feature = "camera"))]
    fn build_camera_source(config: CameraConfig) -> Result<Box<dyn FrameSource>, CaptureError> {
        Ok(Box::new(super::CameraInterface::new(config)?))
    }

    #[cfg(not(all(target_os = "linux", feature = "camera")))]
    fn build_camera_source(_config: CameraConfig) -> Result<Box<dyn FrameSource>, CaptureError> {
        Err(CaptureError::frame_unavailable(
            "GStreamer camera is only available on Linux with the camera feature",
        ))
    }
}

impl Default for FrameSourceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
