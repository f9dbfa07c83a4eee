use crate::{
    camera::FrameSourceBuilder,
    capture::{CaptureOrchestrator, CaptureOrchestratorBuilder, CaptureRecord},
    config::FieldcamConfig,
    counter::FileCounterStore,
    descriptor::BriefExtractor,
    error::{CaptureError, Result},
    storage::FsStorage,
};
use tracing::info;

/// Everything one boot needs, constructed once and owned explicitly
pub struct CaptureSession {
    config: FieldcamConfig,
    orchestrator: CaptureOrchestrator,
}

impl CaptureSession {
    /// Bring up the camera, the counter store and the bulk storage, in that order
    pub async fn open(config: FieldcamConfig) -> Result<Self> {
        info!("Opening capture session");

        let frames = FrameSourceBuilder::new()
            .config(config.camera.clone())
            .build()?;
        let extractor = BriefExtractor::new(&config.descriptor);

        let counter = FileCounterStore::open(&config.counter.path)
            .await
            .map_err(|e| {
                CaptureError::storage_unavailable(format!("Failed to open counter store: {}", e))
            })?;

        let storage = FsStorage::mount(&config.storage).await?;

        let orchestrator = CaptureOrchestratorBuilder::new()
            .storage(Box::new(storage))
            .counter(Box::new(counter))
            .frame_source(frames)
            .extractor(Box::new(extractor))
            .naming(config.storage.naming)
            .counter_key(config.counter.key.clone())
            .max_len(config.descriptor.max_len)
            .overflow_policy(config.descriptor.overflow_policy)
            .build()?;

        info!(
            "Capture session ready (mount: {}, counter: {}, max descriptor length: {})",
            config.storage.mount_point, config.counter.path, config.descriptor.max_len
        );

        Ok(Self {
            config,
            orchestrator,
        })
    }

    /// Run the single capture transaction of this boot
    pub async fn capture(&mut self) -> std::result::Result<CaptureRecord, CaptureError> {
        self.orchestrator.run_capture().await
    }

    pub fn config(&self) -> &FieldcamConfig {
        &self.config
    }
}
