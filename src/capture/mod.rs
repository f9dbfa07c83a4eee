mod orchestrator;
mod record;

pub use orchestrator::{CaptureOrchestrator, CaptureOrchestratorBuilder};
pub use record::CaptureRecord;
