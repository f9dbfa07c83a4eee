pub mod camera;
pub mod capture;
pub mod config;
pub mod counter;
pub mod descriptor;
pub mod error;
pub mod frame;
pub mod index;
pub mod inventory;
pub mod session;
pub mod storage;

pub use camera::{FrameSourceBuilder, SyntheticFrameSource};
pub use capture::{CaptureOrchestrator, CaptureOrchestratorBuilder, CaptureRecord};
pub use config::{FieldcamConfig, Naming, OverflowPolicy};
pub use counter::{CounterStore, FileCounterStore};
pub use descriptor::{BriefExtractor, Descriptor, DescriptorExtractor};
pub use error::{CaptureError, FieldcamError, Result, StoreError};
pub use frame::{Frame, FrameLease, FrameSource, FrameView};
pub use index::{derive_next_index, CaptureIndex};
pub use inventory::{Inventory, RecordStatus, StoredRecord};
pub use session::CaptureSession;
pub use storage::{is_empty, ArtifactLayout, BulkStorage, DirEntry, FsStorage};
