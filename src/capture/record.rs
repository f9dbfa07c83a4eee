use crate::index::CaptureIndex;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Result of one complete capture transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureRecord {
    pub index: CaptureIndex,
    pub image_path: PathBuf,
    pub descriptor_path: PathBuf,
    pub image_bytes: usize,
    pub descriptor_len: usize,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl CaptureRecord {
    /// Capture throughput implied by the transaction time
    pub fn frames_per_second(&self) -> f64 {
        if self.elapsed_ms == 0 {
            return f64::INFINITY;
        }
        1000.0 / self.elapsed_ms as f64
    }
}
