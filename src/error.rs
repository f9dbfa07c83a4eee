use std::path::PathBuf;
use thiserror::Error;

/// Failure kinds of a single capture transaction
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Storage unavailable: {details}")]
    StorageUnavailable { details: String },

    #[error("Frame unavailable: {details}")]
    FrameUnavailable { details: String },

    #[error("Descriptor length {produced} exceeds configured maximum {max_len}")]
    ExtractionOverflow { produced: usize, max_len: usize },

    #[error("Descriptor extraction failed: {details}")]
    Extraction { details: String },

    #[error("Failed to write {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to commit capture index {index}: {source}")]
    CommitFailed {
        index: u32,
        #[source]
        source: StoreError,
    },

    #[error("Capture index space exhausted after {last}")]
    IndexExhausted { last: u32 },
}

impl CaptureError {
    pub fn storage_unavailable<S: Into<String>>(details: S) -> Self {
        Self::StorageUnavailable {
            details: details.into(),
        }
    }

    pub fn frame_unavailable<S: Into<String>>(details: S) -> Self {
        Self::FrameUnavailable {
            details: details.into(),
        }
    }

    pub fn extraction<S: Into<String>>(details: S) -> Self {
        Self::Extraction {
            details: details.into(),
        }
    }
}

/// Durable counter store failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Counter store I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Counter store at {} is corrupt: {details}", path.display())]
    Corrupt { path: PathBuf, details: String },

    #[error("Counter store rejected the operation: {0}")]
    Rejected(String),
}

#[derive(Error, Debug)]
pub enum FieldcamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl FieldcamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FieldcamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_error_accepts_mixed_string_types() {
        let err = FieldcamError::component("inventory", format!("Failed to read {}", "/sdcard"));
        assert_eq!(
            err.to_string(),
            "Component error in inventory: Failed to read /sdcard"
        );
    }

    #[test]
    fn test_commit_failure_reports_index() {
        let err = CaptureError::CommitFailed {
            index: 6,
            source: StoreError::Rejected("full".to_string()),
        };
        assert!(err.to_string().starts_with("Failed to commit capture index 6"));
    }
}
