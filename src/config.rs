use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FieldcamConfig {
    pub camera: CameraConfig,
    pub storage: StorageConfig,
    pub counter: CounterConfig,
    pub descriptor: DescriptorConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Where frames come from
    #[serde(default = "default_camera_source")]
    pub source: FrameSourceKind,

    /// Camera device index (e.g., 0 for /dev/video0)
    #[serde(default = "default_camera_index")]
    pub index: u32,

    /// Camera resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Grayscale image used by the file source
    #[serde(default)]
    pub file_path: Option<String>,

    /// How long to wait for the sensor to deliver a frame
    #[serde(default = "default_frame_timeout_ms")]
    pub frame_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// Mount point of the bulk storage medium
    #[serde(default = "default_mount_point")]
    pub mount_point: String,

    /// Create the mount point directory when it does not exist
    #[serde(default = "default_create_if_missing")]
    pub create_if_missing: bool,

    /// Artifact naming scheme
    #[serde(default = "default_naming")]
    pub naming: Naming,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CounterConfig {
    /// Path of the durable counter store
    #[serde(default = "default_counter_path")]
    pub path: String,

    /// Key holding the last committed capture index
    #[serde(default = "default_counter_key")]
    pub key: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DescriptorConfig {
    /// Upper bound on descriptor length (number of integers)
    #[serde(default = "default_max_len")]
    pub max_len: usize,

    /// What to do when the extractor produces more than `max_len` values
    #[serde(default = "default_overflow_policy")]
    pub overflow_policy: OverflowPolicy,

    /// Side of the square sampling patch around each keypoint
    #[serde(default = "default_patch_size")]
    pub patch_size: u32,

    /// Keypoints closer than this to the border are discarded
    #[serde(default = "default_edge_threshold")]
    pub edge_threshold: u32,

    /// Maximum number of keypoints described per frame
    #[serde(default = "default_max_keypoints")]
    pub max_keypoints: usize,

    /// Keypoint centres (x, y)
    #[serde(default = "default_keypoints")]
    pub keypoints: Vec<(u32, u32)>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FrameSourceKind {
    Gstreamer,
    File,
    Synthetic,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Naming {
    /// `file_<n>.jpg` / `descriptor_<n>.bin`
    Indexed,
    /// `picture.jpg` / `descriptor.bin`, overwritten on every capture
    SingleSlot,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Keep the first `max_len` values and continue
    Truncate,
    /// Fail the capture with `ExtractionOverflow`
    Reject,
}

impl FieldcamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("fieldcam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("camera.source", "gstreamer")?
            .set_default("camera.index", default_camera_index())?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.frame_timeout_ms", default_frame_timeout_ms())?
            .set_default("storage.mount_point", default_mount_point())?
            .set_default("storage.create_if_missing", default_create_if_missing())?
            .set_default("storage.naming", "indexed")?
            .set_default("counter.path", default_counter_path())?
            .set_default("counter.key", default_counter_key())?
            .set_default("descriptor.max_len", default_max_len() as i64)?
            .set_default("descriptor.overflow_policy", "truncate")?
            .set_default("descriptor.patch_size", default_patch_size())?
            .set_default("descriptor.edge_threshold", default_edge_threshold())?
            .set_default("descriptor.max_keypoints", default_max_keypoints() as i64)?
            .set_default(
                "descriptor.keypoints",
                default_keypoints()
                    .into_iter()
                    .map(|(x, y)| vec![x as i64, y as i64])
                    .collect::<Vec<_>>(),
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with FIELDCAM_ prefix
            .add_source(
                Environment::with_prefix("FIELDCAM")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: FieldcamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Render as TOML, e.g. for `--print-config`
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.source == FrameSourceKind::Gstreamer && self.camera.frame_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Camera frame_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.camera.source == FrameSourceKind::File && self.camera.file_path.is_none() {
            return Err(ConfigError::Message(
                "Camera file_path is required for the file source".to_string(),
            ));
        }

        if self.storage.mount_point.trim().is_empty() {
            return Err(ConfigError::Message(
                "Storage mount_point must not be empty".to_string(),
            ));
        }

        if self.counter.key.is_empty() {
            return Err(ConfigError::Message(
                "Counter key must not be empty".to_string(),
            ));
        }

        if self.descriptor.max_len == 0 {
            return Err(ConfigError::Message(
                "Descriptor max_len must be greater than 0".to_string(),
            ));
        }

        if self.descriptor.patch_size == 0 || self.descriptor.patch_size / 2 > self.descriptor.edge_threshold {
            return Err(ConfigError::Message(format!(
                "Descriptor patch_size {} does not fit inside edge_threshold {}",
                self.descriptor.patch_size, self.descriptor.edge_threshold
            )));
        }

        if self.descriptor.max_keypoints == 0 {
            return Err(ConfigError::Message(
                "Descriptor max_keypoints must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for FieldcamConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                source: default_camera_source(),
                index: default_camera_index(),
                resolution: default_camera_resolution(),
                file_path: None,
                frame_timeout_ms: default_frame_timeout_ms(),
            },
            storage: StorageConfig {
                mount_point: default_mount_point(),
                create_if_missing: default_create_if_missing(),
                naming: default_naming(),
            },
            counter: CounterConfig {
                path: default_counter_path(),
                key: default_counter_key(),
            },
            descriptor: DescriptorConfig {
                max_len: default_max_len(),
                overflow_policy: default_overflow_policy(),
                patch_size: default_patch_size(),
                edge_threshold: default_edge_threshold(),
                max_keypoints: default_max_keypoints(),
                keypoints: default_keypoints(),
            },
        }
    }
}

// Default value functions
fn default_camera_source() -> FrameSourceKind {
    FrameSourceKind::Gstreamer
}
fn default_camera_index() -> u32 {
    0
}
fn default_camera_resolution() -> (u32, u32) {
    (320, 240)
}
fn default_frame_timeout_ms() -> u64 {
    5000
}

fn default_mount_point() -> String {
    "/sdcard".to_string()
}
fn default_create_if_missing() -> bool {
    false
}
fn default_naming() -> Naming {
    Naming::Indexed
}

fn default_counter_path() -> String {
    "/var/lib/fieldcam/counter.json".to_string()
}
fn default_counter_key() -> String {
    "file_index".to_string()
}

fn default_max_len() -> usize {
    500
}
fn default_overflow_policy() -> OverflowPolicy {
    OverflowPolicy::Truncate
}
fn default_patch_size() -> u32 {
    31
}
fn default_edge_threshold() -> u32 {
    35
}
fn default_max_keypoints() -> usize {
    10
}
fn default_keypoints() -> Vec<(u32, u32)> {
    vec![(50, 50)]
}
