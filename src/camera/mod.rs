mod builder;
#[cfg(feature = "image_source")]
mod file;
#[cfg(all(target_os = "linux", feature = "camera"))]
mod interface;
mod synthetic;

pub use builder::FrameSourceBuilder;
#[cfg(feature = "image_source")]
pub use file::FileFrameSource;
#[cfg(all(target_os = "linux", feature = "camera"))]
pub use interface::CameraInterface;
pub use synthetic::SyntheticFrameSource;
