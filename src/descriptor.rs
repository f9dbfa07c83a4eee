use crate::config::{DescriptorConfig, OverflowPolicy};
use crate::error::CaptureError;
use crate::frame::FrameView;
use tracing::{debug, warn};

/// Bytes per persisted descriptor word
pub const WORD_SIZE: usize = std::mem::size_of::<i32>();

/// Number of intensity comparisons per keypoint
const BRIEF_BITS: usize = 256;

/// Values emitted per keypoint (one per packed byte)
pub const VALUES_PER_KEYPOINT: usize = BRIEF_BITS / 8;

const PATTERN_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

/// Ordered integer feature vector, at most the session's `max_len` long
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Descriptor {
    values: Vec<i32>,
}

impl Descriptor {
    pub fn from_values(values: Vec<i32>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[i32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Native-endian words in extraction order, no header
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.values.len() * WORD_SIZE);
        for value in &self.values {
            bytes.extend_from_slice(&value.to_ne_bytes());
        }
        bytes
    }

    /// Inverse of [`Descriptor::to_bytes`]; `None` when the length is not a whole number of words
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() % WORD_SIZE != 0 {
            return None;
        }
        let values = bytes
            .chunks_exact(WORD_SIZE)
            .map(|chunk| i32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Some(Self { values })
    }
}

/// Opaque feature extraction capability
pub trait DescriptorExtractor: Send + Sync {
    /// Write at most `dest.len()` values and return the length the full
    /// descriptor would have had. A return value larger than `dest.len()`
    /// signals that output was cut short.
    fn compute(&self, frame: FrameView<'_>, dest: &mut [i32]) -> Result<usize, CaptureError>;

    /// Get the name of this extractor for logging
    fn extractor_name(&self) -> &str;
}

/// Run an extractor into a buffer of exactly `max_len` slots and apply the overflow policy
pub fn extract_bounded(
    extractor: &dyn DescriptorExtractor,
    frame: FrameView<'_>,
    max_len: usize,
    policy: OverflowPolicy,
) -> Result<Descriptor, CaptureError> {
    let mut dest = vec![0i32; max_len];
    let produced = extractor.compute(frame, &mut dest)?;

    if produced > max_len {
        match policy {
            OverflowPolicy::Reject => {
                return Err(CaptureError::ExtractionOverflow { produced, max_len });
            }
            OverflowPolicy::Truncate => {
                warn!(
                    "{} produced {} values, truncating to {}",
                    extractor.extractor_name(),
                    produced,
                    max_len
                );
            }
        }
    }

    dest.truncate(produced.min(max_len));
    debug!(
        "{} extracted {} descriptor values",
        extractor.extractor_name(),
        dest.len()
    );
    Ok(Descriptor::from_values(dest))
}

/// BRIEF-style binary descriptor over fixed keypoints.
///
/// Each keypoint yields 256 pairwise intensity tests inside a square patch,
/// packed into 32 bytes and emitted as 32 integers in `0..=255`.
pub struct BriefExtractor {
    keypoints: Vec<(u32, u32)>,
    max_keypoints: usize,
    edge_threshold: u32,
    pattern: Vec<[(i32, i32); 2]>,
}

impl BriefExtractor {
    pub fn new(config: &DescriptorConfig) -> Self {
        Self {
            keypoints: config.keypoints.clone(),
            max_keypoints: config.max_keypoints,
            edge_threshold: config.edge_threshold,
            pattern: Self::sampling_pattern(config.patch_size),
        }
    }

    /// Deterministic test-pair offsets within the patch
    fn sampling_pattern(patch_size: u32) -> Vec<[(i32, i32); 2]> {
        let half = (patch_size / 2) as i32;
        let span = (2 * half + 1) as u64;
        let mut state = PATTERN_SEED;
        let mut next = move || {
            // xorshift64*
            state ^= state >> 12;
            state ^= state << 25;
            state ^= state >> 27;
            let value = state.wrapping_mul(0x2545_F491_4F6C_DD1D);
            (value % span) as i32 - half
        };

        (0..BRIEF_BITS)
            .map(|_| [(next(), next()), (next(), next())])
            .collect()
    }

    fn usable(&self, frame: &FrameView<'_>, x: u32, y: u32) -> bool {
        let edge = self.edge_threshold;
        x >= edge
            && y >= edge
            && x.saturating_add(edge) < frame.width
            && y.saturating_add(edge) < frame.height
    }

    fn describe(&self, frame: &FrameView<'_>, x: u32, y: u32) -> Option<[u8; VALUES_PER_KEYPOINT]> {
        let mut bytes = [0u8; VALUES_PER_KEYPOINT];
        for (bit, [(ax, ay), (bx, by)]) in self.pattern.iter().enumerate() {
            let a = frame.pixel(x.checked_add_signed(*ax)?, y.checked_add_signed(*ay)?)?;
            let b = frame.pixel(x.checked_add_signed(*bx)?, y.checked_add_signed(*by)?)?;
            if a < b {
                bytes[bit / 8] |= 1 << (bit % 8);
            }
        }
        Some(bytes)
    }
}

impl DescriptorExtractor for BriefExtractor {
    fn compute(&self, frame: FrameView<'_>, dest: &mut [i32]) -> Result<usize, CaptureError> {
        let required = frame.width as usize * frame.height as usize;
        if frame.pixels.len() < required {
            return Err(CaptureError::extraction(format!(
                "pixel buffer of {} bytes is smaller than {}x{}",
                frame.pixels.len(),
                frame.width,
                frame.height
            )));
        }

        let mut produced = 0usize;
        let mut described = 0usize;

        for &(x, y) in &self.keypoints {
            if described == self.max_keypoints {
                break;
            }
            if !self.usable(&frame, x, y) {
                debug!("Skipping keypoint ({}, {}) near the border", x, y);
                continue;
            }
            let Some(bytes) = self.describe(&frame, x, y) else {
                continue;
            };
            described += 1;

            for byte in bytes {
                if let Some(slot) = dest.get_mut(produced) {
                    *slot = i32::from(byte);
                }
                produced += 1;
            }
        }

        Ok(produced)
    }

    fn extractor_name(&self) -> &str {
        "brief"
    }
}
