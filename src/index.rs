use crate::error::CaptureError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Non-negative capture index, persisted in the counter store as an `i32`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CaptureIndex(u32);

impl CaptureIndex {
    pub const FIRST: CaptureIndex = CaptureIndex(0);

    /// Largest index the signed counter can hold
    pub const MAX: CaptureIndex = CaptureIndex(i32::MAX as u32);

    pub fn new(value: u32) -> Option<Self> {
        (value <= Self::MAX.0).then_some(Self(value))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Value as written to the counter store
    pub fn as_stored(self) -> i32 {
        self.0 as i32
    }

    /// Interpret a raw stored value; negative values carry no usable index
    pub fn from_stored(raw: i32) -> Option<Self> {
        u32::try_from(raw).ok().map(Self)
    }

    pub fn next(self) -> Result<Self, CaptureError> {
        if self >= Self::MAX {
            return Err(CaptureError::IndexExhausted { last: self.0 });
        }
        Ok(Self(self.0 + 1))
    }
}

impl fmt::Display for CaptureIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Decode the counter key's raw value, dropping values no index can have
pub fn decode_stored(raw: Option<i32>) -> Option<CaptureIndex> {
    let raw = raw?;
    let index = CaptureIndex::from_stored(raw);
    if index.is_none() {
        warn!("Ignoring negative stored capture index {}", raw);
    }
    index
}

/// Pick the index for the next capture.
///
/// An empty medium always restarts at 0, whatever the counter says: it cannot
/// hold stale files for index 0 to collide with. Otherwise an absent counter
/// also starts at 0 and a present one advances by one.
pub fn derive_next_index(
    storage_is_empty: bool,
    stored: Option<CaptureIndex>,
) -> Result<CaptureIndex, CaptureError> {
    let next = match (storage_is_empty, stored) {
        (true, _) => CaptureIndex::FIRST,
        (false, None) => CaptureIndex::FIRST,
        (false, Some(last)) => last.next()?,
    };

    debug!(
        "Derived capture index {} (storage empty: {}, stored: {:?})",
        next, storage_is_empty, stored
    );
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx(value: u32) -> CaptureIndex {
        CaptureIndex::new(value).unwrap()
    }

    #[test]
    fn test_empty_storage_restarts_at_zero() {
        assert_eq!(derive_next_index(true, None).unwrap(), idx(0));
        assert_eq!(derive_next_index(true, Some(idx(5))).unwrap(), idx(0));
        assert_eq!(
            derive_next_index(true, Some(CaptureIndex::MAX)).unwrap(),
            idx(0)
        );
    }

    #[test]
    fn test_used_storage_without_counter_starts_at_zero() {
        assert_eq!(derive_next_index(false, None).unwrap(), idx(0));
    }

    #[test]
    fn test_used_storage_advances_counter() {
        assert_eq!(derive_next_index(false, Some(idx(0))).unwrap(), idx(1));
        assert_eq!(derive_next_index(false, Some(idx(5))).unwrap(), idx(6));
    }

    #[test]
    fn test_counter_exhaustion_is_an_error() {
        let result = derive_next_index(false, Some(CaptureIndex::MAX));
        assert!(matches!(
            result,
            Err(CaptureError::IndexExhausted { last }) if last == i32::MAX as u32
        ));
    }

    #[test]
    fn test_stored_value_decoding() {
        assert_eq!(decode_stored(None), None);
        assert_eq!(decode_stored(Some(7)), Some(idx(7)));
        assert_eq!(decode_stored(Some(-1)), None);
        assert_eq!(idx(7).as_stored(), 7);
        assert_eq!(CaptureIndex::new(u32::MAX), None);
    }
}
