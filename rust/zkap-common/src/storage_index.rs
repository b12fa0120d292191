use std::fmt::{Debug, Display, Formatter};

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The number of bytes in a [`StorageIndex`].
pub const STORAGE_INDEX_LENGTH: usize = 16;

/// The position of a share among the shares stored at one [`StorageIndex`].
pub type ShareNumber = u16;

/// The identifier of a unit of remote storage (an immutable bucket set or a
/// mutable slot). Passes and leases are scoped to a storage index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorageIndex([u8; STORAGE_INDEX_LENGTH]);

/// Raised when bytes of the wrong length are offered as a [`StorageIndex`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Storage index must be {STORAGE_INDEX_LENGTH} bytes, got {0}")]
pub struct InvalidStorageIndexLength(pub usize);

impl StorageIndex {
    /// Wraps raw storage index bytes.
    pub const fn new(bytes: [u8; STORAGE_INDEX_LENGTH]) -> Self {
        Self(bytes)
    }

    /// The raw bytes of this storage index.
    pub const fn as_bytes(&self) -> &[u8; STORAGE_INDEX_LENGTH] {
        &self.0
    }

    /// The standard base64 form, as used in request-binding messages.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }
}

impl From<[u8; STORAGE_INDEX_LENGTH]> for StorageIndex {
    fn from(bytes: [u8; STORAGE_INDEX_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for StorageIndex {
    type Error = InvalidStorageIndexLength;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        <[u8; STORAGE_INDEX_LENGTH]>::try_from(bytes)
            .map(Self)
            .map_err(|_| InvalidStorageIndexLength(bytes.len()))
    }
}

impl AsRef<[u8]> for StorageIndex {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Display for StorageIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl Debug for StorageIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StorageIndex").field(&self.to_base64()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_displays_as_standard_base64() {
        let index = StorageIndex::new([0xff; STORAGE_INDEX_LENGTH]);
        assert_eq!(index.to_string(), "/////////////////////w==");
    }

    #[test]
    fn it_rejects_slices_of_the_wrong_length() {
        let result = StorageIndex::try_from(&[1u8, 2, 3][..]);
        assert_eq!(result, Err(InvalidStorageIndexLength(3)));

        let index = StorageIndex::try_from(&[7u8; STORAGE_INDEX_LENGTH][..]).unwrap();
        assert_eq!(index.as_bytes(), &[7u8; STORAGE_INDEX_LENGTH]);
    }

    #[test]
    fn it_round_trips_through_serde() {
        let index = StorageIndex::new([3; STORAGE_INDEX_LENGTH]);
        let json = serde_json::to_string(&index).unwrap();
        let decoded: StorageIndex = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, index);
    }
}
