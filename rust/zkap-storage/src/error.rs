use thiserror::Error;
use zkap_common::{ShareNumber, StorageIndex};

/// Failures raised by a storage engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// A write was attempted on an immutable share that was never allocated.
    #[error("No bucket allocated for share {share} of {storage_index}")]
    UnknownBucket {
        /// The storage index of the missing bucket.
        storage_index: StorageIndex,
        /// The share number of the missing bucket.
        share: ShareNumber,
    },

    /// A write to an immutable share would extend past its allocated size.
    #[error("Write of {end} bytes exceeds allocated size {allocated_size}")]
    BucketOverflow {
        /// Where the write would end.
        end: u64,
        /// The size the bucket was allocated with.
        allocated_size: u64,
    },

    /// An immutable share was requested larger than the engine accepts.
    #[error("Share size {allocated_size} exceeds the maximum of {maximum}")]
    ShareTooLarge {
        /// The requested size.
        allocated_size: u64,
        /// The largest size the engine accepts.
        maximum: u64,
    },

    /// A write to a mutable share would grow it past the largest size the
    /// engine accepts. Nothing was written.
    #[error("Write ending at {end} exceeds the maximum mutable share size of {maximum}")]
    SlotTooLarge {
        /// Where the write would end.
        end: u64,
        /// The largest size the engine accepts.
        maximum: u64,
    },

    /// The write enabler presented for a slot does not match the one it was
    /// created with.
    #[error("Write enabler mismatch for slot {0}")]
    WriteEnablerMismatch(StorageIndex),

    /// No lease with the given renew secret exists at the storage index.
    #[error("No lease to renew at {0}")]
    NoSuchLease(StorageIndex),

    /// Any other engine failure.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Failures raised by the authorization gate.
///
/// A remote caller only ever learns how many passes were valid and how many
/// were required, never which of its passes were rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    /// Too few of the presented passes were valid for the operation.
    #[error("Insufficient passes: {valid_count} valid, {required_count} required")]
    InsufficientPasses {
        /// The number of passes that were valid for the request.
        valid_count: u64,
        /// The number of valid passes the request needs.
        required_count: u64,
    },

    /// The operation was authorized but the storage engine failed it.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Raised when a mutable write shape writes nothing, so there is no largest
/// write to charge for.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Write shape contains no writes")]
pub struct NoWritesError;

/// Raised when a spending service could not record spent passes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Failed to record spent passes: {0}")]
pub struct SpenderError(pub String);

/// Raised when server configuration cannot be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The signing key file could not be read.
    #[error("Failed to read signing key from {path}: {source}")]
    Io {
        /// The configured key path.
        path: std::path::PathBuf,
        /// The underlying I/O failure.
        source: std::io::Error,
    },

    /// The signing key file does not hold a valid key.
    #[error("Invalid signing key: {0}")]
    Key(#[from] zkap_pass::KeyDecodeError),
}
