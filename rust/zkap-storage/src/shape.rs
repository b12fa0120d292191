use std::{
    collections::{BTreeMap, BTreeSet},
    time::SystemTime,
};

use serde::{Deserialize, Serialize};
use zkap_common::ShareNumber;

/// A 32 byte secret shared between a client and a storage server.
pub type Secret = [u8; 32];

/// The secrets that accompany a mutable write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secrets {
    /// Authorizes writes to an existing slot.
    pub write_enabler: Secret,
    /// Renews any lease created by the write.
    pub renew_secret: Secret,
    /// Cancels any lease created by the write.
    pub cancel_secret: Secret,
}

/// A byte range to read from a share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRange {
    /// The first byte to read.
    pub offset: u64,
    /// How many bytes to read. Reads past the end of the share are short.
    pub length: u64,
}

/// A condition on the current contents of a share: the bytes at `offset`
/// must equal `specimen`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestVector {
    /// Where the compared range starts.
    pub offset: u64,
    /// The bytes the range must equal.
    pub specimen: Vec<u8>,
}

/// A fragment of data to place in a share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteVector {
    /// Where the fragment starts.
    pub offset: u64,
    /// The fragment itself.
    pub data: Vec<u8>,
}

impl WriteVector {
    /// The offset one past the last byte this fragment writes.
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.data.len() as u64)
    }
}

/// Tests, writes and an optional truncation for one share of a slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestWriteVectors {
    /// Conditions that must all hold before any share is written.
    pub test: Vec<TestVector>,
    /// Fragments to write, in order.
    pub write: Vec<WriteVector>,
    /// If set, the share is truncated to this length after writing. A length
    /// beyond the end of the share leaves it as it is; zero removes it.
    pub new_length: Option<u64>,
}

impl TestWriteVectors {
    /// Whether this entry writes any data.
    pub fn has_writes(&self) -> bool {
        !self.write.is_empty()
    }
}

/// The shape of a mutable write: per share, what to test and what to write.
pub type ShareWriteShape = BTreeMap<ShareNumber, TestWriteVectors>;

/// Whether any share in `shape` is written to.
pub fn has_writes(shape: &ShareWriteShape) -> bool {
    shape.values().any(TestWriteVectors::has_writes)
}

/// The result of an immutable allocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// Requested shares the server already holds.
    pub already_have: BTreeSet<ShareNumber>,
    /// Requested shares for which a new bucket was allocated.
    pub allocated: BTreeSet<ShareNumber>,
}

/// Size and lease information for one stored share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareStat {
    /// Whether the share lives in an immutable bucket or a mutable slot.
    pub share_type: ShareType,
    /// The current size of the share in bytes.
    pub size: u64,
    /// The latest expiration among the leases on the share.
    pub lease_expiration: SystemTime,
}

/// Whether a share is immutable or mutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShareType {
    /// A share of an immutable bucket.
    Immutable,
    /// A share of a mutable slot.
    Mutable,
}

/// What a storage server tells clients about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerVersion {
    /// The name and version of the server software.
    pub application_version: String,
    /// The largest immutable share the server accepts.
    pub maximum_immutable_share_size: u64,
    /// The largest mutable share the server accepts.
    pub maximum_mutable_share_size: u64,
}
