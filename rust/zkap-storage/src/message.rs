use std::fmt::{Display, Formatter};

use zkap_common::StorageIndex;

/// The kinds of request a pass can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Allocation of immutable buckets.
    AllocateBuckets,
    /// Adding a lease to existing shares.
    AddLease,
    /// Renewing an existing lease.
    RenewLease,
    /// A test-and-write on a mutable slot.
    SlotTestvAndReadvAndWritev,
}

impl OperationKind {
    /// The name used for this kind in binding messages.
    pub const fn as_str(&self) -> &'static str {
        match self {
            OperationKind::AllocateBuckets => "allocate_buckets",
            OperationKind::AddLease => "add_lease",
            OperationKind::RenewLease => "renew_lease",
            OperationKind::SlotTestvAndReadvAndWritev => "slot_testv_and_readv_and_writev",
        }
    }

    /// The message that passes for this kind of request on `storage_index`
    /// must sign.
    pub fn message(&self, storage_index: &StorageIndex) -> String {
        format!("{} {}", self.as_str(), storage_index.to_base64())
    }
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The binding message for an immutable allocation.
pub fn allocate_buckets_message(storage_index: &StorageIndex) -> String {
    OperationKind::AllocateBuckets.message(storage_index)
}

/// The binding message for adding a lease.
pub fn add_lease_message(storage_index: &StorageIndex) -> String {
    OperationKind::AddLease.message(storage_index)
}

/// The binding message for renewing a lease.
pub fn renew_lease_message(storage_index: &StorageIndex) -> String {
    OperationKind::RenewLease.message(storage_index)
}

/// The binding message for a mutable test-and-write.
pub fn slot_testv_and_readv_and_writev_message(storage_index: &StorageIndex) -> String {
    OperationKind::SlotTestvAndReadvAndWritev.message(storage_index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_formats_kind_then_base64_index() {
        let index = StorageIndex::new([0; 16]);

        assert_eq!(
            allocate_buckets_message(&index),
            "allocate_buckets AAAAAAAAAAAAAAAAAAAAAA=="
        );
        assert_eq!(add_lease_message(&index), "add_lease AAAAAAAAAAAAAAAAAAAAAA==");
        assert_eq!(
            renew_lease_message(&index),
            "renew_lease AAAAAAAAAAAAAAAAAAAAAA=="
        );
        assert_eq!(
            slot_testv_and_readv_and_writev_message(&index),
            "slot_testv_and_readv_and_writev AAAAAAAAAAAAAAAAAAAAAA=="
        );
    }

    #[test]
    fn it_binds_to_the_storage_index() {
        let one = StorageIndex::new([1; 16]);
        let two = StorageIndex::new([2; 16]);
        assert_ne!(add_lease_message(&one), add_lease_message(&two));
    }
}
